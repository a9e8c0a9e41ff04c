//! Transposition table
//!
//! Lock-free table of 64-byte buckets, 4 slots per bucket. Each slot holds a
//! packed data word and a check word equal to `key ^ data`; a reader accepts a
//! slot only when the two words agree, so a torn or concurrent write shows up as
//! a miss instead of a corrupted entry. Entries are aged with an 8-bit
//! generation counter bumped once per search; nothing is physically deleted
//! except by `clear()`.

use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use log::debug;
use serde::Serialize;

use crate::position::{Move, Position};

mod entry;

pub use entry::{Bound, TTEntry, score_from_tt, score_to_tt};

/// Slots per bucket
const BUCKET_SIZE: usize = 4;

/// Same-key entries are overwritten unless the new one is this much shallower
const SAME_KEY_DEPTH_SLACK: u32 = 2;

/// Weight of one generation of age in the replacement score
const AGE_WEIGHT: i32 = 8;

struct Slot {
    check: AtomicU64,
    data: AtomicU64,
}

impl Slot {
    const fn new() -> Self {
        Self {
            check: AtomicU64::new(0),
            data: AtomicU64::new(0),
        }
    }

    /// Entry stored for `key`, if this slot holds it
    #[inline]
    fn read(&self, key: u64) -> Option<TTEntry> {
        let data = self.data.load(Ordering::Acquire);
        if data == 0 {
            return None;
        }
        let check = self.check.load(Ordering::Acquire);
        if check ^ data != key {
            return None;
        }
        TTEntry::unpack(data)
    }

    /// Any entry stored here, regardless of key
    #[inline]
    fn peek(&self) -> Option<TTEntry> {
        TTEntry::unpack(self.data.load(Ordering::Acquire))
    }

    #[inline]
    fn write(&self, key: u64, data: u64) {
        self.data.store(data, Ordering::Release);
        self.check.store(key ^ data, Ordering::Release);
    }

    fn reset(&self) {
        self.data.store(0, Ordering::Relaxed);
        self.check.store(0, Ordering::Relaxed);
    }
}

/// Bucket of slots, one cache line
#[repr(C, align(64))]
struct Bucket {
    slots: [Slot; BUCKET_SIZE],
}

impl Bucket {
    const fn new() -> Self {
        Self {
            slots: [Slot::new(), Slot::new(), Slot::new(), Slot::new()],
        }
    }
}

#[derive(Default)]
struct Counters {
    probes: CachePadded<AtomicU64>,
    hits: CachePadded<AtomicU64>,
    stores: CachePadded<AtomicU64>,
    same_key_updates: CachePadded<AtomicU64>,
    replacements: CachePadded<AtomicU64>,
    stale_evictions: CachePadded<AtomicU64>,
    clears: AtomicU64,
}

/// Snapshot of table counters. Introspection only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplacementStats {
    pub probes: u64,
    pub hits: u64,
    pub stores: u64,
    /// Overwrites of an entry for the same position
    pub same_key_updates: u64,
    /// Evictions of an entry for a different position
    pub replacements: u64,
    /// Evictions of an entry from an older generation
    pub stale_evictions: u64,
    pub clears: u64,
}

impl ReplacementStats {
    pub fn hit_rate(&self) -> f64 {
        if self.probes == 0 {
            0.0
        } else {
            self.hits as f64 / self.probes as f64
        }
    }
}

/// Shared transposition table
pub struct TranspositionTable {
    buckets: Box<[Bucket]>,
    mask: usize,
    generation: AtomicU8,
    occupied: AtomicUsize,
    counters: Counters,
}

impl TranspositionTable {
    /// Create a table of roughly `size_mb` megabytes (rounded down to a power of
    /// two number of buckets, at least 1 MB)
    pub fn new(size_mb: usize) -> Self {
        let bytes = size_mb.max(1) * 1024 * 1024;
        Self::with_buckets(bytes / std::mem::size_of::<Bucket>())
    }

    /// Create a table holding about `entries` entries (rounded down to a power of
    /// two number of buckets)
    pub fn with_capacity(entries: usize) -> Self {
        Self::with_buckets(entries / BUCKET_SIZE)
    }

    fn with_buckets(requested: usize) -> Self {
        let requested = requested.max(1);
        let num_buckets = 1usize << (usize::BITS - 1 - requested.leading_zeros());
        let buckets: Vec<Bucket> = (0..num_buckets).map(|_| Bucket::new()).collect();
        let entries = num_buckets * BUCKET_SIZE;
        debug!("transposition table: {num_buckets} buckets, {entries} entries");
        Self {
            buckets: buckets.into_boxed_slice(),
            mask: num_buckets - 1,
            generation: AtomicU8::new(0),
            occupied: AtomicUsize::new(0),
            counters: Counters::default(),
        }
    }

    #[inline]
    fn bucket(&self, key: u64) -> &Bucket {
        &self.buckets[(key as usize) & self.mask]
    }

    /// Current generation
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Look up a position. Collisions and torn writes are reported as misses.
    pub fn get(&self, key: u64) -> Option<TTEntry> {
        self.counters.probes.fetch_add(1, Ordering::Relaxed);
        let found = self.bucket(key).slots.iter().find_map(|slot| slot.read(key));
        if found.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store an entry. The entry's generation is set to the current one.
    ///
    /// Replacement order: the slot already holding this position (kept when
    /// the stored entry is much deeper and current), then an empty slot, then
    /// the slot with the lowest `depth - 8 * age` (exact entries get a bonus).
    pub fn put(&self, key: u64, entry: TTEntry) {
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation();
        let mut entry = TTEntry { generation, ..entry };
        let bucket = self.bucket(key);

        for slot in &bucket.slots {
            if let Some(old) = slot.read(key) {
                let replace = entry.bound == Bound::Exact
                    || entry.depth as u32 + SAME_KEY_DEPTH_SLACK >= old.depth as u32
                    || old.generation != generation;
                if !replace {
                    return;
                }
                if entry.best_move.is_none() {
                    entry.best_move = old.best_move;
                }
                slot.write(key, entry.pack());
                self.counters.same_key_updates.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let data = entry.pack();
        for slot in &bucket.slots {
            if slot.data.compare_exchange(0, data, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                slot.check.store(key ^ data, Ordering::Release);
                self.occupied.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut victim = &bucket.slots[0];
        let mut victim_score = i32::MAX;
        let mut victim_stale = false;
        for slot in &bucket.slots {
            let (score, stale) = match slot.peek() {
                Some(old) => {
                    let age = generation.wrapping_sub(old.generation) as i32;
                    let exact_bonus = if old.bound == Bound::Exact { 2 } else { 0 };
                    (old.depth as i32 - AGE_WEIGHT * age + exact_bonus, age > 0)
                }
                None => (i32::MIN, false),
            };
            if score < victim_score {
                victim = slot;
                victim_score = score;
                victim_stale = stale;
            }
        }

        if victim_stale {
            self.counters.stale_evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.replacements.fetch_add(1, Ordering::Relaxed);
        victim.write(key, data);
    }

    /// Start a new search generation. Older entries become preferred victims.
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove every entry
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            for slot in &bucket.slots {
                slot.reset();
            }
        }
        self.occupied.store(0, Ordering::Relaxed);
        self.counters.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of occupied slots
    pub fn size(&self) -> usize {
        self.occupied.load(Ordering::Relaxed)
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.buckets.len() * BUCKET_SIZE
    }

    /// Occupancy in permille
    pub fn hashfull(&self) -> u32 {
        ((self.size() as u64 * 1000) / self.capacity() as u64) as u32
    }

    /// Allocated size in MB
    pub fn size_mb(&self) -> usize {
        self.buckets.len() * std::mem::size_of::<Bucket>() / (1024 * 1024)
    }

    pub fn replacement_stats(&self) -> ReplacementStats {
        let c = &self.counters;
        ReplacementStats {
            probes: c.probes.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            stores: c.stores.load(Ordering::Relaxed),
            same_key_updates: c.same_key_updates.load(Ordering::Relaxed),
            replacements: c.replacements.load(Ordering::Relaxed),
            stale_evictions: c.stale_evictions.load(Ordering::Relaxed),
            clears: c.clears.load(Ordering::Relaxed),
        }
    }

    /// Follow best moves stored in the table from `pos`.
    ///
    /// Every move is checked against the legal move list and the position is
    /// restored before returning.
    pub fn extract_pv(&self, pos: &mut Position, max_len: usize) -> Vec<Move> {
        let mut pv = Vec::new();
        while pv.len() < max_len {
            let key = pos.key();
            let entry = self.bucket(key).slots.iter().find_map(|slot| slot.read(key));
            let Some(mv) = entry.and_then(|e| e.best_move) else {
                break;
            };
            if !pos.legal_moves().contains(&mv) || pos.do_move(mv).is_err() {
                break;
            }
            pv.push(mv);
            if pos.is_repetition() {
                break;
            }
        }
        for _ in 0..pv.len() {
            pos.undo_move();
        }
        pv
    }
}
