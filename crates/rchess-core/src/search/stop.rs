//! Cooperative stop signal polled by search threads

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::time::TimeManager;

/// Everything a search thread has to poll to know whether to unwind.
///
/// - `request`: the request's cancel flag, shared by every thread searching it
/// - `local`: an optional flag scoped to one parallel root split
/// - `timer`: the request's time manager (hard deadline)
/// - `node_limit`: nodes this thread may search in the request
#[derive(Clone, Default)]
pub struct StopSignal {
    request: Arc<AtomicBool>,
    local: Option<Arc<AtomicBool>>,
    timer: Option<TimeManager>,
    node_limit: Option<u64>,
}

impl StopSignal {
    pub fn new(request: Arc<AtomicBool>) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    pub fn with_timer(mut self, timer: TimeManager) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn with_local(mut self, local: Arc<AtomicBool>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_node_limit(mut self, node_limit: Option<u64>) -> Self {
        self.node_limit = node_limit;
        self
    }

    /// Cancel or local stop requested. Cheap, checked at every node.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.request.load(Ordering::Relaxed)
            || self.local.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Deadline or node budget exhausted. Reads the clock, checked periodically.
    pub fn is_exhausted(&self, nodes: u64) -> bool {
        self.timer.as_ref().is_some_and(TimeManager::is_time_up)
            || self.node_limit.is_some_and(|limit| nodes >= limit)
    }

    /// Whether the request itself (not just a local split) was stopped
    pub fn request_stopped(&self) -> bool {
        self.request.load(Ordering::Relaxed)
            || self.timer.as_ref().is_some_and(TimeManager::is_time_up)
    }
}
