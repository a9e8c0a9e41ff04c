//! Memory pressure input of the strategy selector

/// Reports how much of the memory available to the engine is in use
pub trait MemoryProbe: Send + Sync {
    /// Usage ratio in `[0, 1]`
    fn usage_ratio(&self) -> f64;
}

/// Probe reporting a constant ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMemoryProbe(pub f64);

impl MemoryProbe for FixedMemoryProbe {
    fn usage_ratio(&self) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_probe_is_clamped() {
        assert_eq!(FixedMemoryProbe(0.5).usage_ratio(), 0.5);
        assert_eq!(FixedMemoryProbe(3.0).usage_ratio(), 1.0);
        assert_eq!(FixedMemoryProbe(-1.0).usage_ratio(), 0.0);
    }
}
