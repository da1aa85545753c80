use std::time::Duration;

/// Engine-wide tunables. One instance per database, handed to the
/// components that need it at construction time.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Number of frames in the buffer pool
    pub pool_size: usize,
    /// Fanout bound for B+tree leaf pages
    pub leaf_max_size: u32,
    /// Fanout bound for B+tree internal pages
    pub internal_max_size: u32,
    /// How often the deadlock detector wakes up
    pub cycle_detection_interval: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            pool_size: 64,
            leaf_max_size: 32,
            internal_max_size: 32,
            cycle_detection_interval: Duration::from_millis(50),
        }
    }
}
