//! Centralized environment variable names and default values for engine tuning.

// Environment variable names
pub const ENV_THREADS: &str = "MRCHAIN_THREADS";
pub const ENV_PARTITIONS: &str = "MRCHAIN_PARTITIONS";
pub const ENV_REDUCERS: &str = "MRCHAIN_REDUCERS";
/// When truthy, stages run without their combiner (results must not change).
pub const ENV_SKIP_COMBINERS: &str = "MRCHAIN_SKIP_COMBINERS";

// Output sink tuning
pub const DEFAULT_SINK_QUEUE_CAP: usize = 4096;
pub const DEFAULT_SINK_FLUSH_BYTES: usize = 1024 * 1024; // 1 MiB
pub const DEFAULT_SINK_FLUSH_INTERVAL_MS: u64 = 500;
