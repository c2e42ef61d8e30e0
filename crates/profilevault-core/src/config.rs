//! Runtime configuration

use std::time::Duration;

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "profilevault";

/// Default deadline for a request to receive its response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of in-flight envelopes the transport buffers
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How mutating store operations are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// One mutation at a time, FIFO. Concurrent writers never lose updates.
    #[default]
    Serialized,
    /// Mutations may interleave in their read-modify-write window; the last
    /// writer wins and an overlapping update can be silently dropped.
    /// Only useful to reproduce the behavior of older hosts.
    Unsynchronized,
}

/// Configuration for the store, router and client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Prefix for every persisted key (`<namespace>_profiles`, ...)
    pub namespace: String,
    /// Scheduling of mutating store operations
    pub write_mode: WriteMode,
    /// How long a client waits for a response before giving up
    pub request_timeout: Duration,
    /// Capacity of the in-process transport channel
    pub channel_capacity: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            write_mode: WriteMode::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl VaultConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        // tokio channels panic on zero capacity
        self.channel_capacity = capacity.max(1);
        self
    }
}
