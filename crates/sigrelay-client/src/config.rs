use std::time::Duration;

/// Client tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for `request` when none is given.
    pub request_timeout: Duration,
    /// Outstanding requests allowed at once.
    pub max_pending: usize,
    /// Capacity of the outbound queue used by `connect`.
    pub outbound_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(5000),
            max_pending: 256,
            outbound_queue: 256,
        }
    }
}
