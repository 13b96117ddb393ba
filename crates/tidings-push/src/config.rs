//! Push gateway configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Outbound messages buffered per connection before a send counts as
    /// failed (default: 32).
    pub outbound_buffer: usize,
    /// Close a connection that has sent nothing for this many seconds.
    /// `None` (the default) never times out.
    pub idle_timeout_secs: Option<u64>,
}

impl PushConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 32,
            idle_timeout_secs: None,
        }
    }
}
