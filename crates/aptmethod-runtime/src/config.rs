//! Runtime configuration.

use std::time::Duration;

use aptmethod_protocol::DEFAULT_MAX_FRAME_SIZE;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct MethodConfig {
    /// Upper bound on requests handled at once. `None` is unbounded.
    pub max_concurrent_requests: Option<usize>,

    /// How long [`authorize`](crate::MessageWriter::authorize) waits for
    /// credentials. `None` waits until the parent answers or goes away.
    pub authorization_timeout: Option<Duration>,

    /// How long [`change_media`](crate::MessageWriter::change_media) waits
    /// for the parent.
    pub media_change_timeout: Option<Duration>,

    /// Largest accepted inbound frame.
    pub max_frame_size: usize,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: None,
            authorization_timeout: None,
            media_change_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl MethodConfig {
    /// Builder: bound concurrent requests.
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = Some(max);
        self
    }

    /// Builder: set authorization timeout.
    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = Some(timeout);
        self
    }

    /// Builder: set media change timeout.
    pub fn with_media_change_timeout(mut self, timeout: Duration) -> Self {
        self.media_change_timeout = Some(timeout);
        self
    }

    /// Builder: set max frame size.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MethodConfig::default();
        assert_eq!(config.max_concurrent_requests, None);
        assert_eq!(config.authorization_timeout, None);
        assert_eq!(config.media_change_timeout, None);
        assert_eq!(config.max_frame_size, 1_048_576);
    }

    #[test]
    fn custom_config() {
        let config = MethodConfig::default()
            .with_max_concurrent_requests(4)
            .with_authorization_timeout(Duration::from_secs(30))
            .with_media_change_timeout(Duration::from_secs(300))
            .with_max_frame_size(4096);

        assert_eq!(config.max_concurrent_requests, Some(4));
        assert_eq!(config.authorization_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.media_change_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.max_frame_size, 4096);
    }
}
