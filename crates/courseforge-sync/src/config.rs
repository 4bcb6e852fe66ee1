//! Public configuration for the sync engine.
//!
//! Timing and endpoint settings shared by the HTTP transports and the
//! coordinator.

use std::time::Duration;

/// Configuration for transports and tracking.
///
/// # Example
///
/// ```
/// use courseforge_sync::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig::new()
///     .with_base_url("https://courses.example.com/api")
///     .with_poll_interval(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the course-generation API
    pub(crate) base_url: String,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Timeout for status requests and for establishing the push connection
    pub(crate) timeout: Duration,
    /// Optional bearer token
    pub(crate) token: Option<String>,
    /// Wait before the single reconnect attempt
    pub(crate) reconnect_delay: Duration,
    /// Period of the status poller
    pub(crate) poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            user_agent: concat!("courseforge-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            token: None,
            reconnect_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL of the API.
    ///
    /// Defaults to `http://127.0.0.1:8000/api`.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    ///
    /// Applies to whole status requests but only to connection setup for
    /// the push channel, which stays open indefinitely. Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the delay before reconnecting a dropped push connection.
    ///
    /// Defaults to 2 seconds.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the status polling period.
    ///
    /// Defaults to 3 seconds.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
