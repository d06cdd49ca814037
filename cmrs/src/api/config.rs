//! Tunables for [`ConnMan`](crate::ConnMan) and its adapters.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::models::HotspotConfig;
use crate::types::constants::{DEFAULT_CREDENTIALS_DIR, EVENT_CAPACITY, timeouts};

/// Retry budgets and wait bounds used by the Wi-Fi workflows.
///
/// Delays are fixed; there is no backoff.
///
/// # Examples
///
/// ```rust
/// use cmrs::TimeoutConfig;
/// use std::time::Duration;
///
/// // Slow radio: wait longer after powering it up, retry lookups more
/// let timeouts = TimeoutConfig::new()
///     .with_enable_settle(Duration::from_secs(5))
///     .with_service_attempts(10);
///
/// assert_eq!(timeouts.service_attempts, 10);
/// assert_eq!(timeouts.networks_burst, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Wait after setting `Powered = true` (default 3s).
    pub enable_settle: Duration,
    /// Attempts to find a service by name or favorite flag (default 5).
    pub service_attempts: u32,
    /// Delay between service lookup attempts (default 1s).
    pub service_attempt_delay: Duration,
    /// Attempts to get a non-empty network list after a scan (default 5).
    pub networks_attempts: u32,
    /// Delay between network list attempts (default 1s).
    pub networks_attempt_delay: Duration,
    /// `ServicesChanged` notifications that settle a scan (default 2).
    pub networks_burst: usize,
    /// Upper bound on waiting for that burst (default 6s).
    pub networks_timeout: Duration,
    /// Upper bound on a hotspot toggle settling (default 15s).
    pub hotspot_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enable_settle: timeouts::enable_settle(),
            service_attempts: timeouts::SERVICE_ATTEMPTS,
            service_attempt_delay: timeouts::service_attempt_delay(),
            networks_attempts: timeouts::NETWORKS_ATTEMPTS,
            networks_attempt_delay: timeouts::networks_attempt_delay(),
            networks_burst: timeouts::NETWORKS_BURST,
            networks_timeout: timeouts::networks_timeout(),
            hotspot_timeout: timeouts::hotspot_timeout(),
        }
    }
}

impl TimeoutConfig {
    /// Creates a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enable_settle(mut self, delay: Duration) -> Self {
        self.enable_settle = delay;
        self
    }

    pub fn with_service_attempts(mut self, attempts: u32) -> Self {
        self.service_attempts = attempts;
        self
    }

    pub fn with_service_attempt_delay(mut self, delay: Duration) -> Self {
        self.service_attempt_delay = delay;
        self
    }

    pub fn with_networks_attempts(mut self, attempts: u32) -> Self {
        self.networks_attempts = attempts;
        self
    }

    pub fn with_networks_attempt_delay(mut self, delay: Duration) -> Self {
        self.networks_attempt_delay = delay;
        self
    }

    pub fn with_networks_burst(mut self, count: usize) -> Self {
        self.networks_burst = count;
        self
    }

    pub fn with_networks_timeout(mut self, timeout: Duration) -> Self {
        self.networks_timeout = timeout;
        self
    }

    pub fn with_hotspot_timeout(mut self, timeout: Duration) -> Self {
        self.hotspot_timeout = timeout;
        self
    }
}

/// Top-level configuration.
///
/// ```rust
/// use cmrs::{Config, HotspotConfig, TimeoutConfig};
///
/// let config = Config::new()
///     .with_credentials_dir("/tmp/connman")
///     .with_hotspot(HotspotConfig::new("device-setup", "setup1234"))
///     .with_timeouts(TimeoutConfig::new().with_networks_burst(3));
///
/// assert_eq!(config.timeouts.networks_burst, 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub timeouts: TimeoutConfig,
    /// Where the default credential store writes provisioning files.
    pub credentials_dir: PathBuf,
    /// Hotspot credentials used when `open_hotspot` is given none.
    pub hotspot: HotspotConfig,
    /// Buffer size of each event channel.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            credentials_dir: PathBuf::from(DEFAULT_CREDENTIALS_DIR),
            hotspot: HotspotConfig::default(),
            event_capacity: EVENT_CAPACITY,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = dir.into();
        self
    }

    pub fn with_hotspot(mut self, hotspot: HotspotConfig) -> Self {
        self.hotspot = hotspot;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
