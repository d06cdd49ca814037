//! Constants for ConnMan D-Bus interface values.
//!
//! These constants correspond to the names, paths, and error identifiers used
//! by ConnMan's D-Bus API, plus the default timings the adapters rely on.

/// Technology type names as reported in the `Type` property.
pub mod technology_type {
    pub const WIFI: &str = "wifi";
    pub const ETHERNET: &str = "ethernet";
}

/// Wire names of properties this crate reads or writes.
pub mod property {
    pub const TETHERING: &str = "Tethering";
    pub const TETHERING_IDENTIFIER: &str = "TetheringIdentifier";
    pub const TETHERING_PASSPHRASE: &str = "TetheringPassphrase";
    pub const TYPE: &str = "Type";
}

/// D-Bus error names with special handling.
pub mod errors {
    /// Tethering was already off; closing a hotspot treats this as success.
    pub const ALREADY_DISABLED: &str = "net.connman.Error.AlreadyDisabled";
    /// Returned by scans while the radio is broadcasting a hotspot.
    pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
    /// Tethering passphrase missing or shorter than 8 characters.
    pub const PASSPHRASE_REQUIRED: &str = "net.connman.Error.PassphraseRequired";
}

/// Name shown for services that do not broadcast one.
pub const HIDDEN_SSID: &str = "*hidden*";

/// Default location of ConnMan provisioning files.
pub const DEFAULT_CREDENTIALS_DIR: &str = "/var/lib/connman";

/// Default buffer size of the event channel.
pub const EVENT_CAPACITY: usize = 256;

/// Default timings for retry loops and event waits.
///
/// Delays are fixed (no backoff). They exist to let the radio and ConnMan
/// settle, not to avoid overload.
pub mod timeouts {
    use std::time::Duration;

    /// Time to wait after powering the radio before it is usable (3 seconds).
    ///
    /// ConnMan acknowledges `Powered = true` before the hardware is up.
    const ENABLE_SETTLE_MS: u64 = 3000;

    /// Attempts made to find a single service by name or favorite flag.
    pub const SERVICE_ATTEMPTS: u32 = 5;

    /// Delay between service lookup attempts (1 second).
    const SERVICE_ATTEMPT_DELAY_MS: u64 = 1000;

    /// Attempts made to fetch a non-empty network list after a scan.
    pub const NETWORKS_ATTEMPTS: u32 = 5;

    /// Delay between network list attempts (1 second).
    const NETWORKS_ATTEMPT_DELAY_MS: u64 = 1000;

    /// Number of `ServicesChanged` notifications that settle a scan.
    pub const NETWORKS_BURST: usize = 2;

    /// Upper bound on waiting for the burst before refetching manually (6 seconds).
    const NETWORKS_TIMEOUT_MS: u64 = 6000;

    /// Upper bound on waiting for a hotspot toggle to settle (15 seconds).
    const HOTSPOT_TIMEOUT_MS: u64 = 15000;

    /// Returns the radio power-up settle delay.
    pub fn enable_settle() -> Duration {
        Duration::from_millis(ENABLE_SETTLE_MS)
    }

    /// Returns the delay between service lookup attempts.
    pub fn service_attempt_delay() -> Duration {
        Duration::from_millis(SERVICE_ATTEMPT_DELAY_MS)
    }

    /// Returns the delay between network list attempts.
    pub fn networks_attempt_delay() -> Duration {
        Duration::from_millis(NETWORKS_ATTEMPT_DELAY_MS)
    }

    /// Returns the scan burst timeout.
    pub fn networks_timeout() -> Duration {
        Duration::from_millis(NETWORKS_TIMEOUT_MS)
    }

    /// Returns the hotspot settle timeout.
    pub fn hotspot_timeout() -> Duration {
        Duration::from_millis(HOTSPOT_TIMEOUT_MS)
    }
}

/// One-character shorthands for service states in network summaries.
pub mod state_shorthand {
    pub const ONLINE: char = 'O';
    pub const READY: char = 'R';
    pub const ASSOCIATION: char = 'a';
    pub const CONFIGURATION: char = 'c';
    pub const DISCONNECT: char = 'd';
    pub const IDLE: char = ' ';
    pub const FAILURE: char = 'x';
    pub const UNKNOWN: char = '?';
}
