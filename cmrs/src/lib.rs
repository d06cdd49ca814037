//! A Rust library for supervising Wi-Fi and wired connectivity via ConnMan.
//!
//! This crate provides a high-level async API over the ConnMan connection
//! manager for embedded Linux devices:
//!
//! - Scanning and listing visible Wi-Fi networks
//! - Joining open and secured networks, storing their passphrases
//! - Forgetting networks
//! - Falling back to a local access point ("hotspot")
//! - Tracking live technology and connection state as events
//!
//! # Example
//!
//! ```no_run
//! use cmrs::{ConnMan, HotspotConfig};
//!
//! # async fn example() -> cmrs::Result<()> {
//! let connman = ConnMan::new().await?;
//! let wifi = connman.wifi().await?;
//!
//! // List visible networks
//! for net in wifi.get_networks().await? {
//!     println!("{} ({}%)", net.ssid, net.strength);
//! }
//!
//! // Join a network, or become an access point if that fails
//! if let Err(e) = wifi.join("MyNetwork", Some("password123")).await {
//!     eprintln!("join failed: {e}");
//!     wifi.open_hotspot(HotspotConfig::new("device-setup", "setup1234")).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, ConnmanError>`. D-Bus error replies are
//! kept by name in [`ConnmanError::Method`]; workflow failures such as a
//! rejected passphrase or a network out of range have their own variants.
//!
//! # Signal-Based State Tracking
//!
//! Every adapter keeps a local copy of ConnMan's state, updated from D-Bus
//! signals rather than by polling. Waits always subscribe before issuing
//! the call they wait on, so no transition is missed. Repeated values are
//! filtered out before they reach subscribers.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:
//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod dbus;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod transport;

// Re-exported public API
pub use api::config::{Config, TimeoutConfig};
pub use api::connman::ConnMan;
pub use api::ethernet::EthernetAdapter;
pub use api::models::{
    ConnmanError, Event, HotspotConfig, HotspotOp, PropertyMap, PropertyValue, ScanOptions,
    ServiceRecord, ServiceState, Services, TechnologyKind,
};
pub use api::wifi::WifiAdapter;
pub use crate::core::credentials::{ConfigFileStore, CredentialStore};

/// A specialized `Result` type for ConnMan operations.
pub type Result<T> = std::result::Result<T, ConnmanError>;
