//! Stored Wi-Fi credentials.
//!
//! ConnMan picks up provisioning files dropped into its state directory
//! (`/var/lib/connman` by default). Each network gets one file named after
//! the hex-encoded ssid, holding a single `[service_<hex>]` section.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use crate::Result;
use crate::types::constants::DEFAULT_CREDENTIALS_DIR;

/// Persists Wi-Fi passphrases so the connection manager can use them.
///
/// Implementations must be idempotent: `create` overwrites an existing
/// record and `remove` succeeds when there is nothing to remove.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores `passphrase` for `ssid`, replacing any previous record.
    async fn create(&self, ssid: &str, passphrase: &str) -> Result<()>;

    /// Deletes the record for `ssid`, if any.
    async fn remove(&self, ssid: &str) -> Result<()>;
}

/// A [`CredentialStore`] writing ConnMan provisioning files.
#[derive(Debug, Clone)]
pub struct ConfigFileStore {
    dir: PathBuf,
}

impl ConfigFileStore {
    /// Creates a store writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory files are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the provisioning file for `ssid`.
    pub fn path_for(&self, ssid: &str) -> PathBuf {
        self.dir.join(format!("network-{}.config", hex::encode(ssid)))
    }
}

impl Default for ConfigFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIALS_DIR)
    }
}

/// Renders the provisioning section for one network.
pub(crate) fn render_config(ssid: &str, passphrase: &str) -> String {
    let hex_ssid = hex::encode(ssid);
    format!("[service_{hex_ssid}]\nType = wifi\nSSID = {hex_ssid}\nPassphrase = {passphrase}\n")
}

#[async_trait]
impl CredentialStore for ConfigFileStore {
    async fn create(&self, ssid: &str, passphrase: &str) -> Result<()> {
        let path = self.path_for(ssid);
        debug!("Writing credentials for '{ssid}' to {}", path.display());
        tokio::fs::write(&path, render_config(ssid, passphrase)).await?;
        Ok(())
    }

    async fn remove(&self, ssid: &str) -> Result<()> {
        let path = self.path_for(ssid);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed credentials file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No credentials stored for '{ssid}'");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
