//! ConnMan Technology proxy.

use std::collections::HashMap;

use zbus::{Result, proxy};
use zvariant::{OwnedValue, Value};

/// Proxy for a technology such as `/net/connman/technology/wifi`.
///
/// Tethering is configured through properties: `TetheringIdentifier` and
/// `TetheringPassphrase` hold the hotspot credentials, `Tethering` switches
/// it on and off.
#[proxy(interface = "net.connman.Technology", default_service = "net.connman")]
pub trait ConnmanTechnology {
    /// Returns `Name`, `Type`, `Powered`, `Connected`, `Tethering`, ...
    fn get_properties(&self) -> Result<HashMap<String, OwnedValue>>;

    fn set_property(&self, name: &str, value: &Value<'_>) -> Result<()>;

    /// Triggers a scan; the reply arrives once it is done.
    fn scan(&self) -> Result<()>;

    #[zbus(signal)]
    fn property_changed(&self, name: String, value: OwnedValue);
}
