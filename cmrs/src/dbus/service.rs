//! ConnMan Service proxy.

use std::collections::HashMap;

use zbus::{Result, proxy};
use zvariant::OwnedValue;

/// Proxy for a service (one network or connection point).
///
/// `Connect` returns once the request is accepted; progress is reported
/// through `PropertyChanged("State", ...)`, failures also set `Error`.
#[proxy(interface = "net.connman.Service", default_service = "net.connman")]
pub trait ConnmanService {
    fn get_properties(&self) -> Result<HashMap<String, OwnedValue>>;

    fn connect(&self) -> Result<()>;

    fn disconnect(&self) -> Result<()>;

    /// Disconnects and drops stored settings. Only valid for favorites.
    fn remove(&self) -> Result<()>;

    #[zbus(signal)]
    fn property_changed(&self, name: String, value: OwnedValue);
}
