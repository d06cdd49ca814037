//! ConnMan Manager proxy.

use std::collections::HashMap;

use zbus::{Result, proxy};
use zvariant::{OwnedObjectPath, OwnedValue};

/// Proxy for the ConnMan manager, the root object at `/`.
///
/// Objects are listed as `(path, properties)` pairs: technologies live under
/// `/net/connman/technology/`, services under `/net/connman/service/`.
///
/// # Signals
///
/// - `PropertyChanged` fires for each changed global property.
/// - `ServicesChanged` fires when services appear, change order, or vanish.
///   Scans usually produce a short burst of them.
#[proxy(
    interface = "net.connman.Manager",
    default_service = "net.connman",
    default_path = "/"
)]
pub trait ConnmanManager {
    /// Returns global properties (`State`, `OfflineMode`, `SessionMode`).
    fn get_properties(&self) -> Result<HashMap<String, OwnedValue>>;

    /// Lists technologies with their properties.
    fn get_technologies(&self) -> Result<Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>>;

    /// Lists visible services of every technology, best first.
    fn get_services(&self) -> Result<Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>>;

    /// Signal emitted when a global property changes.
    #[zbus(signal)]
    fn property_changed(&self, name: String, value: OwnedValue);

    /// Signal emitted when the service list changes.
    ///
    /// Arguments:
    /// - `changed`: added or modified services with the properties that changed
    /// - `removed`: paths of services that disappeared
    #[zbus(signal)]
    fn services_changed(
        &self,
        changed: Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>,
        removed: Vec<OwnedObjectPath>,
    );
}
