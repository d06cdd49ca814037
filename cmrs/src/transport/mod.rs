//! The seam between the supervisor and the connection manager.
//!
//! The registry and adapters only talk to ConnMan through these traits.
//! [`dbus`] implements them over the system bus; tests plug in an
//! in-memory fake.
//!
//! Property maps returned here are raw: keys keep ConnMan's upper-camel
//! casing (`Powered`, `IPv4`). Normalization happens in the registry.

pub mod dbus;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;
use crate::api::models::{PropertyMap, PropertyValue, TechnologyKind};

/// A stream of `(wire name, value)` property change notifications.
pub type PropertyStream = BoxStream<'static, (String, PropertyValue)>;

/// Payload of the manager's `ServicesChanged` notification.
///
/// Only used for logging; consumers refetch the full list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicesChange {
    /// Ids of services added or modified.
    pub changed: Vec<String>,
    /// Ids of services that disappeared.
    pub removed: Vec<String>,
}

/// The connection manager root object.
#[async_trait]
pub trait ManagerTransport: Send + Sync {
    /// Global manager properties (`State`, `OfflineMode`, ...).
    async fn properties(&self) -> Result<PropertyMap>;

    /// The technology of the given kind, or `None` when the device has no
    /// such hardware.
    async fn technology(
        &self,
        kind: TechnologyKind,
    ) -> Result<Option<Arc<dyn TechnologyTransport>>>;

    /// Every visible service of every technology, in manager order.
    async fn services(&self) -> Result<Vec<(String, PropertyMap)>>;

    /// A handle on one service.
    async fn service(&self, id: &str) -> Result<Arc<dyn ServiceTransport>>;

    /// Manager property change notifications.
    async fn property_changes(&self) -> Result<PropertyStream>;

    /// `ServicesChanged` notifications.
    async fn services_changed(&self) -> Result<BoxStream<'static, ServicesChange>>;
}

/// One technology (Wi-Fi radio, wired interface).
#[async_trait]
pub trait TechnologyTransport: Send + Sync {
    fn kind(&self) -> TechnologyKind;

    async fn properties(&self) -> Result<PropertyMap>;

    /// Sets a property by its wire name.
    async fn set_property(&self, name: &str, value: PropertyValue) -> Result<()>;

    /// The visible services belonging to this technology, in manager order.
    async fn services(&self) -> Result<Vec<(String, PropertyMap)>>;

    /// Requests a scan. Completes when the scan has finished.
    async fn scan(&self) -> Result<()>;

    /// Turns tethering on, first setting the identifier and passphrase when
    /// given.
    async fn enable_tethering(&self, ssid: Option<&str>, passphrase: Option<&str>) -> Result<()>;

    async fn disable_tethering(&self) -> Result<()>;

    async fn property_changes(&self) -> Result<PropertyStream>;
}

/// One service (a network or connection point).
#[async_trait]
pub trait ServiceTransport: Send + Sync {
    fn id(&self) -> &str;

    async fn properties(&self) -> Result<PropertyMap>;

    /// Starts connecting. Returns once the manager accepted the request.
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Forgets the service: disconnects it and deletes what the manager
    /// stored about it.
    async fn remove(&self) -> Result<()>;

    async fn property_changes(&self) -> Result<PropertyStream>;
}
