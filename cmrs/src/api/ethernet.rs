//! Wired connectivity.

use std::sync::Arc;

use log::debug;
use tokio::sync::broadcast;

use crate::Result;
use crate::api::config::Config;
use crate::api::models::{
    ConnmanError, Event, PropertyMap, PropertyValue, ServiceRecord, TechnologyKind,
};
use crate::core::registry::{ServiceRegistry, ethernet_selector};
use crate::transport::ManagerTransport;

/// The wired interface, as supervised through ConnMan.
///
/// A cable offers a single service, so there is no scanning, joining or
/// security handling; the adapter only tracks state.
pub struct EthernetAdapter {
    registry: ServiceRegistry,
}

impl EthernetAdapter {
    pub(crate) async fn init(manager: Arc<dyn ManagerTransport>, config: &Config) -> Result<Self> {
        let technology = manager
            .technology(TechnologyKind::Ethernet)
            .await?
            .ok_or(ConnmanError::NoTechnology(TechnologyKind::Ethernet))?;
        let registry =
            ServiceRegistry::init(manager, technology, ethernet_selector, config.event_capacity)
                .await?;
        debug!(
            "Ethernet initialized, service state: {}",
            registry.connection_properties().state
        );
        Ok(Self { registry })
    }

    pub fn properties(&self) -> PropertyMap {
        self.registry.properties()
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.registry.property(name)
    }

    /// The wired service, or the cleared record when unplugged.
    pub fn connection_properties(&self) -> ServiceRecord {
        self.registry.connection_properties()
    }

    /// Visible wired services, as of the last list update.
    pub fn services(&self) -> Vec<ServiceRecord> {
        self.registry
            .services()
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    pub async fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.registry.set_property(name, value.into()).await
    }

    /// True when the wired service is `ready` or `online`.
    pub fn is_connected(&self) -> bool {
        self.registry.connection_properties().state.is_connected()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.registry.subscribe()
    }
}
