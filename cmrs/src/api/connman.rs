use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::StreamExt;
use futures::stream::BoxStream;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::Result;
use crate::api::config::Config;
use crate::api::ethernet::EthernetAdapter;
use crate::api::models::{Event, PropertyMap, PropertyValue};
use crate::api::wifi::WifiAdapter;
use crate::core::credentials::{ConfigFileStore, CredentialStore};
use crate::core::parser::{parse_properties, parse_services};
use crate::transport::dbus::DbusManager;
use crate::transport::{ManagerTransport, PropertyStream, ServicesChange};
use crate::util::utils::{lower_first, services_summary};

/// High-level interface to ConnMan.
///
/// This is the main entry point. It holds one connection to the manager,
/// tracks the manager's global properties and hands out the technology
/// adapters.
///
/// # Creating an Instance
///
/// ```no_run
/// use cmrs::ConnMan;
///
/// # async fn example() -> cmrs::Result<()> {
/// let connman = ConnMan::new().await?;
/// println!("state: {:?}", connman.property("state"));
/// # Ok(())
/// # }
/// ```
///
/// # Events
///
/// [`subscribe`](Self::subscribe) yields manager property changes as
/// [`Event::PropertyChanged`] and, whenever the service list changes, the
/// full list of every technology as [`Event::ServicesChanged`]. The
/// adapters have their own channels for technology level events.
///
/// ```no_run
/// use cmrs::{ConnMan, Event};
///
/// # async fn example() -> cmrs::Result<()> {
/// let connman = ConnMan::new().await?;
/// let mut events = connman.subscribe();
///
/// while let Ok(event) = events.recv().await {
///     if let Event::PropertyChanged { name, value } = event {
///         println!("{name} = {value}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnMan {
    inner: Arc<Inner>,
    credentials: Arc<dyn CredentialStore>,
    config: Config,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    manager: Arc<dyn ManagerTransport>,
    properties: Mutex<PropertyMap>,
    events: broadcast::Sender<Event>,
}

impl Drop for ConnMan {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl ConnMan {
    /// Creates a new `ConnMan` connected to the system D-Bus.
    pub async fn new() -> Result<Self> {
        Self::with_config(Config::default()).await
    }

    /// Creates a new `ConnMan` on the system D-Bus with custom settings.
    pub async fn with_config(config: Config) -> Result<Self> {
        let manager = DbusManager::system().await?;
        let credentials = ConfigFileStore::new(config.credentials_dir.clone());
        Self::with_transport(Arc::new(manager), Arc::new(credentials), config).await
    }

    /// Creates a `ConnMan` on a custom transport and credential store.
    pub async fn with_transport(
        manager: Arc<dyn ManagerTransport>,
        credentials: Arc<dyn CredentialStore>,
        config: Config,
    ) -> Result<Self> {
        // Subscribe FIRST to avoid race condition
        let property_changes = manager.property_changes().await?;
        let services_changes = manager.services_changed().await?;

        let properties = parse_properties(&manager.properties().await?);
        debug!("Manager properties: {properties:?}");

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let inner = Arc::new(Inner {
            manager,
            properties: Mutex::new(properties),
            events,
        });

        let tasks = vec![
            tokio::spawn(listen_properties(Arc::downgrade(&inner), property_changes)),
            tokio::spawn(listen_services(Arc::downgrade(&inner), services_changes)),
        ];

        Ok(Self {
            inner,
            credentials,
            config,
            tasks,
        })
    }

    /// Initializes the Wi-Fi adapter, powering the radio if it is off.
    pub async fn wifi(&self) -> Result<WifiAdapter> {
        WifiAdapter::init(
            Arc::clone(&self.inner.manager),
            Arc::clone(&self.credentials),
            self.config.clone(),
        )
        .await
    }

    /// Initializes the wired adapter.
    pub async fn ethernet(&self) -> Result<EthernetAdapter> {
        EthernetAdapter::init(Arc::clone(&self.inner.manager), &self.config).await
    }

    /// Manager properties (`state`, `offlineMode`, ...).
    pub fn properties(&self) -> PropertyMap {
        self.inner.properties().clone()
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.inner.properties().get(name).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Inner {
    fn properties(&self) -> MutexGuard<'_, PropertyMap> {
        self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_property(&self, name: String, value: PropertyValue) {
        let name = lower_first(&name);
        {
            let mut properties = self.properties();
            if properties.get(&name) == Some(&value) {
                return;
            }
            properties.insert(name.clone(), value.clone());
        }
        debug!("Manager property changed: {name} = {value}");
        let _ = self.events.send(Event::PropertyChanged { name, value });
    }

    async fn on_services_changed(&self, change: ServicesChange) -> Result<()> {
        debug!(
            "ServicesChanged: {} changed, {} removed",
            change.changed.len(),
            change.removed.len()
        );
        let services = parse_services(&self.manager.services().await?);
        debug!("Services:{}", services_summary(&services));
        let records = services.into_iter().map(|(_, record)| record).collect();
        let _ = self.events.send(Event::ServicesChanged(records));
        Ok(())
    }
}

async fn listen_properties(inner: Weak<Inner>, mut changes: PropertyStream) {
    while let Some((name, value)) = changes.next().await {
        let Some(inner) = inner.upgrade() else { return };
        inner.on_property(name, value);
    }
    warn!("Manager PropertyChanged stream ended");
}

async fn listen_services(inner: Weak<Inner>, mut changes: BoxStream<'static, ServicesChange>) {
    while let Some(change) = changes.next().await {
        let Some(inner) = inner.upgrade() else { return };
        if let Err(e) = inner.on_services_changed(change).await {
            warn!("Failed to refresh services: {e}");
        }
    }
    warn!("Manager ServicesChanged stream ended");
}
