//! Per-technology view of ConnMan state.
//!
//! A [`ServiceRegistry`] owns the technology properties, the current
//! service and the visible network list for one technology. It listens to
//! change notifications in background tasks, keeps the local copy current,
//! and republishes every effective change as an [`Event`].
//!
//! Change notifications are bursty and often repeat values; a value equal
//! to the cached one produces no event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;

use crate::Result;
use crate::api::models::{
    Event, PropertyMap, PropertyValue, ServiceRecord, ServiceState, Services,
};
use crate::core::parser::{address_of, parse_properties, parse_service, parse_services};
use crate::transport::{
    ManagerTransport, PropertyStream, ServiceTransport, ServicesChange, TechnologyTransport,
};
use crate::util::utils::{lower_first, services_summary, upper_first};

/// Decides whether a service in the given state counts as current.
pub(crate) type Selector = fn(&ServiceState) -> bool;

/// Wi-Fi: anything that is neither idle nor failed.
pub(crate) fn wifi_selector(state: &ServiceState) -> bool {
    !matches!(state, ServiceState::Idle | ServiceState::Failure)
}

/// Wired: any state of a plugged-in cable.
pub(crate) fn ethernet_selector(state: &ServiceState) -> bool {
    matches!(
        state,
        ServiceState::Ready
            | ServiceState::Online
            | ServiceState::Association
            | ServiceState::Configuration
            | ServiceState::Disconnect
            | ServiceState::Failure
    )
}

/// How [`ServiceRegistry::find_service`] picks a service.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ServiceQuery<'a> {
    /// First service with this ssid.
    Name(&'a str),
    /// First favorite service.
    Favorite,
}

impl ServiceQuery<'_> {
    fn matches(&self, record: &ServiceRecord) -> bool {
        match self {
            Self::Name(ssid) => record.ssid == *ssid,
            Self::Favorite => record.favorite,
        }
    }
}

/// The tracked service: its handle and the task watching its properties.
struct ActiveService {
    handle: Arc<dyn ServiceTransport>,
    watcher: JoinHandle<()>,
}

impl Drop for ActiveService {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[derive(Default)]
struct RegistryState {
    properties: PropertyMap,
    current: Option<ActiveService>,
    /// Normalized attribute map of the current service, for de-duplication.
    service_raw: PropertyMap,
    service_properties: ServiceRecord,
    services: Services,
    /// Last snapshot taken while tethering was off.
    services_cache: Services,
    last_error: Option<String>,
}

impl RegistryState {
    fn tethering(&self) -> bool {
        self.properties
            .get("tethering")
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    fn current_id(&self) -> Option<String> {
        self.current.as_ref().map(|c| c.handle.id().to_owned())
    }
}

struct Inner {
    manager: Arc<dyn ManagerTransport>,
    technology: Arc<dyn TechnologyTransport>,
    selector: Selector,
    state: Mutex<RegistryState>,
    events: broadcast::Sender<Event>,
}

pub(crate) struct ServiceRegistry {
    inner: Arc<Inner>,
    /// Released by the first [`ServiceRegistry::subscribe`].
    replay_gate: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl ServiceRegistry {
    /// Subscribes to technology and services notifications, loads the
    /// initial state and attaches the current service.
    ///
    /// A replay of the loaded state (every technology property, the current
    /// service and each of its fields) is held back until the first
    /// [`subscribe`](Self::subscribe), so it can never be published before
    /// the adapter owning this registry has been handed out.
    pub(crate) async fn init(
        manager: Arc<dyn ManagerTransport>,
        technology: Arc<dyn TechnologyTransport>,
        selector: Selector,
        event_capacity: usize,
    ) -> Result<Self> {
        let kind = technology.kind();

        // Subscribe FIRST so nothing between the reads below is missed
        let property_changes = technology.property_changes().await?;
        let services_changes = manager.services_changed().await?;
        debug!("Subscribed to {kind} PropertyChanged and ServicesChanged");

        let properties = parse_properties(&technology.properties().await?);
        let raw_services = technology.services().await?;
        let services = parse_services(&raw_services);
        debug!("Initial {kind} services:{}", services_summary(&services));

        let mut state = RegistryState {
            properties,
            service_properties: ServiceRecord::cleared(),
            services: services.clone(),
            ..Default::default()
        };
        if !state.tethering() {
            state.services_cache = services.clone();
        }

        let (events, _) = broadcast::channel(event_capacity.max(1));
        let inner = Arc::new(Inner {
            manager,
            technology,
            selector,
            state: Mutex::new(state),
            events,
        });

        if let Some(id) = inner.select(&services) {
            let handle = inner.manager.service(&id).await?;
            inner.attach(handle, false).await?;
        }

        let replay_gate = Arc::new(Notify::new());
        let tasks = vec![
            tokio::spawn(listen_technology(Arc::downgrade(&inner), property_changes)),
            tokio::spawn(listen_services(Arc::downgrade(&inner), services_changes)),
            tokio::spawn(replay(Arc::downgrade(&inner), Arc::clone(&replay_gate))),
        ];

        Ok(Self {
            inner,
            replay_gate,
            tasks,
        })
    }

    pub(crate) fn technology(&self) -> &Arc<dyn TechnologyTransport> {
        &self.inner.technology
    }

    /// Subscribes to events. The first call releases the initial replay,
    /// which the returned receiver is guaranteed to see.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        let rx = self.inner.events.subscribe();
        self.replay_gate.notify_one();
        rx
    }

    /// Subscribes without releasing the replay, for internal waits.
    pub(crate) fn receiver(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub(crate) fn properties(&self) -> PropertyMap {
        self.inner.state().properties.clone()
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        self.inner.state().properties.get(name).cloned()
    }

    pub(crate) fn tethering(&self) -> bool {
        self.inner.state().tethering()
    }

    pub(crate) fn connection_properties(&self) -> ServiceRecord {
        self.inner.state().service_properties.clone()
    }

    pub(crate) fn services(&self) -> Services {
        self.inner.state().services.clone()
    }

    pub(crate) fn services_cache(&self) -> Services {
        self.inner.state().services_cache.clone()
    }

    pub(crate) fn current_service(&self) -> Option<Arc<dyn ServiceTransport>> {
        self.inner
            .state()
            .current
            .as_ref()
            .map(|c| Arc::clone(&c.handle))
    }

    /// The last `Error` property reported by the current service.
    pub(crate) fn last_error(&self) -> Option<String> {
        self.inner.state().last_error.clone()
    }

    /// Sets a technology property. `name` may be given lower-camel.
    pub(crate) async fn set_property(&self, name: &str, value: PropertyValue) -> Result<()> {
        let wire = upper_first(name);
        debug!("Setting {} property {wire} = {value}", self.inner.technology.kind());
        self.inner.technology.set_property(&wire, value).await
    }

    /// Refetches the network list, publishes it and re-evaluates the
    /// current service.
    pub(crate) async fn refresh_services(&self) -> Result<Services> {
        self.inner.refresh_services().await
    }

    /// Refetches the network list and returns the first match with a handle.
    pub(crate) async fn find_service(
        &self,
        query: ServiceQuery<'_>,
    ) -> Result<Option<(Arc<dyn ServiceTransport>, ServiceRecord)>> {
        let raw = self.inner.technology.services().await?;
        let Some((id, record)) = parse_services(&raw)
            .into_iter()
            .find(|(_, record)| query.matches(record))
        else {
            debug!("No service matching {query:?}");
            return Ok(None);
        };
        let handle = self.inner.manager.service(&id).await?;
        Ok(Some((handle, record)))
    }

    /// Makes `handle` the current service, replacing any previous one.
    pub(crate) async fn switch_service(&self, handle: Arc<dyn ServiceTransport>) -> Result<()> {
        self.inner.attach(handle, true).await
    }

    /// Drops the current service and publishes the cleared record.
    pub(crate) fn clear_service(&self) {
        self.inner.clear_service();
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn emit_record(&self, record: &ServiceRecord) {
        let mut fields: Vec<_> = record.to_properties().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in fields {
            self.emit(Event::ConnectionPropertyChanged { name, value });
        }
    }

    fn select(&self, services: &Services) -> Option<String> {
        services
            .iter()
            .find(|(_, record)| (self.selector)(&record.state))
            .map(|(id, _)| id.clone())
    }

    /// Starts tracking `handle`. With `announce`, publishes the switch and
    /// every field of the new service.
    async fn attach(
        self: &Arc<Self>,
        handle: Arc<dyn ServiceTransport>,
        announce: bool,
    ) -> Result<()> {
        let id = handle.id().to_owned();
        let changes = handle.property_changes().await?;
        let raw = parse_properties(&handle.properties().await?);
        let record = parse_service(&raw);
        debug!(
            "Current {} service: {id} ('{}', {})",
            self.technology.kind(),
            record.ssid,
            record.state
        );

        let watcher = tokio::spawn(watch_service(Arc::downgrade(self), id.clone(), changes));
        {
            let mut state = self.state();
            // Dropping the previous ActiveService aborts its watcher
            state.current = Some(ActiveService { handle, watcher });
            state.service_raw = raw;
            state.service_properties = record.clone();
            state.last_error = None;
        }

        if announce {
            self.emit(Event::ServiceChanged(Some(id)));
            self.emit_record(&record);
        }
        Ok(())
    }

    fn clear_service(&self) {
        let previous = {
            let mut state = self.state();
            state.service_raw.clear();
            state.service_properties = ServiceRecord::cleared();
            state.current.take()
        };
        if let Some(previous) = &previous {
            debug!("Cleared current service {}", previous.handle.id());
        }
        drop(previous);

        self.emit(Event::ServiceChanged(None));
        self.emit_record(&ServiceRecord::cleared());
    }

    fn on_technology_property(&self, name: String, value: PropertyValue) {
        let name = lower_first(&name);
        {
            let mut state = self.state();
            if state.properties.get(&name) == Some(&value) {
                return;
            }
            state.properties.insert(name.clone(), value.clone());
        }
        debug!("{} property changed: {name} = {value}", self.technology.kind());
        self.emit(Event::PropertyChanged { name, value });
    }

    fn on_service_property(&self, id: &str, name: String, value: PropertyValue) {
        let name = lower_first(&name);
        let mut extra = Vec::new();
        {
            let mut state = self.state();
            if state.current_id().as_deref() != Some(id) {
                return;
            }
            if name == "error" {
                warn!("Service {id} reported error: {value}");
                state.last_error = Some(value.to_string());
                return;
            }
            if state.service_raw.get(&name) == Some(&value) {
                return;
            }

            let old_address = state.service_properties.ipaddress.clone();
            state.service_raw.insert(name.clone(), value.clone());
            state.service_properties = parse_service(&state.service_raw);

            match name.as_str() {
                "name" => {
                    let ssid = state.service_properties.ssid.clone();
                    extra.push(("ssid".to_owned(), PropertyValue::Str(ssid)));
                }
                "iPv4" | "iPv6" => {
                    let alias = if name == "iPv4" { "ip4Address" } else { "ip6Address" };
                    if let Some(address) = address_of(&value) {
                        extra.push((alias.to_owned(), PropertyValue::Str(address)));
                    }
                    let address = &state.service_properties.ipaddress;
                    if *address != old_address {
                        extra.push(("ipaddress".to_owned(), PropertyValue::Str(address.clone())));
                    }
                }
                _ => {}
            }
        }

        debug!("Service {id} property changed: {name} = {value}");
        self.emit(Event::ConnectionPropertyChanged { name, value });
        for (name, value) in extra {
            self.emit(Event::ConnectionPropertyChanged { name, value });
        }
    }

    async fn refresh_services(self: &Arc<Self>) -> Result<Services> {
        let raw = self.technology.services().await?;
        let services = parse_services(&raw);
        debug!("{} services:{}", self.technology.kind(), services_summary(&services));

        let current = {
            let mut state = self.state();
            state.services = services.clone();
            if !state.tethering() {
                state.services_cache = services.clone();
            }
            state.current_id()
        };
        self.emit(Event::ServicesChanged(
            services.iter().map(|(_, record)| record.clone()).collect(),
        ));

        match self.select(&services) {
            Some(id) if current.as_deref() == Some(id.as_str()) => {}
            Some(id) => {
                debug!("Current service changed to {id}");
                let handle = self.manager.service(&id).await?;
                self.attach(handle, true).await?;
            }
            None if current.is_some() => self.clear_service(),
            None => {}
        }
        Ok(services)
    }
}

async fn listen_technology(inner: Weak<Inner>, mut changes: PropertyStream) {
    while let Some((name, value)) = changes.next().await {
        let Some(inner) = inner.upgrade() else { return };
        inner.on_technology_property(name, value);
    }
    warn!("Technology PropertyChanged stream ended");
}

async fn listen_services(
    inner: Weak<Inner>,
    mut changes: futures::stream::BoxStream<'static, ServicesChange>,
) {
    while let Some(change) = changes.next().await {
        let Some(inner) = inner.upgrade() else { return };
        debug!(
            "ServicesChanged: {} changed, {} removed",
            change.changed.len(),
            change.removed.len()
        );
        if let Err(e) = inner.refresh_services().await {
            warn!("Failed to refresh services: {e}");
        }
    }
    warn!("ServicesChanged stream ended");
}

async fn watch_service(inner: Weak<Inner>, id: String, mut changes: PropertyStream) {
    while let Some((name, value)) = changes.next().await {
        let Some(inner) = inner.upgrade() else { return };
        inner.on_service_property(&id, name, value);
    }
    debug!("PropertyChanged stream of service {id} ended");
}

async fn replay(inner: Weak<Inner>, gate: Arc<Notify>) {
    gate.notified().await;
    let Some(inner) = inner.upgrade() else { return };

    let (mut properties, current, record) = {
        let state = inner.state();
        let properties: Vec<_> = state.properties.clone().into_iter().collect();
        (properties, state.current_id(), state.service_properties.clone())
    };
    properties.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in properties {
        inner.emit(Event::PropertyChanged { name, value });
    }
    inner.emit(Event::ServiceChanged(current));
    inner.emit_record(&record);
}
