//! In-memory ConnMan used by the integration tests.
//!
//! `Fake` implements the transport traits over plain maps. Every mutating
//! call is recorded in a call log and produces the notifications ConnMan
//! would send, synchronously, before the call returns.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cmrs::transport::{
    ManagerTransport, PropertyStream, ServiceTransport, ServicesChange, TechnologyTransport,
};
use cmrs::{
    Config, ConnMan, ConnmanError, CredentialStore, Event, PropertyMap, PropertyValue,
    TechnologyKind,
};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast::{self, error::RecvError};

pub const ALREADY_DISABLED: &str = "net.connman.Error.AlreadyDisabled";
pub const PASSPHRASE_REQUIRED: &str = "net.connman.Error.PassphraseRequired";
pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
pub const FAILED: &str = "net.connman.Error.Failed";

/// What `Connect` does to a service.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// association, configuration, ready
    Ready,
    /// Error = reason, then failure
    Failure(&'static str),
    /// The call itself is rejected.
    Reject(&'static str),
}

type PropertyTx = broadcast::Sender<(String, PropertyValue)>;

#[derive(Default)]
struct State {
    manager: PropertyMap,
    technologies: HashMap<&'static str, PropertyMap>,
    services: Vec<(String, PropertyMap)>,
    outcomes: HashMap<String, ConnectOutcome>,
    scan_bursts: usize,
    quiet_tethering: bool,
    /// Error name `Scan` fails with.
    scan_error: Option<&'static str>,
    /// Error name `DisableTethering` fails with, when tethering is on.
    disable_tethering_error: Option<&'static str>,
    calls: Vec<String>,
    /// Property and service list fetches.
    reads: usize,
}

struct Shared {
    state: Mutex<State>,
    manager_tx: PropertyTx,
    services_tx: broadcast::Sender<ServicesChange>,
    technology_tx: Mutex<HashMap<&'static str, PropertyTx>>,
    service_tx: Mutex<HashMap<String, PropertyTx>>,
}

#[derive(Clone)]
pub struct Fake {
    shared: Arc<Shared>,
}

fn subscribe<T: Clone + Send + 'static>(tx: &broadcast::Sender<T>) -> BoxStream<'static, T> {
    stream::unfold(tx.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

fn tech_key(kind: TechnologyKind) -> &'static str {
    match kind {
        TechnologyKind::Wifi => "wifi",
        TechnologyKind::Ethernet => "ethernet",
    }
}

pub fn props(entries: &[(&str, PropertyValue)]) -> PropertyMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn list(items: &[&str]) -> PropertyValue {
    PropertyValue::List(items.iter().map(|s| PropertyValue::from(*s)).collect())
}

/// Raw attributes of a Wi-Fi service.
pub fn wifi_service(name: &str, state: &str, security: &[&str], favorite: bool) -> PropertyMap {
    props(&[
        ("Type", "wifi".into()),
        ("Name", name.into()),
        ("State", state.into()),
        ("Strength", PropertyValue::Int(60)),
        ("Security", list(security)),
        ("Favorite", favorite.into()),
        ("Immutable", false.into()),
        ("AutoConnect", favorite.into()),
    ])
}

pub fn ethernet_service(state: &str) -> PropertyMap {
    props(&[
        ("Type", "ethernet".into()),
        ("Name", "Wired".into()),
        ("State", state.into()),
        ("Security", list(&[])),
        ("Favorite", true.into()),
        ("AutoConnect", true.into()),
    ])
}

pub fn ipv4(address: &str) -> PropertyValue {
    PropertyValue::Map(props(&[("Method", "dhcp".into()), ("Address", address.into())]))
}

impl Fake {
    /// A device with a powered Wi-Fi radio, no hotspot and no services.
    pub fn new() -> Self {
        let (manager_tx, _) = broadcast::channel(64);
        let (services_tx, _) = broadcast::channel(64);
        let fake = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    manager: props(&[("State", "idle".into()), ("OfflineMode", false.into())]),
                    scan_bursts: 2,
                    ..Default::default()
                }),
                manager_tx,
                services_tx,
                technology_tx: Mutex::new(HashMap::new()),
                service_tx: Mutex::new(HashMap::new()),
            }),
        };
        fake.add_technology(TechnologyKind::Wifi, true, false);
        fake
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.shared.state.lock().unwrap()
    }

    fn technology_tx(&self, kind: TechnologyKind) -> PropertyTx {
        self.shared
            .technology_tx
            .lock()
            .unwrap()
            .entry(tech_key(kind))
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn service_tx(&self, id: &str) -> PropertyTx {
        self.shared
            .service_tx
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.state().calls.push(call.into());
    }

    pub fn add_technology(&self, kind: TechnologyKind, powered: bool, tethering: bool) {
        self.state().technologies.insert(
            tech_key(kind),
            props(&[
                ("Name", kind.to_string().into()),
                ("Type", tech_key(kind).into()),
                ("Powered", powered.into()),
                ("Connected", false.into()),
                ("Tethering", tethering.into()),
            ]),
        );
    }

    pub fn remove_technology(&self, kind: TechnologyKind) {
        self.state().technologies.remove(tech_key(kind));
    }

    pub fn add_service(&self, id: &str, raw: PropertyMap) {
        self.state().services.push((id.to_string(), raw));
    }

    pub fn set_connect_outcome(&self, id: &str, outcome: ConnectOutcome) {
        self.state().outcomes.insert(id.to_string(), outcome);
    }

    /// Number of `ServicesChanged` notifications each scan produces.
    pub fn set_scan_bursts(&self, bursts: usize) {
        self.state().scan_bursts = bursts;
    }

    /// Toggling tethering no longer produces `ServicesChanged`.
    pub fn set_quiet_tethering(&self, quiet: bool) {
        self.state().quiet_tethering = quiet;
    }

    pub fn set_scan_error(&self, name: &'static str) {
        self.state().scan_error = Some(name);
    }

    pub fn set_disable_tethering_error(&self, name: &'static str) {
        self.state().disable_tethering_error = Some(name);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn reads(&self) -> usize {
        self.state().reads
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn service_property(&self, id: &str, name: &str) -> Option<PropertyValue> {
        self.state()
            .services
            .iter()
            .find(|(sid, _)| sid == id)
            .and_then(|(_, raw)| raw.get(name).cloned())
    }

    /// Changes a service attribute without notifying anyone.
    pub fn set_service_property_silently(&self, id: &str, name: &str, value: PropertyValue) {
        if let Some((_, raw)) = self.state().services.iter_mut().find(|(sid, _)| sid == id) {
            raw.insert(name.to_string(), value);
        }
    }

    /// Changes a service attribute and sends its `PropertyChanged`.
    pub fn emit_service_property(&self, id: &str, name: &str, value: PropertyValue) {
        self.set_service_property_silently(id, name, value.clone());
        let _ = self.service_tx(id).send((name.to_string(), value));
    }

    /// Changes a technology attribute and sends its `PropertyChanged`.
    pub fn emit_technology_property(&self, kind: TechnologyKind, name: &str, value: PropertyValue) {
        if let Some(raw) = self.state().technologies.get_mut(tech_key(kind)) {
            raw.insert(name.to_string(), value.clone());
        }
        let _ = self.technology_tx(kind).send((name.to_string(), value));
    }

    pub fn emit_manager_property(&self, name: &str, value: PropertyValue) {
        self.state().manager.insert(name.to_string(), value.clone());
        let _ = self.shared.manager_tx.send((name.to_string(), value));
    }

    pub fn emit_services_changed(&self) {
        let changed = self.state().services.iter().map(|(id, _)| id.clone()).collect();
        let _ = self.shared.services_tx.send(ServicesChange {
            changed,
            removed: Vec::new(),
        });
    }

    fn tethering(&self, kind: TechnologyKind) -> bool {
        self.state()
            .technologies
            .get(tech_key(kind))
            .and_then(|raw| raw.get("Tethering"))
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ManagerTransport for Fake {
    async fn properties(&self) -> cmrs::Result<PropertyMap> {
        Ok(self.state().manager.clone())
    }

    async fn technology(
        &self,
        kind: TechnologyKind,
    ) -> cmrs::Result<Option<Arc<dyn TechnologyTransport>>> {
        if !self.state().technologies.contains_key(tech_key(kind)) {
            return Ok(None);
        }
        Ok(Some(Arc::new(FakeTechnology {
            fake: self.clone(),
            kind,
        })))
    }

    async fn services(&self) -> cmrs::Result<Vec<(String, PropertyMap)>> {
        let mut state = self.state();
        state.reads += 1;
        Ok(state.services.clone())
    }

    async fn service(&self, id: &str) -> cmrs::Result<Arc<dyn ServiceTransport>> {
        Ok(Arc::new(FakeService {
            fake: self.clone(),
            id: id.to_string(),
        }))
    }

    async fn property_changes(&self) -> cmrs::Result<PropertyStream> {
        Ok(subscribe(&self.shared.manager_tx))
    }

    async fn services_changed(&self) -> cmrs::Result<BoxStream<'static, ServicesChange>> {
        Ok(subscribe(&self.shared.services_tx))
    }
}

pub struct FakeTechnology {
    fake: Fake,
    kind: TechnologyKind,
}

impl FakeTechnology {
    fn set_tethering(&self, on: bool) {
        self.fake
            .emit_technology_property(self.kind, "Tethering", on.into());
        if !self.fake.state().quiet_tethering {
            self.fake.emit_services_changed();
        }
    }
}

#[async_trait]
impl TechnologyTransport for FakeTechnology {
    fn kind(&self) -> TechnologyKind {
        self.kind
    }

    async fn properties(&self) -> cmrs::Result<PropertyMap> {
        Ok(self
            .fake
            .state()
            .technologies
            .get(tech_key(self.kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_property(&self, name: &str, value: PropertyValue) -> cmrs::Result<()> {
        self.fake.record(format!("set:{name}={value}"));
        self.fake.emit_technology_property(self.kind, name, value);
        Ok(())
    }

    async fn services(&self) -> cmrs::Result<Vec<(String, PropertyMap)>> {
        let key = tech_key(self.kind);
        let mut state = self.fake.state();
        state.reads += 1;
        Ok(state
            .services
            .iter()
            .filter(|(_, raw)| raw.get("Type").and_then(PropertyValue::as_str) == Some(key))
            .cloned()
            .collect())
    }

    async fn scan(&self) -> cmrs::Result<()> {
        self.fake.record("scan");
        if let Some(name) = self.fake.state().scan_error {
            return Err(ConnmanError::method(name, "Scan failed"));
        }
        let bursts = self.fake.state().scan_bursts;
        for _ in 0..bursts {
            self.fake.emit_services_changed();
        }
        Ok(())
    }

    async fn enable_tethering(
        &self,
        ssid: Option<&str>,
        passphrase: Option<&str>,
    ) -> cmrs::Result<()> {
        self.fake.record("enable_tethering");
        if passphrase.is_some_and(|p| p.len() < 8) {
            return Err(ConnmanError::method(PASSPHRASE_REQUIRED, "Passphrase required"));
        }
        if let Some(ssid) = ssid {
            self.fake
                .emit_technology_property(self.kind, "TetheringIdentifier", ssid.into());
        }
        if let Some(passphrase) = passphrase {
            self.fake
                .emit_technology_property(self.kind, "TetheringPassphrase", passphrase.into());
        }
        self.set_tethering(true);
        Ok(())
    }

    async fn disable_tethering(&self) -> cmrs::Result<()> {
        self.fake.record("disable_tethering");
        if !self.fake.tethering(self.kind) {
            return Err(ConnmanError::method(ALREADY_DISABLED, "Already disabled"));
        }
        if let Some(name) = self.fake.state().disable_tethering_error {
            return Err(ConnmanError::method(name, "Disabling tethering failed"));
        }
        self.set_tethering(false);
        Ok(())
    }

    async fn property_changes(&self) -> cmrs::Result<PropertyStream> {
        Ok(subscribe(&self.fake.technology_tx(self.kind)))
    }
}

pub struct FakeService {
    fake: Fake,
    id: String,
}

#[async_trait]
impl ServiceTransport for FakeService {
    fn id(&self) -> &str {
        &self.id
    }

    async fn properties(&self) -> cmrs::Result<PropertyMap> {
        self.fake
            .state()
            .services
            .iter()
            .find(|(id, _)| *id == self.id)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| ConnmanError::method("net.connman.Error.NotFound", "No such service"))
    }

    async fn connect(&self) -> cmrs::Result<()> {
        self.fake.record(format!("connect:{}", self.id));
        let outcome = self
            .fake
            .state()
            .outcomes
            .get(&self.id)
            .cloned()
            .unwrap_or(ConnectOutcome::Ready);

        match outcome {
            ConnectOutcome::Ready => {
                for state in ["association", "configuration", "ready"] {
                    self.fake.emit_service_property(&self.id, "State", state.into());
                }
                self.fake.emit_services_changed();
            }
            ConnectOutcome::Failure(reason) => {
                self.fake.emit_service_property(&self.id, "State", "association".into());
                self.fake.emit_service_property(&self.id, "Error", reason.into());
                self.fake.emit_service_property(&self.id, "State", "failure".into());
                self.fake.emit_services_changed();
            }
            ConnectOutcome::Reject(name) => {
                return Err(ConnmanError::method(name, "Connect rejected"));
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> cmrs::Result<()> {
        self.fake.record(format!("disconnect:{}", self.id));
        self.fake.emit_service_property(&self.id, "State", "idle".into());
        self.fake.emit_services_changed();
        Ok(())
    }

    async fn remove(&self) -> cmrs::Result<()> {
        self.fake.record(format!("remove:{}", self.id));
        self.fake.emit_service_property(&self.id, "Favorite", false.into());
        self.fake.emit_service_property(&self.id, "State", "idle".into());
        self.fake.emit_services_changed();
        Ok(())
    }

    async fn property_changes(&self) -> cmrs::Result<PropertyStream> {
        Ok(subscribe(&self.fake.service_tx(&self.id)))
    }
}

/// Credential store keeping passphrases in memory.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn get(&self, ssid: &str) -> Option<String> {
        self.entries.lock().unwrap().get(ssid).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, ssid: &str, passphrase: &str) -> cmrs::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(ssid.to_string(), passphrase.to_string());
        Ok(())
    }

    async fn remove(&self, ssid: &str) -> cmrs::Result<()> {
        self.entries.lock().unwrap().remove(ssid);
        Ok(())
    }
}

pub async fn connman(fake: &Fake, store: &Arc<MemoryStore>) -> ConnMan {
    connman_with(fake, store, Config::default()).await
}

pub async fn connman_with(fake: &Fake, store: &Arc<MemoryStore>, config: Config) -> ConnMan {
    ConnMan::with_transport(Arc::new(fake.clone()), store.clone(), config)
        .await
        .expect("connman over fake transport")
}

/// Lets background tasks catch up.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Everything currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// `(name, value)` of the `ConnectionPropertyChanged` events in `events`.
pub fn connection_changes(events: &[Event]) -> Vec<(String, PropertyValue)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ConnectionPropertyChanged { name, value } => Some((name.clone(), value.clone())),
            _ => None,
        })
        .collect()
}
