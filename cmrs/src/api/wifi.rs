//! Wi-Fi workflows: scanning, joining, forgetting, and hotspot mode.

use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{FutureExt, select};
use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::Result;
use crate::api::config::Config;
use crate::api::models::{
    ConnmanError, Event, HotspotConfig, HotspotOp, PropertyMap, PropertyValue, ScanOptions,
    ServiceRecord, Services, TechnologyKind,
};
use crate::core::credentials::CredentialStore;
use crate::core::hotspot::HotspotFlags;
use crate::core::registry::{ServiceQuery, ServiceRegistry, wifi_selector};
use crate::core::state_wait::{
    hotspot_closed, services_changed_times, wait_for_events, wait_for_join,
};
use crate::transport::{ManagerTransport, ServiceTransport};

/// The Wi-Fi radio, as supervised through ConnMan.
///
/// Obtained from [`ConnMan::wifi`](crate::ConnMan::wifi). All state is kept
/// current by background tasks; reads such as [`properties`](Self::properties)
/// never touch the bus.
///
/// # Example
///
/// ```no_run
/// use cmrs::{ConnMan, HotspotConfig};
///
/// # async fn example() -> cmrs::Result<()> {
/// let connman = ConnMan::new().await?;
/// let wifi = connman.wifi().await?;
///
/// for net in wifi.get_networks().await? {
///     println!("{} ({}%)", net.ssid, net.strength);
/// }
///
/// if wifi.join_favorite().await.is_err() {
///     wifi.open_hotspot(HotspotConfig::new("device-setup", "setup1234")).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct WifiAdapter {
    registry: ServiceRegistry,
    credentials: Arc<dyn CredentialStore>,
    config: Config,
    hotspot: HotspotFlags,
}

impl WifiAdapter {
    pub(crate) async fn init(
        manager: Arc<dyn ManagerTransport>,
        credentials: Arc<dyn CredentialStore>,
        config: Config,
    ) -> Result<Self> {
        let technology = manager
            .technology(TechnologyKind::Wifi)
            .await?
            .ok_or(ConnmanError::NoTechnology(TechnologyKind::Wifi))?;
        let registry =
            ServiceRegistry::init(manager, technology, wifi_selector, config.event_capacity).await?;

        let adapter = Self {
            registry,
            credentials,
            config,
            hotspot: HotspotFlags::default(),
        };

        let powered = adapter
            .registry
            .property("powered")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !powered {
            debug!("WiFi radio is off, powering it");
            adapter.enable().await?;
        }
        Ok(adapter)
    }

    /// Technology properties (`powered`, `connected`, `tethering`, ...).
    pub fn properties(&self) -> PropertyMap {
        self.registry.properties()
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.registry.property(name)
    }

    /// The current service, or the cleared record when there is none.
    pub fn connection_properties(&self) -> ServiceRecord {
        self.registry.connection_properties()
    }

    /// Sets a technology property; `name` may be lower-camel (`powered`).
    pub async fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.registry.set_property(name, value.into()).await
    }

    /// Subscribes to Wi-Fi events.
    ///
    /// The first receiver also gets a replay of the state loaded at
    /// creation: every technology property, the current service and each
    /// of its fields.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.registry.subscribe()
    }

    pub fn is_tethering(&self) -> bool {
        self.registry.tethering()
    }

    /// Powers the radio on.
    ///
    /// Always waits the configured settle delay before returning, even on
    /// error: ConnMan acknowledges the change before the hardware is up.
    pub async fn enable(&self) -> Result<()> {
        let result = self.registry.set_property("powered", true.into()).await;
        if let Err(e) = &result {
            warn!("Enabling WiFi failed: {e}");
        }
        tokio::time::sleep(self.config.timeouts.enable_settle).await;
        result
    }

    /// Powers the radio off.
    pub async fn disable(&self) -> Result<()> {
        self.registry.set_property("powered", false.into()).await
    }

    /// Scans for networks.
    ///
    /// Most radios cannot scan while broadcasting a hotspot. With
    /// `switch_tethering` an active hotspot is closed for the scan and
    /// reopened afterwards with the identifier and passphrase it had; the
    /// scan result itself is then only logged and the reopen result
    /// returned.
    pub async fn scan(&self, options: ScanOptions) -> Result<()> {
        let technology = self.registry.technology();
        let tethering = self.registry.tethering();

        if tethering && options.switch_tethering {
            debug!("Scanning with tethering switched off");
            let started = Instant::now();
            let previous = self.tethering_credentials();
            self.close_hotspot().await?;
            if let Err(e) = technology.scan().await {
                warn!("Scan between hotspot sessions failed: {e}");
            }
            let reopened = self.open_hotspot(previous).await;
            debug!("Switching tethering for a scan took {:?}", started.elapsed());
            return reopened;
        }

        if tethering {
            warn!("Scanning while tethering is usually not supported");
        }
        match technology.scan().await {
            Err(e) if e.is_no_reply() => {
                warn!("Scan failed, probably because the radio is a hotspot: {e}");
                Err(e)
            }
            other => other,
        }
    }

    /// Scans and returns the visible networks.
    ///
    /// Resolves once the scan has produced its burst of list updates. When
    /// that does not happen in time, falls back to refetching the list a
    /// few times, re-triggering a scan whenever it comes back empty.
    pub async fn get_networks(&self) -> Result<Vec<ServiceRecord>> {
        let timeouts = self.config.timeouts;
        let mut rx = self.registry.receiver();

        let mut burst = pin!(
            wait_for_events(
                &mut rx,
                timeouts.networks_timeout,
                "networks",
                services_changed_times(timeouts.networks_burst),
            )
            .fuse()
        );
        let mut scan = pin!(self.scan(ScanOptions::default()).fuse());

        let settled = loop {
            select! {
                scanned = scan => {
                    if let Err(e) = scanned {
                        debug!("Scan for networks failed: {e}");
                    }
                }
                waited = burst => break waited.is_ok(),
            }
        };

        if settled {
            let services = self.registry.services();
            if !services.is_empty() {
                return Ok(records(services));
            }
        }

        let attempts = timeouts.networks_attempts;
        for attempt in 1..=attempts {
            debug!("Fetching networks, attempt {attempt}/{attempts}");
            match self.registry.refresh_services().await {
                Ok(services) if !services.is_empty() => return Ok(records(services)),
                Ok(_) => debug!("No networks yet"),
                Err(e) => debug!("Fetching networks failed: {e}"),
            }
            self.spawn_scan();
            if attempt < attempts {
                tokio::time::sleep(timeouts.networks_attempt_delay).await;
            }
        }
        Err(ConnmanError::NoNetworksFound)
    }

    /// The last network list seen while not tethering. No I/O.
    pub fn get_networks_cache(&self) -> Vec<ServiceRecord> {
        records(self.registry.services_cache())
    }

    /// Joins the network `ssid`.
    ///
    /// A given passphrase is stored before connecting and is kept even
    /// when the join fails. Secured networks can be joined without one
    /// only when ConnMan already knows them (favorite).
    ///
    /// Any hotspot is closed first. While another task is closing it, the
    /// join fails with [`ConnmanError::HotspotBusy`] instead of waiting.
    pub async fn join(&self, ssid: &str, passphrase: Option<&str>) -> Result<()> {
        if ssid.is_empty() {
            return Err(ConnmanError::SsidRequired);
        }
        debug!("Joining '{ssid}'");

        self.close_hotspot().await?;

        let (service, record) = self
            .find_service(ServiceQuery::Name(ssid))
            .await?
            .ok_or_else(|| ConnmanError::NotFound(ssid.to_owned()))?;

        if record.state.is_connected() {
            info!("Already connected to '{ssid}'");
            return Ok(());
        }

        if record.is_secured() {
            match passphrase.filter(|p| !p.is_empty()) {
                Some(passphrase) => self.credentials.create(ssid, passphrase).await?,
                None if record.favorite => debug!("Using stored credentials for '{ssid}'"),
                None => return Err(ConnmanError::PassphraseRequired(ssid.to_owned())),
            }
        }

        self.registry.switch_service(Arc::clone(&service)).await?;

        // Subscribe before connecting so no state transition is missed
        let mut changes = service.property_changes().await?;
        if let Err(e) = service.connect().await {
            warn!("Connect to '{ssid}' failed: {e}");
            self.registry.clear_service();
            return Err(e);
        }

        match wait_for_join(ssid, &mut changes).await {
            Ok(()) => {
                info!("Joined '{ssid}'");
                Ok(())
            }
            Err(ConnmanError::JoinFailed { ssid, reason }) => {
                let reason = reason.or_else(|| self.registry.last_error());
                warn!(
                    "Joining '{ssid}' failed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
                self.registry.clear_service();
                Err(ConnmanError::JoinFailed { ssid, reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Joins the first visible network ConnMan knows.
    ///
    /// Like [`join`](Self::join), fails with [`ConnmanError::HotspotBusy`]
    /// while a hotspot close is in flight.
    pub async fn join_favorite(&self) -> Result<()> {
        debug!("Joining favorite network");
        self.close_hotspot().await?;

        let (_, record) = self
            .find_service(ServiceQuery::Favorite)
            .await?
            .ok_or(ConnmanError::NoFavorite)?;
        self.join(&record.ssid, None).await
    }

    /// Disconnects the current service.
    pub async fn disconnect(&self) -> Result<()> {
        let service = self
            .registry
            .current_service()
            .ok_or(ConnmanError::NoCurrentService)?;
        debug!("Disconnecting {}", service.id());
        service.disconnect().await
    }

    /// Forgets a network and deletes its stored passphrase.
    ///
    /// With `None` the current service is forgotten. A named network is
    /// looked up with retries; its credential is deleted even when it is no
    /// longer visible.
    pub async fn forget_network(&self, ssid: Option<&str>) -> Result<()> {
        match ssid {
            None => {
                let service = self
                    .registry
                    .current_service()
                    .ok_or(ConnmanError::NoCurrentService)?;
                let ssid = self.registry.connection_properties().ssid;
                debug!("Forgetting current network '{ssid}'");

                let removed = service.remove().await;
                self.credentials.remove(&ssid).await?;
                removed
            }
            Some(ssid) => {
                debug!("Forgetting network '{ssid}'");
                match self.find_service(ServiceQuery::Name(ssid)).await {
                    Ok(Some((service, _))) => {
                        if let Err(e) = service.remove().await {
                            warn!("Removing '{ssid}' failed: {e}");
                        }
                    }
                    Ok(None) => debug!("'{ssid}' is not visible, only deleting its credentials"),
                    Err(e) => warn!("Looking up '{ssid}' failed: {e}"),
                }
                self.credentials.remove(ssid).await
            }
        }
    }

    /// Starts broadcasting a hotspot.
    ///
    /// Unset fields of `config` fall back to the configured defaults, then
    /// to whatever ConnMan has stored. An active hotspot is closed first,
    /// since ConnMan only applies new credentials on a fresh start.
    pub async fn open_hotspot(&self, config: HotspotConfig) -> Result<()> {
        let _guard = self.hotspot.acquire(HotspotOp::Opening)?;
        let config = config.or(&self.config.hotspot);
        debug!("Opening hotspot '{}'", config.ssid.as_deref().unwrap_or("<stored>"));

        if self.registry.tethering() {
            self.close_hotspot().await?;
        }

        let mut rx = self.registry.receiver();
        match self
            .registry
            .technology()
            .enable_tethering(config.ssid.as_deref(), config.passphrase.as_deref())
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_passphrase_required() => {
                return Err(ConnmanError::InvalidHotspotPassphrase);
            }
            Err(e) => return Err(e),
        }

        let timeout = self.config.timeouts.hotspot_timeout;
        let opened = services_changed_times(1);
        match wait_for_events(&mut rx, timeout, "hotspot to open", opened).await {
            Ok(()) => {
                info!("Hotspot open");
                Ok(())
            }
            Err(ConnmanError::Timeout(_)) if self.registry.tethering() => {
                debug!("No services update after opening hotspot, but tethering is on");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stops broadcasting the hotspot. Succeeds when it was not open.
    pub async fn close_hotspot(&self) -> Result<()> {
        let _guard = self.hotspot.acquire(HotspotOp::Closing)?;
        debug!("Closing hotspot");

        let mut rx = self.registry.receiver();
        match self.registry.technology().disable_tethering().await {
            Ok(()) => {}
            Err(e) if e.is_already_disabled() => {
                debug!("Hotspot already closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        // Tethering flipping to false is not enough; the radio is usable
        // again once the service list has been refreshed
        let timeout = self.config.timeouts.hotspot_timeout;
        let closed = hotspot_closed(!self.registry.tethering());
        match wait_for_events(&mut rx, timeout, "hotspot to close", closed).await {
            Ok(()) => {
                info!("Hotspot closed");
                Ok(())
            }
            Err(ConnmanError::Timeout(_)) if !self.registry.tethering() => {
                debug!("No services update after closing hotspot, but tethering is off");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Looks a service up, scanning in the background before each attempt.
    async fn find_service(
        &self,
        query: ServiceQuery<'_>,
    ) -> Result<Option<(Arc<dyn ServiceTransport>, ServiceRecord)>> {
        let timeouts = self.config.timeouts;
        let attempts = timeouts.service_attempts;

        for attempt in 1..=attempts {
            debug!("Searching service {query:?}, attempt {attempt}/{attempts}");
            self.spawn_scan();
            match self.registry.find_service(query).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(e) => debug!("Service search failed: {e}"),
            }
            if attempt < attempts {
                tokio::time::sleep(timeouts.service_attempt_delay).await;
            }
        }
        Ok(None)
    }

    /// Identifier and passphrase of the running hotspot, as last reported.
    fn tethering_credentials(&self) -> HotspotConfig {
        let properties = self.registry.properties();
        let text = |name: &str| {
            properties
                .get(name)
                .and_then(PropertyValue::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        HotspotConfig {
            ssid: text("tetheringIdentifier"),
            passphrase: text("tetheringPassphrase"),
        }
    }

    /// Starts a scan without waiting for it.
    fn spawn_scan(&self) {
        let technology = Arc::clone(self.registry.technology());
        tokio::spawn(async move {
            if let Err(e) = technology.scan().await {
                debug!("Background scan failed: {e}");
            }
        });
    }
}

fn records(services: Services) -> Vec<ServiceRecord> {
    services.into_iter().map(|(_, record)| record).collect()
}
