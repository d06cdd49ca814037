use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use zvariant::Value;

use crate::types::constants::{errors, technology_type};

/// A normalized (or raw, wire-cased) attribute map.
pub type PropertyMap = HashMap<String, PropertyValue>;

/// Snapshot of visible services in transport order: `(service id, record)`.
pub type Services = Vec<(String, ServiceRecord)>;

/// A property value reported by ConnMan.
///
/// D-Bus variants are flattened into this small set; integers of every width
/// become `Int`, string arrays become `List`, and `a{sv}` dictionaries
/// (e.g. `IPv4`) become `Map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<PropertyValue>),
    Map(PropertyMap),
}

impl PropertyValue {
    /// Returns the boolean value, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string value, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested map, if this is a `Map`.
    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the string items of a list, or a single string as a
    /// one-element list. Non-string items are skipped.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Self::Str(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {}", map[*key])?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&Value<'_>> for PropertyValue {
    fn from(value: &Value<'_>) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::U8(n) => Self::Int(i64::from(*n)),
            Value::I16(n) => Self::Int(i64::from(*n)),
            Value::U16(n) => Self::Int(i64::from(*n)),
            Value::I32(n) => Self::Int(i64::from(*n)),
            Value::U32(n) => Self::Int(i64::from(*n)),
            Value::I64(n) => Self::Int(*n),
            Value::U64(n) => Self::Int(i64::try_from(*n).unwrap_or(i64::MAX)),
            Value::Str(s) => Self::Str(s.as_str().to_owned()),
            Value::ObjectPath(p) => Self::Str(p.as_str().to_owned()),
            Value::Value(inner) => Self::from(&**inner),
            Value::Array(arr) => Self::List(arr.iter().map(Self::from).collect()),
            Value::Dict(dict) => {
                let mut map = PropertyMap::new();
                for (k, v) in dict.iter() {
                    let key = match k {
                        Value::Str(s) => s.as_str().to_owned(),
                        other => format!("{other:?}"),
                    };
                    map.insert(key, Self::from(v));
                }
                Self::Map(map)
            }
            other => Self::Str(format!("{other:?}")),
        }
    }
}

impl From<&PropertyValue> for Value<'static> {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Int(i) => Value::I64(*i),
            PropertyValue::Str(s) => Value::from(s.clone()),
            PropertyValue::List(items) => {
                let strings: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect();
                Value::from(strings)
            }
            PropertyValue::Map(map) => {
                let strings: HashMap<String, String> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect();
                Value::from(strings)
            }
        }
    }
}

/// ConnMan service state.
///
/// Valid states are "idle", "failure", "association", "configuration",
/// "ready", "disconnect" and "online". `ready` and `online` both mean
/// connected; `failure` usually means the credentials were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceState {
    /// No active connection.
    #[default]
    Idle,
    /// The last connection attempt failed.
    Failure,
    /// Associating with the access point.
    Association,
    /// Obtaining IP configuration.
    Configuration,
    /// Connected, without verified internet access.
    Ready,
    /// Disconnecting.
    Disconnect,
    /// Connected with internet access.
    Online,
    /// A state token this crate does not know.
    Unknown(String),
}

impl ServiceState {
    /// Returns true for `ready` and `online`.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Ready | Self::Online)
    }

    /// Returns true for every state except `idle`.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl From<&str> for ServiceState {
    fn from(s: &str) -> Self {
        match s {
            "idle" => Self::Idle,
            "failure" => Self::Failure,
            "association" => Self::Association,
            "configuration" => Self::Configuration,
            "ready" => Self::Ready,
            "disconnect" => Self::Disconnect,
            "online" => Self::Online,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl From<String> for ServiceState {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ServiceState> for String {
    fn from(state: ServiceState) -> Self {
        state.to_string()
    }
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Failure => write!(f, "failure"),
            Self::Association => write!(f, "association"),
            Self::Configuration => write!(f, "configuration"),
            Self::Ready => write!(f, "ready"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Online => write!(f, "online"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// One discoverable network or connection point.
///
/// Built from raw ConnMan attributes by the property parser; attributes
/// outside the known set are dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Network name, `*hidden*` when the service has none.
    pub ssid: String,
    /// Lifecycle state.
    pub state: ServiceState,
    /// Signal strength, 0-100.
    pub strength: u8,
    /// Security classification tokens, e.g. `["psk"]` or `["none"]`.
    pub security: Vec<String>,
    /// Whether ConnMan knows this network (stored credentials or joined before).
    pub favorite: bool,
    /// Whether the service is provisioned read-only.
    pub immutable: bool,
    /// Whether ConnMan will connect to it automatically.
    pub auto_connect: bool,
    /// Current IP address, empty when unset.
    pub ipaddress: String,
}

impl ServiceRecord {
    /// The record reported when no service is active.
    ///
    /// Unlike a parsed nameless service, the ssid is empty.
    pub fn cleared() -> Self {
        Self {
            ssid: String::new(),
            state: ServiceState::Idle,
            strength: 0,
            ..Default::default()
        }
    }

    /// Returns true unless a security token contains `"none"`.
    pub fn is_secured(&self) -> bool {
        !self.security.iter().any(|s| s.contains("none"))
    }

    /// Renders the record as a lower-camel property map.
    ///
    /// The keys are exactly `state`, `strength`, `security`, `favorite`,
    /// `immutable`, `autoConnect`, `ssid` and `ipaddress`.
    pub fn to_properties(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert("state".into(), PropertyValue::Str(self.state.to_string()));
        map.insert("strength".into(), PropertyValue::Int(i64::from(self.strength)));
        map.insert(
            "security".into(),
            PropertyValue::List(
                self.security
                    .iter()
                    .map(|s| PropertyValue::Str(s.clone()))
                    .collect(),
            ),
        );
        map.insert("favorite".into(), PropertyValue::Bool(self.favorite));
        map.insert("immutable".into(), PropertyValue::Bool(self.immutable));
        map.insert("autoConnect".into(), PropertyValue::Bool(self.auto_connect));
        map.insert("ssid".into(), PropertyValue::Str(self.ssid.clone()));
        map.insert("ipaddress".into(), PropertyValue::Str(self.ipaddress.clone()));
        map
    }
}

/// A network interface class exposed by ConnMan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechnologyKind {
    Wifi,
    Ethernet,
}

impl TechnologyKind {
    /// The `Type` token ConnMan uses for this technology and its services.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Wifi => technology_type::WIFI,
            Self::Ethernet => technology_type::ETHERNET,
        }
    }
}

impl Display for TechnologyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wifi => write!(f, "WiFi"),
            Self::Ethernet => write!(f, "Ethernet"),
        }
    }
}

/// A change notification published by the facade and the adapters.
///
/// Every changed attribute is its own event; `ServicesChanged` carries the
/// whole refreshed network list.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A technology (or, on the facade, manager) property changed:
    /// `powered`, `connected`, `tethering`, ...
    PropertyChanged { name: String, value: PropertyValue },
    /// A property of the current service changed: `state`, `ssid`,
    /// `strength`, `ipaddress`, `ip4Address`, ...
    ConnectionPropertyChanged { name: String, value: PropertyValue },
    /// The current service switched to the given id, or was cleared.
    ServiceChanged(Option<String>),
    /// The visible services were refetched.
    ServicesChanged(Vec<ServiceRecord>),
}

impl Event {
    /// The per-field name of the event (`"networks"` for list updates).
    pub fn name(&self) -> &str {
        match self {
            Self::PropertyChanged { name, .. } | Self::ConnectionPropertyChanged { name, .. } => {
                name
            }
            Self::ServiceChanged(_) => "serviceChanged",
            Self::ServicesChanged(_) => "networks",
        }
    }

    /// The changed value for property events.
    pub fn value(&self) -> Option<&PropertyValue> {
        match self {
            Self::PropertyChanged { value, .. } | Self::ConnectionPropertyChanged { value, .. } => {
                Some(value)
            }
            _ => None,
        }
    }
}

/// Options for [`WifiAdapter::scan`](crate::WifiAdapter::scan).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Close an active hotspot for the scan and reopen it afterwards.
    pub switch_tethering: bool,
}

/// Hotspot credentials. `None` fields fall back to configured defaults,
/// then to what ConnMan has stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotspotConfig {
    pub ssid: Option<String>,
    pub passphrase: Option<String>,
}

impl HotspotConfig {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: Some(ssid.into()),
            passphrase: Some(passphrase.into()),
        }
    }

    /// Fills unset fields from `defaults`.
    pub(crate) fn or(self, defaults: &HotspotConfig) -> Self {
        Self {
            ssid: self.ssid.or_else(|| defaults.ssid.clone()),
            passphrase: self.passphrase.or_else(|| defaults.passphrase.clone()),
        }
    }
}

/// A hotspot toggle in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotOp {
    Opening,
    Closing,
}

impl Display for HotspotOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Errors returned by cmrs operations.
///
/// # Example
///
/// ```no_run
/// use cmrs::{ConnMan, ConnmanError};
///
/// # async fn example() -> cmrs::Result<()> {
/// let connman = ConnMan::new().await?;
/// let wifi = connman.wifi().await?;
///
/// match wifi.join("MyNetwork", Some("password")).await {
///     Ok(()) => println!("Connected!"),
///     Err(ConnmanError::JoinFailed { .. }) => eprintln!("Wrong password?"),
///     Err(ConnmanError::NotFound(ssid)) => eprintln!("{ssid} not in range"),
///     Err(e) => eprintln!("Error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Error)]
pub enum ConnmanError {
    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(zbus::Error),

    /// ConnMan answered a method call with an error.
    #[error("{name}: {message}")]
    Method { name: String, message: String },

    /// The requested technology does not exist on this device.
    #[error("no {0} hardware available")]
    NoTechnology(TechnologyKind),

    /// The requested network did not show up within the retry budget.
    #[error("network '{0}' not found")]
    NotFound(String),

    /// Scanning produced an empty list within the retry budget.
    #[error("no WiFi networks found")]
    NoNetworksFound,

    /// No known (favorite) network is visible.
    #[error("no favorite network found")]
    NoFavorite,

    /// An empty ssid was given.
    #[error("ssid is required")]
    SsidRequired,

    /// A secured, unknown network was joined without a passphrase.
    #[error("no passphrase supplied for secured network '{0}'")]
    PassphraseRequired(String),

    /// The service reached the failure state after connecting.
    #[error("joining network '{ssid}' failed (wrong password?){}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    JoinFailed {
        ssid: String,
        reason: Option<String>,
    },

    /// There is no current service to act on.
    #[error("no current service")]
    NoCurrentService,

    /// A hotspot toggle of the same kind is already in flight.
    #[error("hotspot is already {0}")]
    HotspotBusy(HotspotOp),

    /// ConnMan rejected the hotspot passphrase.
    #[error("invalid hotspot passphrase (must be at least 8 characters)")]
    InvalidHotspotPassphrase,

    /// An event wait ran past its upper bound.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// A signal stream ended while waiting on it.
    #[error("stuck: {0}")]
    Stuck(String),

    /// Reading or writing a stored credential failed.
    #[error("credential store error: {0}")]
    Credentials(#[from] std::io::Error),
}

impl ConnmanError {
    /// Creates a method error from a D-Bus error name.
    pub fn method(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Method {
            name: name.into(),
            message: message.into(),
        }
    }

    fn is_method(&self, wanted: &str) -> bool {
        matches!(self, Self::Method { name, .. } if name == wanted)
    }

    /// Tethering was already off.
    pub fn is_already_disabled(&self) -> bool {
        self.is_method(errors::ALREADY_DISABLED)
    }

    /// The call got no reply, typical of scanning while tethering.
    pub fn is_no_reply(&self) -> bool {
        self.is_method(errors::NO_REPLY)
    }

    /// ConnMan wants a (longer) passphrase.
    pub fn is_passphrase_required(&self) -> bool {
        self.is_method(errors::PASSPHRASE_REQUIRED)
    }
}

impl From<zbus::Error> for ConnmanError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, message, _) => Self::Method {
                name: name.to_string(),
                message: message.unwrap_or_default(),
            },
            zbus::Error::FDO(fdo) if matches!(*fdo, zbus::fdo::Error::NoReply(_)) => Self::Method {
                name: errors::NO_REPLY.to_string(),
                message: fdo.to_string(),
            },
            other => Self::Dbus(other),
        }
    }
}
