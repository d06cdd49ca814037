//! Transport over the system D-Bus.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use log::{debug, warn};
use zbus::Connection;
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use super::{
    ManagerTransport, PropertyStream, ServiceTransport, ServicesChange, TechnologyTransport,
};
use crate::Result;
use crate::api::models::{PropertyMap, PropertyValue, TechnologyKind};
use crate::dbus::{ConnmanManagerProxy, ConnmanServiceProxy, ConnmanTechnologyProxy};
use crate::types::constants::property;

fn to_property_map(raw: &HashMap<String, OwnedValue>) -> PropertyMap {
    raw.iter()
        .map(|(k, v)| (k.clone(), PropertyValue::from(&**v)))
        .collect()
}

fn to_object_list(
    raw: Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>,
) -> Vec<(String, PropertyMap)> {
    raw.into_iter()
        .map(|(path, props)| (path.as_str().to_owned(), to_property_map(&props)))
        .collect()
}

fn type_is(props: &PropertyMap, kind: TechnologyKind) -> bool {
    props.get(property::TYPE).and_then(PropertyValue::as_str) == Some(kind.type_name())
}

/// Production transport backed by ConnMan on D-Bus.
#[derive(Clone)]
pub struct DbusManager {
    conn: Connection,
    manager: ConnmanManagerProxy<'static>,
}

impl DbusManager {
    /// Connects to the system bus.
    pub async fn system() -> Result<Self> {
        let conn = Connection::system().await?;
        Self::with_connection(conn).await
    }

    /// Uses an existing bus connection.
    pub async fn with_connection(conn: Connection) -> Result<Self> {
        let manager = ConnmanManagerProxy::new(&conn).await?;
        Ok(Self { conn, manager })
    }
}

#[async_trait]
impl ManagerTransport for DbusManager {
    async fn properties(&self) -> Result<PropertyMap> {
        Ok(to_property_map(&self.manager.get_properties().await?))
    }

    async fn technology(
        &self,
        kind: TechnologyKind,
    ) -> Result<Option<Arc<dyn TechnologyTransport>>> {
        let technologies = self.manager.get_technologies().await?;
        let Some((path, _)) = technologies
            .into_iter()
            .find(|(_, props)| type_is(&to_property_map(props), kind))
        else {
            debug!("ConnMan reports no {kind} technology");
            return Ok(None);
        };

        debug!("Found {kind} technology at {}", path.as_str());
        let proxy = ConnmanTechnologyProxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;
        Ok(Some(Arc::new(DbusTechnology {
            kind,
            proxy,
            manager: self.manager.clone(),
        })))
    }

    async fn services(&self) -> Result<Vec<(String, PropertyMap)>> {
        Ok(to_object_list(self.manager.get_services().await?))
    }

    async fn service(&self, id: &str) -> Result<Arc<dyn ServiceTransport>> {
        let proxy = ConnmanServiceProxy::builder(&self.conn)
            .path(id.to_owned())?
            .build()
            .await?;
        Ok(Arc::new(DbusService {
            id: id.to_owned(),
            proxy,
        }))
    }

    async fn property_changes(&self) -> Result<PropertyStream> {
        let stream = self.manager.receive_property_changed().await?;
        Ok(stream
            .filter_map(|signal| async move {
                match signal.args() {
                    Ok(args) => Some((args.name.clone(), PropertyValue::from(&*args.value))),
                    Err(e) => {
                        warn!("Failed to parse manager PropertyChanged args: {e}");
                        None
                    }
                }
            })
            .boxed())
    }

    async fn services_changed(&self) -> Result<BoxStream<'static, ServicesChange>> {
        let stream = self.manager.receive_services_changed().await?;
        Ok(stream
            .filter_map(|signal| async move {
                match signal.args() {
                    Ok(args) => Some(ServicesChange {
                        changed: args.changed.iter().map(|(p, _)| p.as_str().to_owned()).collect(),
                        removed: args.removed.iter().map(|p| p.as_str().to_owned()).collect(),
                    }),
                    Err(e) => {
                        warn!("Failed to parse ServicesChanged args: {e}");
                        None
                    }
                }
            })
            .boxed())
    }
}

struct DbusTechnology {
    kind: TechnologyKind,
    proxy: ConnmanTechnologyProxy<'static>,
    manager: ConnmanManagerProxy<'static>,
}

impl DbusTechnology {
    async fn set(&self, name: &str, value: Value<'_>) -> Result<()> {
        self.proxy.set_property(name, &value).await?;
        Ok(())
    }
}

#[async_trait]
impl TechnologyTransport for DbusTechnology {
    fn kind(&self) -> TechnologyKind {
        self.kind
    }

    async fn properties(&self) -> Result<PropertyMap> {
        Ok(to_property_map(&self.proxy.get_properties().await?))
    }

    async fn set_property(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.set(name, Value::from(&value)).await
    }

    async fn services(&self) -> Result<Vec<(String, PropertyMap)>> {
        let all = to_object_list(self.manager.get_services().await?);
        Ok(all
            .into_iter()
            .filter(|(_, props)| type_is(props, self.kind))
            .collect())
    }

    async fn scan(&self) -> Result<()> {
        self.proxy.scan().await?;
        Ok(())
    }

    async fn enable_tethering(&self, ssid: Option<&str>, passphrase: Option<&str>) -> Result<()> {
        if let Some(ssid) = ssid {
            self.set(property::TETHERING_IDENTIFIER, Value::from(ssid)).await?;
        }
        if let Some(passphrase) = passphrase {
            self.set(property::TETHERING_PASSPHRASE, Value::from(passphrase))
                .await?;
        }
        self.set(property::TETHERING, Value::Bool(true)).await
    }

    async fn disable_tethering(&self) -> Result<()> {
        self.set(property::TETHERING, Value::Bool(false)).await
    }

    async fn property_changes(&self) -> Result<PropertyStream> {
        let kind = self.kind;
        let stream = self.proxy.receive_property_changed().await?;
        Ok(stream
            .filter_map(move |signal| async move {
                match signal.args() {
                    Ok(args) => Some((args.name.clone(), PropertyValue::from(&*args.value))),
                    Err(e) => {
                        warn!("Failed to parse {kind} PropertyChanged args: {e}");
                        None
                    }
                }
            })
            .boxed())
    }
}

struct DbusService {
    id: String,
    proxy: ConnmanServiceProxy<'static>,
}

#[async_trait]
impl ServiceTransport for DbusService {
    fn id(&self) -> &str {
        &self.id
    }

    async fn properties(&self) -> Result<PropertyMap> {
        Ok(to_property_map(&self.proxy.get_properties().await?))
    }

    async fn connect(&self) -> Result<()> {
        self.proxy.connect().await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.proxy.disconnect().await?;
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.proxy.remove().await?;
        Ok(())
    }

    async fn property_changes(&self) -> Result<PropertyStream> {
        let stream = self.proxy.receive_property_changed().await?;
        Ok(stream
            .filter_map(|signal| async move {
                match signal.args() {
                    Ok(args) => Some((args.name.clone(), PropertyValue::from(&*args.value))),
                    Err(e) => {
                        warn!("Failed to parse service PropertyChanged args: {e}");
                        None
                    }
                }
            })
            .boxed())
    }
}
