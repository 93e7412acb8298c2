// ── zbus backend ──
//
// `Bus` over a live system or session bus. Manager calls go through a
// generated proxy; property reads and the signal feed use raw messages so
// that values arrive untyped and are converted into `Variant`.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, info};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, MatchRule, Message, MessageStream, proxy};

use crate::bus::{Bus, ManagerCall, ManagerReply, PropertiesChanged, PropertyMap, SignalStream};
use crate::error::Error;
use crate::path::{ObjectPath, PROPERTIES_INTERFACE, SERVICE_NAME};
use crate::variant::Variant;

const UNIT_NAMESPACE: &str = "/org/freedesktop/systemd1/unit";
const SIGNAL_QUEUE: usize = 1024;

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1",
    gen_blocking = false
)]
trait SystemdManager {
    fn subscribe(&self) -> zbus::Result<()>;
    fn unsubscribe(&self) -> zbus::Result<()>;

    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn reload_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn try_restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn reload_or_restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn reload_or_try_restart_unit(&self, name: &str, mode: &str)
    -> zbus::Result<OwnedObjectPath>;

    fn kill_unit(&self, name: &str, whom: &str, signal: i32) -> zbus::Result<()>;
    fn reset_failed_unit(&self, name: &str) -> zbus::Result<()>;
    fn unref_unit(&self, name: &str) -> zbus::Result<()>;

    fn get_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;
    fn load_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;
}

/// A connection to systemd on a real message bus.
#[derive(Clone)]
pub struct DBusConnection {
    connection: Connection,
    manager: SystemdManagerProxy<'static>,
}

impl DBusConnection {
    /// Connect to the system bus (PID 1).
    pub async fn system() -> Result<Self, Error> {
        let connection = Connection::system().await?;
        info!("connected to system bus");
        Self::from_connection(connection).await
    }

    /// Connect to the session bus (the user's systemd instance).
    pub async fn session() -> Result<Self, Error> {
        let connection = Connection::session().await?;
        info!("connected to session bus");
        Self::from_connection(connection).await
    }

    /// Connect to an explicit bus address, e.g. `unix:path=/run/dbus/system_bus_socket`.
    pub async fn address(address: &str) -> Result<Self, Error> {
        let connection = zbus::connection::Builder::address(address)?.build().await?;
        info!(address, "connected to bus");
        Self::from_connection(connection).await
    }

    pub async fn from_connection(connection: Connection) -> Result<Self, Error> {
        let manager = SystemdManagerProxy::new(&connection).await?;
        Ok(Self {
            connection,
            manager,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    async fn properties_call<B>(
        &self,
        path: &ObjectPath,
        method: &'static str,
        body: &B,
    ) -> Result<Message, Error>
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        self.connection
            .call_method(
                Some(SERVICE_NAME),
                path.as_str(),
                Some(PROPERTIES_INTERFACE),
                method,
                body,
            )
            .await
            .map_err(|e| Error::Fdo(zbus::fdo::Error::from(e)))
    }
}

#[async_trait]
impl Bus for DBusConnection {
    async fn get_all(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap, Error> {
        debug!(path = %path, interface, "GetAll");
        let reply = self.properties_call(path, "GetAll", &(interface,)).await?;
        let values: HashMap<String, OwnedValue> = reply.body().deserialize()?;
        decode_map(&values)
    }

    async fn get_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> Result<Variant, Error> {
        let reply = self.properties_call(path, "Get", &(interface, name)).await?;
        let value: OwnedValue = reply.body().deserialize()?;
        Variant::try_from(&*value)
    }

    async fn signals(&self) -> Result<SignalStream, Error> {
        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(SERVICE_NAME)?
            .interface(PROPERTIES_INTERFACE)?
            .member("PropertiesChanged")?
            .path_namespace(UNIT_NAMESPACE)?
            .build();
        let stream =
            MessageStream::for_match_rule(rule, &self.connection, Some(SIGNAL_QUEUE)).await?;
        debug!("PropertiesChanged match installed");

        let decoded = stream.map(|message| match message {
            Ok(message) => decode_signal(&message),
            Err(e) => Err(Error::Bus(e)),
        });
        Ok(Box::pin(decoded))
    }

    async fn call(&self, call: ManagerCall) -> Result<ManagerReply, Error> {
        let m = &self.manager;
        let job = |path: OwnedObjectPath| -> Result<ManagerReply, Error> {
            Ok(ManagerReply::Job(ObjectPath::new(path.as_str())?))
        };
        let unit = |path: OwnedObjectPath| -> Result<ManagerReply, Error> {
            Ok(ManagerReply::Unit(ObjectPath::new(path.as_str())?))
        };

        let reply = match call {
            ManagerCall::Subscribe => {
                m.subscribe().await?;
                ManagerReply::Done
            }
            ManagerCall::Unsubscribe => {
                m.unsubscribe().await?;
                ManagerReply::Done
            }
            ManagerCall::StartUnit { name, mode } => job(m.start_unit(&name, &mode).await?)?,
            ManagerCall::StopUnit { name, mode } => job(m.stop_unit(&name, &mode).await?)?,
            ManagerCall::ReloadUnit { name, mode } => job(m.reload_unit(&name, &mode).await?)?,
            ManagerCall::RestartUnit { name, mode } => job(m.restart_unit(&name, &mode).await?)?,
            ManagerCall::TryRestartUnit { name, mode } => {
                job(m.try_restart_unit(&name, &mode).await?)?
            }
            ManagerCall::ReloadOrRestartUnit { name, mode } => {
                job(m.reload_or_restart_unit(&name, &mode).await?)?
            }
            ManagerCall::ReloadOrTryRestartUnit { name, mode } => {
                job(m.reload_or_try_restart_unit(&name, &mode).await?)?
            }
            ManagerCall::KillUnit { name, who, signal } => {
                m.kill_unit(&name, &who, signal).await?;
                ManagerReply::Done
            }
            ManagerCall::ResetFailedUnit { name } => {
                m.reset_failed_unit(&name).await?;
                ManagerReply::Done
            }
            ManagerCall::UnrefUnit { name } => {
                m.unref_unit(&name).await?;
                ManagerReply::Done
            }
            ManagerCall::GetUnit { name } => unit(m.get_unit(&name).await?)?,
            ManagerCall::LoadUnit { name } => unit(m.load_unit(&name).await?)?,
        };
        Ok(reply)
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

fn decode_map(values: &HashMap<String, OwnedValue>) -> Result<PropertyMap, Error> {
    values
        .iter()
        .map(|(key, value)| Ok((key.clone(), Variant::try_from(&**value)?)))
        .collect()
}

fn decode_signal(message: &Message) -> Result<PropertiesChanged, Error> {
    let header = message.header();
    let path = header.path().ok_or_else(|| Error::Malformed {
        reason: "signal without object path".into(),
    })?;
    let path = ObjectPath::new(path.as_str())?;

    let (interface, changed, invalidated): (String, HashMap<String, OwnedValue>, Vec<String>) =
        message
            .body()
            .deserialize()
            .map_err(|e| Error::Malformed {
                reason: e.to_string(),
            })?;

    Ok(PropertiesChanged {
        path,
        interface,
        changed: decode_map(&changed)?,
        invalidated,
    })
}

impl TryFrom<&Value<'_>> for Variant {
    type Error = Error;

    fn try_from(value: &Value<'_>) -> Result<Self, Self::Error> {
        let signature = value.value_signature().to_string();
        let variant = match value {
            Value::Bool(v) => Self::Bool(*v),
            Value::U8(v) => Self::Byte(*v),
            Value::I16(v) => Self::Int16(*v),
            Value::U16(v) => Self::UInt16(*v),
            Value::I32(v) => Self::Int32(*v),
            Value::U32(v) => Self::UInt32(*v),
            Value::I64(v) => Self::Int64(*v),
            Value::U64(v) => Self::UInt64(*v),
            Value::F64(v) => Self::Double(*v),
            Value::Str(s) => Self::Str(s.as_str().to_owned()),
            Value::ObjectPath(p) => Self::ObjectPath(p.as_str().to_owned()),
            Value::Signature(s) => Self::Signature(s.to_string()),
            Value::Value(inner) => Self::Variant(Box::new(Self::try_from(&**inner)?)),
            Value::Array(array) => {
                let element = signature
                    .strip_prefix('a')
                    .ok_or_else(|| Error::UnsupportedType(signature.clone()))?
                    .to_owned();
                let items = array
                    .inner()
                    .iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Self::Array { element, items }
            }
            Value::Dict(dict) => {
                let (key, value) = split_dict_signature(&signature)
                    .ok_or_else(|| Error::UnsupportedType(signature.clone()))?;
                let entries = dict
                    .iter()
                    .map(|(k, v)| Ok((Self::try_from(k)?, Self::try_from(v)?)))
                    .collect::<Result<Vec<_>, Error>>()?;
                Self::Dict {
                    key,
                    value,
                    entries,
                }
            }
            Value::Structure(structure) => Self::Struct(
                structure
                    .fields()
                    .iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => return Err(Error::UnsupportedType(signature)),
        };
        Ok(variant)
    }
}

/// `a{kv}` → (`k`, `v`). Dictionary keys are always single-character basic
/// types.
fn split_dict_signature(signature: &str) -> Option<(String, String)> {
    let inner = signature.strip_prefix("a{")?.strip_suffix('}')?;
    let mut chars = inner.chars();
    let key = chars.next()?;
    let value = chars.as_str();
    if value.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_owned()))
}
