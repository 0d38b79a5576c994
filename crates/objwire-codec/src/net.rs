//! Network address encoding.
//!
//! Addresses travel as `{"family":"inet","bytes":[10,0,0,1],"port":8080}`
//! rather than serde's display strings, so a peer can rebuild the exact
//! address bytes and family without parsing text. [`NetAddressAdapter`]
//! applies this to top-level address values; the [`ip_addr`] and
//! [`socket_addr`] modules apply it to struct fields via `#[serde(with)]`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::ValueAdapter;
use crate::error::{CodecError, Result};
use crate::tag::simplify_type_name;

const ADAPTER_NAME: &str = "net-address";

/// Address family as recorded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
}

/// Wire form of an IP address, optionally with a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetAddress {
    pub family: AddressFamily,
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl NetAddress {
    /// Rebuild the IP address, checking the byte count against the family.
    pub fn to_ip(&self) -> std::result::Result<IpAddr, String> {
        match self.family {
            AddressFamily::Inet => {
                let octets: [u8; 4] = self.bytes.as_slice().try_into().map_err(|_| {
                    format!("inet address needs 4 bytes, got {}", self.bytes.len())
                })?;
                Ok(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            AddressFamily::Inet6 => {
                let octets: [u8; 16] = self.bytes.as_slice().try_into().map_err(|_| {
                    format!("inet6 address needs 16 bytes, got {}", self.bytes.len())
                })?;
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
        }
    }

    /// Rebuild the socket address; the port is required.
    pub fn to_socket_addr(&self) -> std::result::Result<SocketAddr, String> {
        let port = self
            .port
            .ok_or_else(|| "socket address is missing its port".to_string())?;
        Ok(SocketAddr::new(self.to_ip()?, port))
    }
}

impl From<IpAddr> for NetAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self {
                family: AddressFamily::Inet,
                bytes: v4.octets().to_vec(),
                port: None,
            },
            IpAddr::V6(v6) => Self {
                family: AddressFamily::Inet6,
                bytes: v6.octets().to_vec(),
                port: None,
            },
        }
    }
}

impl From<SocketAddr> for NetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            port: Some(addr.port()),
            ..Self::from(addr.ip())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressKind {
    Ip,
    Ipv4,
    Ipv6,
    Socket,
    SocketV4,
    SocketV6,
}

impl AddressKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match simplify_type_name(tag).as_str() {
            "IpAddr" => Some(Self::Ip),
            "Ipv4Addr" => Some(Self::Ipv4),
            "Ipv6Addr" => Some(Self::Ipv6),
            "SocketAddr" => Some(Self::Socket),
            "SocketAddrV4" => Some(Self::SocketV4),
            "SocketAddrV6" => Some(Self::SocketV6),
            _ => None,
        }
    }

    fn has_port(self) -> bool {
        matches!(self, Self::Socket | Self::SocketV4 | Self::SocketV6)
    }

    fn required_family(self) -> Option<AddressFamily> {
        match self {
            Self::Ipv4 | Self::SocketV4 => Some(AddressFamily::Inet),
            Self::Ipv6 | Self::SocketV6 => Some(AddressFamily::Inet6),
            Self::Ip | Self::Socket => None,
        }
    }
}

/// Adapter for `IpAddr`, `Ipv4Addr`, `Ipv6Addr` and the `SocketAddr` types.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetAddressAdapter;

impl ValueAdapter for NetAddressAdapter {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    fn handles(&self, tag: &str) -> bool {
        AddressKind::from_tag(tag).is_some()
    }

    fn to_wire(&self, tag: &str, value: Value) -> Result<Value> {
        let kind = AddressKind::from_tag(tag).ok_or_else(|| adapter_error(tag, "unsupported tag"))?;
        let text = value
            .as_str()
            .ok_or_else(|| adapter_error(tag, "expected address string"))?;

        let wire = if kind.has_port() {
            let addr: SocketAddr = text
                .parse()
                .map_err(|err| adapter_error(tag, format!("invalid socket address: {err}")))?;
            NetAddress::from(addr)
        } else {
            let addr: IpAddr = text
                .parse()
                .map_err(|err| adapter_error(tag, format!("invalid ip address: {err}")))?;
            NetAddress::from(addr)
        };

        Ok(serde_json::to_value(wire)?)
    }

    fn from_wire(&self, tag: &str, value: Value) -> Result<Value> {
        let kind = AddressKind::from_tag(tag).ok_or_else(|| adapter_error(tag, "unsupported tag"))?;
        let wire: NetAddress = serde_json::from_value(value)?;

        if let Some(family) = kind.required_family() {
            if wire.family != family {
                return Err(adapter_error(
                    tag,
                    format!("family {:?} does not match {tag}", wire.family),
                ));
            }
        }

        let text = if kind.has_port() {
            wire.to_socket_addr()
                .map_err(|message| adapter_error(tag, message))?
                .to_string()
        } else {
            if wire.port.is_some() {
                return Err(adapter_error(tag, "ip address must not carry a port"));
            }
            wire.to_ip()
                .map_err(|message| adapter_error(tag, message))?
                .to_string()
        };

        Ok(Value::String(text))
    }
}

fn adapter_error(tag: &str, message: impl Into<String>) -> CodecError {
    CodecError::Adapter {
        adapter: ADAPTER_NAME,
        tag: tag.to_string(),
        message: message.into(),
    }
}

/// `#[serde(with = "objwire_codec::net::ip_addr")]` for `IpAddr` fields.
pub mod ip_addr {
    use std::net::IpAddr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::NetAddress;

    pub fn serialize<S: Serializer>(addr: &IpAddr, serializer: S) -> Result<S::Ok, S::Error> {
        NetAddress::from(*addr).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IpAddr, D::Error> {
        NetAddress::deserialize(deserializer)?
            .to_ip()
            .map_err(D::Error::custom)
    }
}

/// `#[serde(with = "objwire_codec::net::socket_addr")]` for `SocketAddr` fields.
pub mod socket_addr {
    use std::net::SocketAddr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::NetAddress;

    pub fn serialize<S: Serializer>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error> {
        NetAddress::from(*addr).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<SocketAddr, D::Error> {
        NetAddress::deserialize(deserializer)?
            .to_socket_addr()
            .map_err(D::Error::custom)
    }
}
