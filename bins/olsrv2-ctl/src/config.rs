use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

use rfc5444::AddressFamily;
use serde::Deserialize;
use thiserror::Error;

/// A trimmed-down reading of the same `[olsrv2]`/`[interface.<name>]`
/// sections `olsrv2d` validates in full; `olsrv2-ctl` only needs enough to
/// stand up an equivalent in-process `OlsrCore` to introspect, not to
/// drive real sockets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error while reading TOML config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("error while deserializing TOML: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("[olsrv2] section is missing an originator address")]
    MissingOriginator,

    #[error("invalid originator address: {0:?}")]
    InvalidOriginator(String),

    #[error("invalid address family {0:?} (expected \"v4\" or \"v6\")")]
    InvalidAddressFamily(String),

    #[error("invalid address {0:?} on interface {1:?}")]
    InvalidInterfaceAddress(String, String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawOlsrv2 {
    originator: String,
    address_family: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct RawInterface {
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    olsrv2: RawOlsrv2,
    interface: HashMap<String, RawInterface>,
}

pub struct InterfaceConfig {
    pub name: String,
    pub addresses: Vec<IpAddr>,
}

pub struct Config {
    pub originator: IpAddr,
    pub address_family: AddressFamily,
    pub interfaces: Vec<InterfaceConfig>,
}

impl Config {
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        let raw: RawConfig = toml::from_str(&s)?;

        if raw.olsrv2.originator.is_empty() {
            return Err(ConfigError::MissingOriginator);
        }
        let originator = raw
            .olsrv2
            .originator
            .parse()
            .map_err(|_| ConfigError::InvalidOriginator(raw.olsrv2.originator.clone()))?;

        let address_family = match raw.olsrv2.address_family.as_str() {
            "" | "v4" => AddressFamily::V4,
            "v6" => AddressFamily::V6,
            other => return Err(ConfigError::InvalidAddressFamily(other.to_string())),
        };

        let mut interfaces = Vec::new();
        for (name, iface) in &raw.interface {
            if name == "*" {
                continue;
            }
            let mut addresses = Vec::with_capacity(iface.addresses.len());
            for addr in &iface.addresses {
                addresses.push(
                    addr.parse()
                        .map_err(|_| ConfigError::InvalidInterfaceAddress(addr.clone(), name.clone()))?,
                );
            }
            interfaces.push(InterfaceConfig { name: name.clone(), addresses });
        }

        Ok(Config { originator, address_family, interfaces })
    }
}
