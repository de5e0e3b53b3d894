use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use rfc5444::AddressFamily;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE_PATH: &str = "/etc/olsrv2/olsrv2d.toml";

const DEFAULT_HELLO_INTERVAL_SECS: u64 = 2;
const DEFAULT_HELLO_VALIDITY_SECS: u64 = 6;
const DEFAULT_TC_INTERVAL_SECS: u64 = 5;
const DEFAULT_TC_VALIDITY_SECS: u64 = 300;
const DEFAULT_TC_HOP_LIMIT: u8 = 255;
const DEFAULT_MTU: usize = 1400;
const DEFAULT_WILLINGNESS: u8 = 7;

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

    #[error("interface {0:?} has no addresses configured")]
    InterfaceWithoutAddress(String),

    #[error("invalid address {0:?} on interface {1:?}")]
    InvalidInterfaceAddress(String, String),

    #[error("willingness {0} out of range (must be 0..=15)")]
    InvalidWillingness(u8),

    #[error("invalid domain id {0:?} (must be 0..=255)")]
    InvalidDomainId(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawOlsrv2 {
    originator: String,
    address_family: String,
    hello_interval: u64,
    hello_validity: u64,
    tc_interval: u64,
    tc_validity: u64,
    tc_hop_limit: u8,
    mtu: usize,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct RawInterface {
    addresses: Vec<String>,
    hello_interval: Option<u64>,
    hello_validity: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct RawDomain {
    willingness: Option<u8>,
    metric: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    olsrv2: RawOlsrv2,
    interface: HashMap<String, RawInterface>,
    domain: HashMap<String, RawDomain>,
}

impl RawConfig {
    fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }

    /// Turn the loosely-typed TOML shape into strongly-typed, range-checked
    /// configuration, following the same two-stage split the teacher's
    /// `vulcan-dhcpc` config uses.
    fn validate(self) -> Result<Config, ConfigError> {
        if self.olsrv2.originator.is_empty() {
            return Err(ConfigError::MissingOriginator);
        }
        let originator: IpAddr = self
            .olsrv2
            .originator
            .parse()
            .map_err(|_| ConfigError::InvalidOriginator(self.olsrv2.originator.clone()))?;

        let address_family = match self.olsrv2.address_family.as_str() {
            "" | "v4" => AddressFamily::V4,
            "v6" => AddressFamily::V6,
            other => return Err(ConfigError::InvalidAddressFamily(other.to_string())),
        };

        let hello_interval = Duration::from_secs(non_zero_or(self.olsrv2.hello_interval, DEFAULT_HELLO_INTERVAL_SECS));
        let hello_validity = Duration::from_secs(non_zero_or(self.olsrv2.hello_validity, DEFAULT_HELLO_VALIDITY_SECS));
        let tc_interval = Duration::from_secs(non_zero_or(self.olsrv2.tc_interval, DEFAULT_TC_INTERVAL_SECS));
        let tc_validity = Duration::from_secs(non_zero_or(self.olsrv2.tc_validity, DEFAULT_TC_VALIDITY_SECS));
        let tc_hop_limit = if self.olsrv2.tc_hop_limit == 0 {
            DEFAULT_TC_HOP_LIMIT
        } else {
            self.olsrv2.tc_hop_limit
        };
        let mtu = if self.olsrv2.mtu == 0 { DEFAULT_MTU } else { self.olsrv2.mtu };

        let wildcard = self.interface.get("*").cloned().unwrap_or_default();

        let mut interfaces = Vec::new();
        for (name, raw) in &self.interface {
            if name == "*" {
                continue;
            }

            let addresses = if raw.addresses.is_empty() { &wildcard.addresses } else { &raw.addresses };
            if addresses.is_empty() {
                return Err(ConfigError::InterfaceWithoutAddress(name.clone()));
            }
            let mut parsed = Vec::with_capacity(addresses.len());
            for addr in addresses {
                parsed.push(
                    addr.parse()
                        .map_err(|_| ConfigError::InvalidInterfaceAddress(addr.clone(), name.clone()))?,
                );
            }

            interfaces.push(InterfaceConfig {
                name: name.clone(),
                addresses: parsed,
                hello_interval: raw
                    .hello_interval
                    .or(wildcard.hello_interval)
                    .map(Duration::from_secs)
                    .unwrap_or(hello_interval),
                hello_validity: raw
                    .hello_validity
                    .or(wildcard.hello_validity)
                    .map(Duration::from_secs)
                    .unwrap_or(hello_validity),
            });
        }

        let mut domains = Vec::new();
        for (ext, raw) in &self.domain {
            let id: u8 = ext.parse().map_err(|_| ConfigError::InvalidDomainId(ext.clone()))?;
            let willingness = raw.willingness.unwrap_or(DEFAULT_WILLINGNESS);
            if willingness > 15 {
                return Err(ConfigError::InvalidWillingness(willingness));
            }
            domains.push(DomainConfig {
                id,
                willingness,
                metric: raw.metric.clone().unwrap_or_else(|| "hop-count".to_string()),
            });
        }

        Ok(Config {
            originator,
            address_family,
            hello_interval,
            hello_validity,
            tc_interval,
            tc_validity,
            tc_hop_limit,
            mtu,
            interfaces,
            domains,
        })
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    pub name: String,
    pub addresses: Vec<IpAddr>,
    pub hello_interval: Duration,
    pub hello_validity: Duration,
}

#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub id: u8,
    pub willingness: u8,
    pub metric: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub originator: IpAddr,
    pub address_family: AddressFamily,
    pub hello_interval: Duration,
    pub hello_validity: Duration,
    pub tc_interval: Duration,
    pub tc_validity: Duration,
    pub tc_hop_limit: u8,
    pub mtu: usize,
    pub interfaces: Vec<InterfaceConfig>,
    pub domains: Vec<DomainConfig>,
}

impl Config {
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        RawConfig::from_file(&path)?.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_originator() {
        let raw = RawConfig::default();
        assert!(matches!(raw.validate(), Err(ConfigError::MissingOriginator)));
    }

    #[test]
    fn wildcard_interface_fills_in_missing_addresses() {
        let mut raw = RawConfig::default();
        raw.olsrv2.originator = "10.0.0.1".to_string();
        raw.interface.insert(
            "*".to_string(),
            RawInterface {
                addresses: vec!["10.0.0.1".to_string()],
                hello_interval: None,
                hello_validity: None,
            },
        );
        raw.interface.insert("wlan0".to_string(), RawInterface::default());

        let cfg = raw.validate().unwrap();
        assert_eq!(cfg.interfaces.len(), 1);
        assert_eq!(cfg.interfaces[0].addresses, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn rejects_out_of_range_willingness() {
        let mut raw = RawConfig::default();
        raw.olsrv2.originator = "10.0.0.1".to_string();
        raw.domain.insert(
            "0".to_string(),
            RawDomain {
                willingness: Some(20),
                metric: None,
            },
        );
        assert!(matches!(raw.validate(), Err(ConfigError::InvalidWillingness(20))));
    }
}
