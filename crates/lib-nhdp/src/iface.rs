use std::net::IpAddr;
use std::time::Instant;

use generational_arena::Index;

pub type IfaceId = Index;

/// Whether a locally configured address is currently in service or sitting
/// out its post-removal grace period (RFC 6130 `I_HOLD_TIME`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrState {
    Active,
    Removed { since: Instant },
}

/// One address an interface originates (or recently originated) HELLOs
/// from. An address dropped from the kernel's address list isn't deleted
/// immediately: it moves to `Removed` and is still recognized as ours (and
/// still advertised) until `I_HOLD_TIME` elapses, so in-flight HELLOs that
/// still reference it don't wrongly fail the "did they hear us" check.
#[derive(Debug, Clone)]
pub struct InterfaceAddr {
    pub addr: IpAddr,
    pub state: AddrState,
}

impl InterfaceAddr {
    pub fn active(addr: IpAddr) -> Self {
        Self {
            addr,
            state: AddrState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AddrState::Active)
    }

    fn has_expired(&self, now: Instant, hold_time: std::time::Duration) -> bool {
        matches!(self.state, AddrState::Removed { since } if now >= since + hold_time)
    }
}

/// A locally managed NHDP interface: its name, the addresses it originates
/// HELLOs from, and the link/neighbor entities that currently belong to it.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub addrs: Vec<InterfaceAddr>,
    pub hello_interval_ms: u64,
    pub hello_validity_ms: u64,
    pub links: Vec<super::link::LinkId>,
}

impl Interface {
    pub fn new(name: impl Into<String>, hello_interval_ms: u64, hello_validity_ms: u64) -> Self {
        Self {
            name: name.into(),
            addrs: Vec::new(),
            hello_interval_ms,
            hello_validity_ms,
            links: Vec::new(),
        }
    }

    /// Unconditionally add an address as `Active`, for initial interface
    /// setup (tests and the daemon's startup path); later address-list
    /// changes go through `apply_addr_change` instead.
    pub fn push_addr(&mut self, addr: IpAddr) {
        self.addrs.push(InterfaceAddr::active(addr));
    }

    pub fn has_addr(&self, addr: &IpAddr) -> bool {
        self.addrs.iter().any(|a| a.addr == *addr)
    }

    /// Addresses currently in service, the set HELLOs should claim as
    /// `ThisIf`/`OtherIf` without qualification.
    pub fn active_addrs(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.addrs.iter().filter(|a| a.is_active()).map(|a| a.addr)
    }

    /// Every known address, active or still inside its removal grace
    /// period — the set that should still be recognized as ours when
    /// matching incoming HELLOs and still carried in outgoing ones.
    pub fn all_addrs(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.addrs.iter().map(|a| a.addr)
    }

    /// Reconcile against a freshly reported address list: addresses no
    /// longer present start their removal grace period instead of
    /// disappearing outright; addresses reappearing during their grace
    /// period are reactivated in place.
    pub fn apply_addr_change(&mut self, reported: &[IpAddr], now: Instant) {
        for existing in self.addrs.iter_mut() {
            if reported.contains(&existing.addr) {
                existing.state = AddrState::Active;
            } else if existing.is_active() {
                existing.state = AddrState::Removed { since: now };
            }
        }
        for &addr in reported {
            if !self.addrs.iter().any(|a| a.addr == addr) {
                self.addrs.push(InterfaceAddr::active(addr));
            }
        }
    }

    /// Drop addresses whose removal grace period has fully elapsed.
    pub fn expire_addrs(&mut self, now: Instant, hold_time: std::time::Duration) {
        self.addrs.retain(|a| !a.has_expired(now, hold_time));
    }
}
