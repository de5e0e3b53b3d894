use std::net::IpAddr;
use std::time::Instant;

use generational_arena::Index;

use crate::iface::IfaceId;
use crate::neighbor::NeighborId;

pub type LinkId = Index;

/// RFC 6130 §3.3 link status, local to this node's view of one neighboring
/// interface. A link starts `Pending` the moment it's created and is
/// upgraded to `Heard`/`Symmetric` only once a HELLO from the far end
/// establishes that it heard us back; nothing ever downgrades back to
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Pending,
    Heard,
    Symmetric,
    Lost,
}

/// A single link-tuple: one (local interface, remote interface address)
/// pair observed via HELLO exchange. Lives in the link arena owned by
/// `NhdpDb`; referenced by index from `Interface::links` and
/// `Neighbor::links`.
#[derive(Debug, Clone)]
pub struct Link {
    pub iface: IfaceId,
    pub neighbor: NeighborId,
    pub remote_addr: IpAddr,
    pub status: LinkStatus,
    pub heard_time: Instant,
    pub sym_time: Option<Instant>,
    pub expire_time: Instant,
    /// Per-domain incoming metric, set by the domain's metric handler (or
    /// later overwritten by an external plugin via `set_incoming_metric`).
    pub incoming_metric: Vec<(u8, u32)>,
    pub outgoing_metric: Vec<(u8, u32)>,
}

impl Link {
    pub fn metric_in(&self, domain: u8) -> Option<u32> {
        self.incoming_metric.iter().find(|(d, _)| *d == domain).map(|(_, m)| *m)
    }

    pub fn metric_out(&self, domain: u8) -> Option<u32> {
        self.outgoing_metric.iter().find(|(d, _)| *d == domain).map(|(_, m)| *m)
    }

    pub fn set_metric_in(&mut self, domain: u8, value: u32) {
        match self.incoming_metric.iter_mut().find(|(d, _)| *d == domain) {
            Some(entry) => entry.1 = value,
            None => self.incoming_metric.push((domain, value)),
        }
    }

    pub fn set_metric_out(&mut self, domain: u8, value: u32) {
        match self.outgoing_metric.iter_mut().find(|(d, _)| *d == domain) {
            Some(entry) => entry.1 = value,
            None => self.outgoing_metric.push((domain, value)),
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.status == LinkStatus::Symmetric
    }

    pub fn has_expired(&self, now: Instant) -> bool {
        now >= self.expire_time
    }
}
