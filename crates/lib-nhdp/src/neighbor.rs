use std::collections::HashSet;
use std::net::IpAddr;

use generational_arena::Index;

use crate::domain::DomainId;
use crate::link::LinkId;

pub type NeighborId = Index;

/// A one-hop neighbor: the union of all link-tuples sharing an originator,
/// plus the two-hop set learned from its most recent HELLOs. MPR state is
/// per domain, following the same `Vec<(domain, value)>` idiom `Link` uses
/// for its metrics: `is_mpr` is "we selected this neighbor as our MPR in
/// domain d", `mpr_selector` is "this neighbor selected us as its MPR in
/// domain d" (the fact TC flooding gates on).
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub originator: Option<IpAddr>,
    pub addrs: HashSet<IpAddr>,
    pub links: Vec<LinkId>,
    pub willingness: Vec<(DomainId, u8)>,
    pub symmetric: bool,
    pub mpr_selector: HashSet<DomainId>,
    pub is_mpr: HashSet<DomainId>,
    /// Addresses of this neighbor's own symmetric neighbors, refreshed
    /// wholesale each time a HELLO is processed (no independent expiry
    /// timer: the two-hop set tracks the freshness of its owning link).
    pub two_hop_addrs: HashSet<IpAddr>,
}

impl Neighbor {
    pub fn new() -> Self {
        Self {
            originator: None,
            addrs: HashSet::new(),
            links: Vec::new(),
            willingness: Vec::new(),
            symmetric: false,
            mpr_selector: HashSet::new(),
            is_mpr: HashSet::new(),
            two_hop_addrs: HashSet::new(),
        }
    }

    pub fn has_addr(&self, addr: &IpAddr) -> bool {
        self.addrs.contains(addr) || self.originator.as_ref() == Some(addr)
    }

    pub fn willingness(&self, domain: DomainId) -> u8 {
        self.willingness
            .iter()
            .find(|(d, _)| *d == domain)
            .map(|(_, w)| *w)
            .unwrap_or(crate::domain::WILLINGNESS_DEFAULT)
    }

    pub fn set_willingness(&mut self, domain: DomainId, value: u8) {
        match self.willingness.iter_mut().find(|(d, _)| *d == domain) {
            Some(entry) => entry.1 = value,
            None => self.willingness.push((domain, value)),
        }
    }

    /// Have we (the local node) selected this neighbor as our MPR, in any
    /// registered domain? This is what an outgoing HELLO's per-address MPR
    /// TLV reports.
    pub fn is_mpr_in(&self, domain: DomainId) -> bool {
        self.is_mpr.contains(&domain)
    }

    /// Has this neighbor selected us as its MPR, in `domain`? TC flooding
    /// gates on this: we only act as this neighbor's relay when it is true
    /// in at least one domain.
    pub fn is_selector_in(&self, domain: DomainId) -> bool {
        self.mpr_selector.contains(&domain)
    }
}

impl Default for Neighbor {
    fn default() -> Self {
        Self::new()
    }
}
