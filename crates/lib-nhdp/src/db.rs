use std::collections::HashSet;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use generational_arena::Arena;
use rfc5444::LinkStatusValue;
use tracing::debug;

use crate::domain::{DomainId, DomainRegistry, MprCandidate, MprInput};
use crate::error::{NhdpError, NhdpResult};
use crate::event::NhdpEvent;
use crate::hello::{HelloAddr, HelloMessage};
use crate::iface::{IfaceId, Interface};
use crate::link::{Link, LinkId, LinkStatus};
use crate::neighbor::{Neighbor, NeighborId};

/// The single-threaded NHDP database: interfaces, links, neighbors, and the
/// registered domains. Owns no sockets or timers of its own; the caller
/// drives `process_hello`/`expire` from its event loop and reads back
/// `drain_events` to learn what changed.
pub struct NhdpDb {
    pub domains: DomainRegistry,
    ifaces: Arena<Interface>,
    links: Arena<Link>,
    neighbors: Arena<Neighbor>,
    events: Vec<NhdpEvent>,
}

impl Default for NhdpDb {
    fn default() -> Self {
        Self {
            domains: DomainRegistry::default(),
            ifaces: Arena::new(),
            links: Arena::new(),
            neighbors: Arena::new(),
            events: Vec::new(),
        }
    }
}

impl NhdpDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interface(&mut self, iface: Interface) -> IfaceId {
        self.ifaces.insert(iface)
    }

    pub fn iface(&self, id: IfaceId) -> Option<&Interface> {
        self.ifaces.get(id)
    }

    pub fn iface_by_name(&self, name: &str) -> Option<IfaceId> {
        self.ifaces.iter().find(|(_, i)| i.name == name).map(|(id, _)| id)
    }

    /// Reconcile the set of addresses an interface originates HELLOs from
    /// against a freshly reported list, e.g. after the kernel reports an
    /// address add/remove on that link. Addresses no longer present start
    /// their `I_HOLD_TIME` grace period rather than disappearing at once.
    pub fn set_interface_addrs(&mut self, iface_id: IfaceId, addrs: Vec<IpAddr>, now: Instant) {
        if let Some(iface) = self.ifaces.get_mut(iface_id) {
            iface.apply_addr_change(&addrs, now);
        }
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn neighbor(&self, id: NeighborId) -> Option<&Neighbor> {
        self.neighbors.get(id)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = (NeighborId, &Neighbor)> {
        self.neighbors.iter()
    }

    pub fn drain_events(&mut self) -> Vec<NhdpEvent> {
        std::mem::take(&mut self.events)
    }

    fn all_local_addrs(&self) -> HashSet<IpAddr> {
        self.ifaces.iter().flat_map(|(_, i)| i.all_addrs()).collect()
    }

    fn find_neighbor_by_addr(&self, addr: &IpAddr) -> Option<NeighborId> {
        self.neighbors.iter().find(|(_, n)| n.has_addr(addr)).map(|(id, _)| id)
    }

    fn find_link(&self, iface: IfaceId, remote_addr: &IpAddr) -> Option<LinkId> {
        self.links
            .iter()
            .find(|(_, l)| l.iface == iface && l.remote_addr == *remote_addr)
            .map(|(id, _)| id)
    }

    /// Ingest one received HELLO, updating (or creating) the link and
    /// neighbor it concerns, and queuing the events that follow from the
    /// resulting state transitions.
    pub fn process_hello(
        &mut self,
        iface_id: IfaceId,
        remote_addr: IpAddr,
        hello: &HelloMessage,
        now: Instant,
    ) -> NhdpResult<()> {
        if !self.ifaces.contains(iface_id) {
            return Err(NhdpError::UnknownInterface(format!("{remote_addr}")));
        }

        // Seeing our own address listed at all - Heard or Symmetric - proves the
        // sender received a transmission from us, so the link is bidirectional
        // from here even before the sender itself has upgraded to Symmetric.
        let local_addrs = self.all_local_addrs();
        let heard_us_symmetric = hello.addrs.iter().any(|a| {
            local_addrs.contains(&a.addr)
                && matches!(a.link_status, Some(LinkStatusValue::Heard) | Some(LinkStatusValue::Symmetric))
        });

        let neighbor_id = match self.find_neighbor_by_addr(&remote_addr) {
            Some(id) => id,
            None => self.neighbors.insert(Neighbor::new()),
        };

        let link_id = match self.find_link(iface_id, &remote_addr) {
            Some(id) => id,
            None => {
                let default_metric = self
                    .domains
                    .iter()
                    .map(|d| (d.id, d.metric.initial_metric()))
                    .collect::<Vec<_>>();
                let link = Link {
                    iface: iface_id,
                    neighbor: neighbor_id,
                    remote_addr,
                    status: LinkStatus::Pending,
                    heard_time: now,
                    sym_time: None,
                    expire_time: now + Duration::from_millis(hello.validity_ms),
                    incoming_metric: default_metric.clone(),
                    outgoing_metric: default_metric,
                };
                let id = self.links.insert(link);
                self.ifaces[iface_id].links.push(id);
                self.neighbors[neighbor_id].links.push(id);
                self.events.push(NhdpEvent::LinkUp {
                    link: id,
                    neighbor: neighbor_id,
                });
                id
            }
        };

        let was_symmetric = self.links[link_id].is_symmetric();
        let link = &mut self.links[link_id];
        link.heard_time = now;
        link.expire_time = now + Duration::from_millis(hello.validity_ms);
        link.status = if heard_us_symmetric {
            link.sym_time = Some(now);
            LinkStatus::Symmetric
        } else {
            LinkStatus::Heard
        };
        let now_symmetric = link.is_symmetric();

        if !was_symmetric && now_symmetric {
            debug!(?remote_addr, "link became symmetric");
        }

        // A link-metric TLV reported against one of our own addresses describes
        // this specific link; OUTGOING_LINK is the sender's cost to reach us
        // (our incoming metric), INCOMING_LINK is the sender's cost to hear us
        // (our outgoing metric).
        for a in &hello.addrs {
            if !local_addrs.contains(&a.addr) {
                continue;
            }
            for &(domain, packed) in &a.link_metrics {
                let (flags, encoded) = rfc5444::unpack_metric_tlv_value(packed);
                let metric = rfc5444::metric_decode(encoded);
                let link = &mut self.links[link_id];
                if flags & rfc5444::metric_flags::OUTGOING_LINK != 0 {
                    link.set_metric_in(domain, metric);
                }
                if flags & rfc5444::metric_flags::INCOMING_LINK != 0 {
                    link.set_metric_out(domain, metric);
                }
            }
        }

        // Likewise, an MPR marker reported against one of our own addresses
        // means the sender has selected us as its MPR in that domain: refresh
        // the set wholesale, mirroring how `two_hop_addrs` tracks the latest
        // HELLO rather than accumulating history.
        let selector_domains: HashSet<u8> = hello
            .addrs
            .iter()
            .filter(|a| local_addrs.contains(&a.addr))
            .flat_map(|a| a.mpr_domains.iter().copied())
            .collect();

        let neighbor = &mut self.neighbors[neighbor_id];
        neighbor.addrs.insert(remote_addr);
        for &(domain, value) in &hello.willingness {
            neighbor.set_willingness(domain, value);
        }
        neighbor.mpr_selector = selector_domains;
        if neighbor.originator != hello.originator && hello.originator.is_some() {
            neighbor.originator = hello.originator;
            self.events.push(NhdpEvent::OriginatorChanged {
                neighbor: neighbor_id,
                originator: hello.originator,
            });
        }

        let two_hop: HashSet<IpAddr> = hello
            .addrs
            .iter()
            .filter(|a| a.link_status == Some(LinkStatusValue::Symmetric) && !local_addrs.contains(&a.addr))
            .map(|a| a.addr)
            .collect();
        if neighbor.two_hop_addrs != two_hop {
            neighbor.two_hop_addrs = two_hop;
            self.events.push(NhdpEvent::TwoHopSetChanged { neighbor: neighbor_id });
        }

        let any_symmetric_link = neighbor.links.iter().any(|l| {
            self.links.get(*l).map(|link| link.is_symmetric()).unwrap_or(false)
        });
        let neighbor = &mut self.neighbors[neighbor_id];
        let was_neighbor_symmetric = neighbor.symmetric;
        neighbor.symmetric = any_symmetric_link;

        if !was_neighbor_symmetric && any_symmetric_link {
            self.events.push(NhdpEvent::NeighborSymmetric { neighbor: neighbor_id });
        } else if was_neighbor_symmetric && !any_symmetric_link {
            self.events.push(NhdpEvent::NeighborLost { neighbor: neighbor_id });
        }

        Ok(())
    }

    /// Drop links and neighbors whose hold time has elapsed, queuing the
    /// corresponding down/lost events. Called periodically by the caller's
    /// event loop, not on a dedicated timer owned by this crate.
    pub fn expire(&mut self, now: Instant) {
        for (_, iface) in self.ifaces.iter_mut() {
            let hold_time = Duration::from_millis(iface.hello_validity_ms);
            iface.expire_addrs(now, hold_time);
        }

        let expired: Vec<LinkId> = self
            .links
            .iter()
            .filter(|(_, l)| l.has_expired(now))
            .map(|(id, _)| id)
            .collect();

        for link_id in expired {
            let link = self.links.remove(link_id).expect("just matched");
            if let Some(iface) = self.ifaces.get_mut(link.iface) {
                iface.links.retain(|l| *l != link_id);
            }
            self.events.push(NhdpEvent::LinkDown {
                link: link_id,
                neighbor: link.neighbor,
            });

            let mut drop_neighbor = false;
            let mut lost_neighbor = false;
            if let Some(neighbor) = self.neighbors.get_mut(link.neighbor) {
                neighbor.links.retain(|l| *l != link_id);
                let still_symmetric = neighbor
                    .links
                    .iter()
                    .any(|l| self.links.get(*l).map(|lk| lk.is_symmetric()).unwrap_or(false));
                if neighbor.links.is_empty() {
                    drop_neighbor = true;
                    lost_neighbor = true;
                } else if neighbor.symmetric && !still_symmetric {
                    neighbor.symmetric = false;
                    lost_neighbor = true;
                }
            }
            if drop_neighbor {
                self.neighbors.remove(link.neighbor);
            }
            if lost_neighbor {
                self.events.push(NhdpEvent::NeighborLost { neighbor: link.neighbor });
            }
        }
    }

    pub fn set_incoming_metric(&mut self, link: LinkId, domain: u8, value: u32) {
        if let Some(link) = self.links.get_mut(link) {
            link.set_metric_in(domain, value);
        }
    }

    /// Run the domain's MPR handler against the current one-hop/two-hop view
    /// and apply the resulting selection to each neighbor's `is_mpr` flag.
    pub fn recompute_mpr(&mut self, domain_id: DomainId) {
        let candidates: Vec<(NeighborId, MprCandidate)> = self
            .neighbors
            .iter()
            .filter(|(_, n)| n.symmetric)
            .filter_map(|(id, n)| {
                let addr = n.originator.or_else(|| n.addrs.iter().next().copied())?;
                let out_metric = n
                    .links
                    .iter()
                    .filter_map(|l| self.links.get(*l).and_then(|lk| lk.metric_out(domain_id)))
                    .min()
                    .unwrap_or(u32::MAX);
                Some((
                    id,
                    MprCandidate {
                        neighbor_addr: addr,
                        willingness: n.willingness(domain_id),
                        out_metric,
                        two_hop: n.two_hop_addrs.clone(),
                    },
                ))
            })
            .collect();

        let input_candidates: Vec<MprCandidate> = candidates.iter().map(|(_, c)| c.clone()).collect();

        let selected = match self.domains.get_mut(domain_id) {
            Some(domain) => domain.mpr.select_mpr(&MprInput {
                one_hop: &input_candidates,
            }),
            None => return,
        };

        for (id, candidate) in &candidates {
            if let Some(neighbor) = self.neighbors.get_mut(*id) {
                if selected.contains(&candidate.neighbor_addr) {
                    neighbor.is_mpr.insert(domain_id);
                } else {
                    neighbor.is_mpr.remove(&domain_id);
                }
            }
        }
    }

    /// Build the outgoing HELLO for `iface_id`: its own addresses (marked
    /// `ThisIf`/`OtherIf`), plus one address per link reporting that link's
    /// status, the domains it's an MPR selection for, and its per-domain
    /// outgoing metric.
    pub fn build_hello(&self, iface_id: IfaceId, originator: Option<IpAddr>) -> NhdpResult<HelloMessage> {
        let iface = self.ifaces.get(iface_id).ok_or(NhdpError::UnknownInterface(String::new()))?;

        let mut addrs = Vec::new();
        for (other_id, other) in self.ifaces.iter() {
            for addr in other.all_addrs() {
                let mut a = HelloAddr::new(addr);
                a.local_if = Some(if other_id == iface_id {
                    rfc5444::LocalIf::ThisIf
                } else {
                    rfc5444::LocalIf::OtherIf
                });
                addrs.push(a);
            }
        }

        for link_id in &iface.links {
            let Some(link) = self.links.get(*link_id) else { continue };
            let status = match link.status {
                LinkStatus::Pending => LinkStatusValue::Heard,
                LinkStatus::Symmetric => LinkStatusValue::Symmetric,
                LinkStatus::Heard => LinkStatusValue::Heard,
                LinkStatus::Lost => LinkStatusValue::Lost,
            };
            let mut a = HelloAddr::new(link.remote_addr);
            a.link_status = Some(status);
            if let Some(neighbor) = self.neighbors.get(link.neighbor) {
                a.mpr_domains = neighbor.is_mpr.clone();
            }
            for domain_id in self.domains.ids() {
                if let Some(metric) = link.metric_out(domain_id) {
                    a.link_metrics.push((
                        domain_id,
                        rfc5444::pack_metric_tlv_value(rfc5444::metric_flags::OUTGOING_LINK, rfc5444::metric_encode(metric)),
                    ));
                }
            }
            addrs.push(a);
        }

        let willingness = self.domains.iter().map(|d| (d.id, d.willingness)).collect();

        Ok(HelloMessage {
            originator,
            validity_ms: iface.hello_validity_ms,
            interval_ms: iface.hello_interval_ms,
            willingness,
            addrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_hello(originator: IpAddr, reported_back: Option<(IpAddr, LinkStatusValue)>) -> HelloMessage {
        let mut addrs = Vec::new();
        if let Some((back, status)) = reported_back {
            addrs.push(HelloAddr {
                addr: back,
                local_if: None,
                link_status: Some(status),
                mpr_domains: HashSet::new(),
                link_metrics: Vec::new(),
            });
        }
        HelloMessage {
            originator: Some(originator),
            validity_ms: 6000,
            interval_ms: 2000,
            willingness: vec![(0, 7)],
            addrs,
        }
    }

    #[test]
    fn link_becomes_symmetric_when_we_are_heard_back() {
        let mut db = NhdpDb::new();
        let mut iface = Interface::new("wlan0", 2000, 6000);
        iface.push_addr("10.0.0.1".parse().unwrap());
        let iface_id = db.add_interface(iface);

        let now = Instant::now();
        let remote: IpAddr = "10.0.0.2".parse().unwrap();
        let hello = make_hello(remote, Some(("10.0.0.1".parse().unwrap(), LinkStatusValue::Symmetric)));

        db.process_hello(iface_id, remote, &hello, now).unwrap();

        let link_id = db.find_link(iface_id, &remote).unwrap();
        assert!(db.link(link_id).unwrap().is_symmetric());

        let events = db.drain_events();
        assert!(events.iter().any(|e| matches!(e, NhdpEvent::NeighborSymmetric { .. })));
    }

    #[test]
    fn link_becomes_symmetric_on_heard_status_too() {
        // The handshake's first confirming HELLO reports our address with
        // status Heard, not Symmetric yet, since the sender hasn't upgraded
        // its own link to us. Seeing ourselves at all must be enough, or
        // neither side of a cold-start handshake could ever go first.
        let mut db = NhdpDb::new();
        let mut iface = Interface::new("wlan0", 2000, 6000);
        iface.push_addr("10.0.0.1".parse().unwrap());
        let iface_id = db.add_interface(iface);

        let now = Instant::now();
        let remote: IpAddr = "10.0.0.2".parse().unwrap();
        let hello = make_hello(remote, Some(("10.0.0.1".parse().unwrap(), LinkStatusValue::Heard)));

        db.process_hello(iface_id, remote, &hello, now).unwrap();

        let link_id = db.find_link(iface_id, &remote).unwrap();
        assert!(db.link(link_id).unwrap().is_symmetric());
    }

    #[test]
    fn link_expires_after_validity_window() {
        let mut db = NhdpDb::new();
        let mut iface = Interface::new("wlan0", 2000, 6000);
        iface.push_addr("10.0.0.1".parse().unwrap());
        let iface_id = db.add_interface(iface);

        let now = Instant::now();
        let remote: IpAddr = "10.0.0.2".parse().unwrap();
        let hello = make_hello(remote, None);
        db.process_hello(iface_id, remote, &hello, now).unwrap();
        db.drain_events();

        db.expire(now + Duration::from_millis(6001));
        assert!(db.iface(iface_id).unwrap().links.is_empty());

        let events = db.drain_events();
        assert!(events.iter().any(|e| matches!(e, NhdpEvent::LinkDown { .. })));
    }
}
