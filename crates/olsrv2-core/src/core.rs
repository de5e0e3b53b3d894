use std::net::IpAddr;
use std::time::Instant;

use ipnet::IpNet;
use nhdp::{HelloMessage, IfaceId, Interface, NhdpDb};
use olsrv2::{
    compute_routes, diff_routes, ingest_tc_fragment, MprDriver, RouteEntry, RouteOp, TcContentProvider, TcDb,
    TcNeighborAddr,
};
use rfc5444::{AddressFamily, Message, Packet};
use tracing::{trace, warn};

use crate::dup_set::DupSet;
use crate::error::CoreResult;

const HELLO_MSG_TYPE: u8 = nhdp::HELLO_MSG_TYPE;
const TC_MSG_TYPE: u8 = olsrv2::TC_MSG_TYPE;

/// Which socket an outgoing datagram from `drain_outgoing_packets` should be
/// sent on: a HELLO is link-local to one interface, a TC is flooded out
/// every interface that participates in routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Hello(IfaceId),
    Tc,
}

/// Static parameters an `OlsrCore` is built with; these map directly to the
/// `[olsrv2]` section of the daemon's configuration file.
#[derive(Clone, Debug)]
pub struct OlsrCoreConfig {
    pub originator: IpAddr,
    pub address_family: AddressFamily,
    pub hello_validity_ms: u64,
    pub hello_interval_ms: u64,
    pub tc_validity_ms: u64,
    pub tc_hop_limit: u8,
    pub mtu: usize,
}

impl Default for OlsrCoreConfig {
    fn default() -> Self {
        Self {
            originator: "0.0.0.0".parse().unwrap(),
            address_family: AddressFamily::V4,
            hello_validity_ms: 6_000,
            hello_interval_ms: 2_000,
            tc_validity_ms: 300_000,
            tc_hop_limit: 255,
            mtu: 1400,
        }
    }
}

/// Builder for `OlsrCore`, following the same `with_*`-then-`build` shape
/// the teacher's client/server types use for optional configuration.
#[derive(Default)]
pub struct OlsrCoreBuilder {
    config: OlsrCoreConfig,
}

impl OlsrCoreBuilder {
    pub fn with_originator(mut self, originator: IpAddr) -> Self {
        self.config.originator = originator;
        self
    }

    pub fn with_address_family(mut self, family: AddressFamily) -> Self {
        self.config.address_family = family;
        self
    }

    pub fn with_hello_timing(mut self, interval_ms: u64, validity_ms: u64) -> Self {
        self.config.hello_interval_ms = interval_ms;
        self.config.hello_validity_ms = validity_ms;
        self
    }

    pub fn with_tc_timing(mut self, validity_ms: u64) -> Self {
        self.config.tc_validity_ms = validity_ms;
        self
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.config.mtu = mtu;
        self
    }

    pub fn build(self) -> OlsrCore {
        OlsrCore::new(self.config)
    }
}

/// Ties the NHDP link/neighbor engine, the TC topology database, the
/// duplicate set, and the MPR-recompute trigger into a single
/// non-reentrant, single-threaded façade. Owns no socket or timer of its
/// own: `bins/olsrv2d` drives it from a `tokio` event loop, feeding received
/// datagrams and periodic timer ticks in, and draining outgoing packets and
/// route changes back out.
pub struct OlsrCore {
    pub nhdp: NhdpDb,
    pub tc: TcDb,
    config: OlsrCoreConfig,
    dup_set: DupSet,
    mpr_driver: MprDriver,
    tc_seq_num: u16,
    routes: Vec<RouteEntry>,
    pending_route_ops: Vec<RouteOp>,
    pending_outgoing: Vec<(TargetKind, Vec<u8>)>,
}

impl OlsrCore {
    pub fn new(config: OlsrCoreConfig) -> Self {
        Self {
            nhdp: NhdpDb::new(),
            tc: TcDb::new(),
            config,
            dup_set: DupSet::new(),
            mpr_driver: MprDriver::new(),
            tc_seq_num: 0,
            routes: Vec::new(),
            pending_route_ops: Vec::new(),
            pending_outgoing: Vec::new(),
        }
    }

    pub fn builder() -> OlsrCoreBuilder {
        OlsrCoreBuilder::default()
    }

    pub fn add_interface(&mut self, iface: Interface) -> IfaceId {
        self.nhdp.add_interface(iface)
    }

    /// React to the kernel reporting an address add/remove on a managed
    /// interface: addresses no longer present enter their `I_HOLD_TIME`
    /// grace period rather than being dropped immediately, so links and
    /// HELLO matching built on them keep working while peers catch up.
    pub fn on_interface_change(&mut self, iface: IfaceId, addrs: Vec<IpNet>, now: Instant) {
        let addrs = addrs.iter().map(|n| n.addr()).collect();
        self.nhdp.set_interface_addrs(iface, addrs, now);
    }

    /// Decode a received datagram and fold every message in it into the
    /// relevant database. HELLOs are link-local and never forwarded, so
    /// they bypass the duplicate set; TC messages go through it first.
    pub fn on_packet(&mut self, iface: IfaceId, src: IpAddr, bytes: &[u8], now: Instant) -> CoreResult<()> {
        let packet = Packet::decode(bytes)?;

        for msg in &packet.messages {
            match msg.header.msg_type {
                HELLO_MSG_TYPE => {
                    let hello = HelloMessage::decode(msg)?;
                    self.nhdp.process_hello(iface, src, &hello, now)?;
                }
                TC_MSG_TYPE => {
                    let (Some(originator), Some(seq)) = (msg.header.originator, msg.header.seq_num) else {
                        warn!("TC message missing originator or sequence number");
                        continue;
                    };
                    if self.dup_set.check_and_insert(originator, TC_MSG_TYPE, seq, now, self.config.tc_validity_ms) {
                        trace!(%originator, seq, "dropping duplicate TC message");
                        continue;
                    }
                    ingest_tc_fragment(&mut self.tc, msg, now, self.config.tc_validity_ms)?;

                    if self.is_flooding_mpr_for(src) {
                        if let Some(forwarded) = forward_tc_message(msg) {
                            self.pending_outgoing.push((TargetKind::Tc, forwarded));
                        } else {
                            trace!(%originator, seq, "not forwarding TC: hop limit exhausted");
                        }
                    }
                }
                other => {
                    trace!(msg_type = other, "ignoring unrecognized message type");
                }
            }
        }

        self.recompute(now);
        Ok(())
    }

    /// Periodic per-interface HELLO timer: build and queue the outgoing
    /// HELLO for `iface`.
    pub fn on_hello_timer(&mut self, iface: IfaceId, now: Instant) -> CoreResult<()> {
        let hello = self.nhdp.build_hello(iface, Some(self.config.originator))?;
        let msg = hello.encode(self.config.address_family)?;
        let packet = Packet { messages: vec![msg] };
        self.pending_outgoing.push((TargetKind::Hello(iface), packet.encode()?));
        self.recompute(now);
        Ok(())
    }

    /// Is the neighbor heard through `src` one we flood on behalf of, i.e.
    /// did it select us as its MPR in at least one domain? Gates both TC
    /// relay (item 5) and, via `mpr_selector`, which neighbors this node
    /// advertises in its own TC (item 2).
    fn is_flooding_mpr_for(&self, src: IpAddr) -> bool {
        self.nhdp.neighbors().any(|(_, n)| n.has_addr(&src) && !n.mpr_selector.is_empty())
    }

    /// Periodic global TC timer: build and queue the (possibly
    /// multi-fragment) TC datagrams advertising, per domain, every symmetric
    /// neighbor that selected this node as its MPR in that domain.
    pub fn on_tc_timer(&mut self, now: Instant) -> CoreResult<()> {
        self.tc_seq_num = self.tc_seq_num.wrapping_add(1);
        let domain_ids: Vec<u8> = self.nhdp.domains.ids().collect();

        let neighbors: Vec<TcNeighborAddr> = self
            .nhdp
            .neighbors()
            .filter(|(_, n)| n.symmetric && !n.mpr_selector.is_empty())
            .filter_map(|(_, n)| {
                let addr = n.originator.or_else(|| n.addrs.iter().next().copied())?;
                let metrics: Vec<(u8, u32)> = domain_ids
                    .iter()
                    .filter(|&&domain| n.is_selector_in(domain))
                    .map(|&domain| {
                        let metric = n
                            .links
                            .iter()
                            .filter_map(|l| self.nhdp.link(*l).and_then(|lk| lk.metric_out(domain)))
                            .min()
                            .unwrap_or(rfc5444::METRIC_INFINITE);
                        (domain, metric)
                    })
                    .collect();
                if metrics.is_empty() {
                    return None;
                }
                Some(TcNeighborAddr {
                    addr,
                    is_originator: n.originator.is_some(),
                    metrics,
                })
            })
            .collect();

        let mut provider = TcContentProvider {
            originator: self.config.originator,
            family: self.config.address_family,
            ansn: self.tc_seq_num,
            hop_limit: self.config.tc_hop_limit,
            seq_num: self.tc_seq_num,
            neighbors,
            networks: Vec::new(),
        };

        for fragment in rfc5444::write_fragmented(&mut provider, self.config.mtu)? {
            self.pending_outgoing.push((TargetKind::Tc, fragment));
        }

        self.recompute(now);
        Ok(())
    }

    /// Advance link/topology expiry, recompute MPRs if the neighborhood
    /// changed, and recompute routes for every registered domain, queuing
    /// the diff for `drain_route_ops`. Called after every event that could
    /// move the clock forward or change link/topology state; idempotent
    /// between calls at the same `now`.
    fn recompute(&mut self, now: Instant) {
        self.nhdp.expire(now);
        self.tc.expire(now);
        self.dup_set.expire(now);

        let events = self.nhdp.drain_events();
        self.mpr_driver.on_events(&mut self.nhdp, &events);

        let mut new_routes = Vec::new();
        for domain in self.nhdp.domains.ids() {
            new_routes.extend(compute_routes(&self.nhdp, &self.tc, domain, self.config.originator));
        }
        let ops = diff_routes(&self.routes, &new_routes);
        self.routes = new_routes;
        self.pending_route_ops.extend(ops);
    }

    /// Force an out-of-band expiry/MPR/route recompute, independent of any
    /// packet or timer event. Used by the introspection REPL's `tick`
    /// command and by tests.
    pub fn on_tick(&mut self, now: Instant) {
        self.recompute(now);
    }

    /// Take the route operations accumulated since the last drain, in the
    /// order they should be applied to a `RouteSink`.
    pub fn drain_route_ops(&mut self) -> Vec<RouteOp> {
        std::mem::take(&mut self.pending_route_ops)
    }

    /// Take the outgoing datagrams accumulated since the last drain.
    pub fn drain_outgoing_packets(&mut self) -> Vec<(TargetKind, Vec<u8>)> {
        std::mem::take(&mut self.pending_outgoing)
    }

    pub fn config(&self) -> &OlsrCoreConfig {
        &self.config
    }

    /// The routing table as of the last recompute, for introspection
    /// (`olsrv2-ctl`'s `routes` command); does not drain the pending diff.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }
}

/// Build the re-flooded datagram for a received TC message: hop count up
/// one, hop limit down one, same TLVs and addresses otherwise. Returns
/// `None` when the message has no hop limit left to spend (it must not be
/// forwarded further) or carries no hop limit at all.
fn forward_tc_message(msg: &Message) -> Option<Vec<u8>> {
    let hop_limit = msg.header.hop_limit?;
    if hop_limit == 0 {
        return None;
    }
    let mut forwarded = msg.clone();
    forwarded.header.hop_limit = Some(hop_limit - 1);
    forwarded.header.hop_count = Some(msg.header.hop_count.unwrap_or(0).saturating_add(1));
    Packet { messages: vec![forwarded] }.encode().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhdp::Interface;

    fn one_iface_core(originator: &str) -> (OlsrCore, IfaceId) {
        let originator: IpAddr = originator.parse().unwrap();
        let mut core = OlsrCore::builder()
            .with_originator(originator)
            .with_hello_timing(2_000, 6_000)
            .build();
        let mut iface = Interface::new("eth0", 2_000, 6_000);
        iface.push_addr(originator);
        let iface_id = core.add_interface(iface);
        (core, iface_id)
    }

    /// A cold-start HELLO exchange between two directly connected nodes
    /// should converge to a symmetric link within two round trips, with
    /// neither side ever decoding its own transmissions (no loopback).
    #[test]
    fn two_nodes_reach_symmetric_link_via_hello_exchange() {
        let now = Instant::now();
        let (mut a, a_iface) = one_iface_core("10.0.0.1");
        let (mut b, b_iface) = one_iface_core("10.0.0.2");
        let a_addr: IpAddr = "10.0.0.1".parse().unwrap();
        let b_addr: IpAddr = "10.0.0.2".parse().unwrap();

        // Round 1: A -> B. A doesn't know about B yet, so this is a bare HELLO.
        a.on_hello_timer(a_iface, now).unwrap();
        let (_, a_hello_1) = a.drain_outgoing_packets().remove(0);
        b.on_packet(b_iface, a_addr, &a_hello_1, now).unwrap();
        assert!(!b.nhdp.neighbors().next().unwrap().1.symmetric);

        // Round 2: B -> A. B now reports A as Heard; A sees itself and
        // upgrades to Symmetric even though B hasn't claimed Symmetric yet.
        b.on_hello_timer(b_iface, now).unwrap();
        let (_, b_hello_1) = b.drain_outgoing_packets().remove(0);
        a.on_packet(a_iface, b_addr, &b_hello_1, now).unwrap();
        assert!(a.nhdp.neighbors().next().unwrap().1.symmetric);

        // Round 3: A -> B. A now reports B as Symmetric; B confirms too.
        a.on_hello_timer(a_iface, now).unwrap();
        let (_, a_hello_2) = a.drain_outgoing_packets().remove(0);
        b.on_packet(b_iface, a_addr, &a_hello_2, now).unwrap();
        assert!(b.nhdp.neighbors().next().unwrap().1.symmetric);
    }

    #[test]
    fn tc_timer_emits_a_single_fragment_without_symmetric_neighbors() {
        let now = Instant::now();
        let (mut a, _) = one_iface_core("10.0.0.1");
        a.on_tc_timer(now).unwrap();
        let outgoing = a.drain_outgoing_packets();
        assert_eq!(outgoing.len(), 1);
        assert!(matches!(outgoing[0].0, TargetKind::Tc));
    }

    fn decode_fragment(bytes: &[u8]) -> rfc5444::Packet {
        let mut buf = (1u16).to_be_bytes().to_vec();
        buf.extend_from_slice(bytes);
        rfc5444::Packet::decode(&buf).unwrap()
    }

    /// A symmetric neighbor that never selected us as its MPR must not be
    /// advertised in TC: flooding is gated on `mpr_selector`, not mere
    /// symmetry.
    #[test]
    fn tc_timer_skips_neighbors_that_never_selected_us_as_mpr() {
        use std::collections::HashSet;
        use nhdp::{HelloAddr, HelloMessage};
        use rfc5444::LinkStatusValue;

        let now = Instant::now();
        let (mut a, a_iface) = one_iface_core("10.0.0.1");
        let b_addr: IpAddr = "10.0.0.2".parse().unwrap();

        let hello = HelloMessage {
            originator: Some(b_addr),
            validity_ms: 6000,
            interval_ms: 2000,
            willingness: vec![(0, 7)],
            addrs: vec![HelloAddr {
                addr: "10.0.0.1".parse().unwrap(),
                local_if: None,
                link_status: Some(LinkStatusValue::Symmetric),
                mpr_domains: HashSet::new(),
                link_metrics: Vec::new(),
            }],
        };
        a.nhdp.process_hello(a_iface, b_addr, &hello, now).unwrap();
        assert!(a.nhdp.neighbors().next().unwrap().1.symmetric);

        a.on_tc_timer(now).unwrap();
        let (_, bytes) = a.drain_outgoing_packets().remove(0);
        let packet = decode_fragment(&bytes);
        assert!(packet.messages[0].addresses.is_empty());
    }

    /// Once B's HELLO reports an MPR marker against our address, we are its
    /// flooding MPR: our TC must carry it, and a TC we subsequently receive
    /// from B must be relayed onward with hop-count/hop-limit adjusted.
    #[test]
    fn selected_neighbor_is_advertised_and_its_tc_is_relayed() {
        use std::collections::HashSet;
        use nhdp::{HelloAddr, HelloMessage};
        use rfc5444::LinkStatusValue;

        let now = Instant::now();
        let (mut a, a_iface) = one_iface_core("10.0.0.1");
        let b_addr: IpAddr = "10.0.0.2".parse().unwrap();

        let mut mpr_domains = HashSet::new();
        mpr_domains.insert(0u8);
        let hello = HelloMessage {
            originator: Some(b_addr),
            validity_ms: 6000,
            interval_ms: 2000,
            willingness: vec![(0, 7)],
            addrs: vec![HelloAddr {
                addr: "10.0.0.1".parse().unwrap(),
                local_if: None,
                link_status: Some(LinkStatusValue::Symmetric),
                mpr_domains,
                link_metrics: Vec::new(),
            }],
        };
        a.nhdp.process_hello(a_iface, b_addr, &hello, now).unwrap();

        a.on_tc_timer(now).unwrap();
        let (_, bytes) = a.drain_outgoing_packets().remove(0);
        let packet = decode_fragment(&bytes);
        assert_eq!(packet.messages[0].addresses.len(), 1);
        assert_eq!(packet.messages[0].addresses[0].addr, b_addr);

        // Now B forwards a TC originated further away; A must relay it.
        let mut provider = TcContentProvider {
            originator: "10.0.0.9".parse().unwrap(),
            family: AddressFamily::V4,
            ansn: 1,
            hop_limit: 5,
            seq_num: 1,
            neighbors: Vec::new(),
            networks: Vec::new(),
        };
        let fragments = rfc5444::write_fragmented(&mut provider, 4096).unwrap();
        let mut tc_bytes = (1u16).to_be_bytes().to_vec();
        tc_bytes.extend_from_slice(&fragments[0]);

        a.on_packet(a_iface, b_addr, &tc_bytes, now).unwrap();
        let relayed = a.drain_outgoing_packets();
        assert_eq!(relayed.len(), 1);
        assert!(matches!(relayed[0].0, TargetKind::Tc));

        let relayed_packet = Packet::decode(&relayed[0].1).unwrap();
        assert_eq!(relayed_packet.messages[0].header.hop_limit, Some(4));
        assert_eq!(relayed_packet.messages[0].header.hop_count, Some(1));
    }
}
