use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::net::IpAddr;

use ipnet::IpNet;
use nhdp::{IfaceId, NhdpDb};
use rfc5444::METRIC_INFINITE;

use crate::tc::TcDb;

fn node_id(addr: IpAddr, addr_to_node: &mut HashMap<IpAddr, u32>, node_addrs: &mut Vec<IpAddr>) -> u32 {
    *addr_to_node.entry(addr).or_insert_with(|| {
        node_addrs.push(addr);
        (node_addrs.len() - 1) as u32
    })
}

/// One entry this router wants in the kernel/OS routing table: reach
/// `destination` via `next_hop`, out `next_hop_iface`, at `distance`
/// cumulative metric, for `domain`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub destination: IpNet,
    pub next_hop: IpAddr,
    pub next_hop_iface: IfaceId,
    pub distance: u32,
    pub domain: u8,
}

/// A single change to apply to the installed routing table, in the order
/// `diff` emits them: single-hop adds/updates land first (so a newly
/// reachable two-hop destination can never momentarily outrank a
/// still-valid one-hop route during a route-sink apply), multi-hop
/// adds/updates next, then multi-hop removals, then single-hop removals
/// last — so a route is never removed before its (possibly multi-hop)
/// replacement is in place.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOp {
    Add(RouteEntry),
    Update(RouteEntry),
    Remove { destination: IpNet, domain: u8 },
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct HeapItem {
    dist: u32,
    node: u32,
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.cmp(&self.dist)
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Run Dijkstra over the one-hop (NHDP) and multi-hop (TC) graph for one
/// domain, rooted at `local_originator`, and return the resulting route
/// table: one entry per reachable destination (router originator or
/// attached endpoint), each carrying the first hop taken out of the local
/// node. Grounded on the relax/extract-min structure of the reference
/// Dijkstra implementation, adapted to operate over address-keyed nodes
/// instead of array-indexed ones.
pub fn compute_routes(nhdp: &NhdpDb, tc: &TcDb, domain: u8, local_originator: IpAddr) -> Vec<RouteEntry> {
    let mut addr_to_node: HashMap<IpAddr, u32> = HashMap::new();
    let mut node_addrs: Vec<IpAddr> = Vec::new();

    let local_id = node_id(local_originator, &mut addr_to_node, &mut node_addrs);

    // adjacency: node -> Vec<(neighbor_node, metric)>
    let mut adjacency: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();

    for (_, neighbor) in nhdp.neighbors() {
        if !neighbor.symmetric {
            continue;
        }
        let Some(addr) = neighbor.originator.or_else(|| neighbor.addrs.iter().next().copied()) else {
            continue;
        };
        let metric = neighbor
            .links
            .iter()
            .filter_map(|l| nhdp.link(*l).and_then(|lk| lk.metric_out(domain)))
            .min()
            .unwrap_or(METRIC_INFINITE);
        if metric == METRIC_INFINITE {
            continue;
        }
        let nid = node_id(addr, &mut addr_to_node, &mut node_addrs);
        adjacency.entry(local_id).or_default().push((nid, metric));
    }

    for (tc_id, tc_node) in tc.nodes() {
        let from_id = node_id(tc_node.originator, &mut addr_to_node, &mut node_addrs);
        for edge in tc.edges(tc_id) {
            if edge.domain != domain || edge.is_virtual {
                continue;
            }
            let to_id = node_id(edge.to_originator, &mut addr_to_node, &mut node_addrs);
            adjacency.entry(from_id).or_default().push((to_id, edge.metric));
        }
    }

    let mut dist = vec![METRIC_INFINITE; node_addrs.len()];
    let mut first_hop: Vec<Option<IpAddr>> = vec![None; node_addrs.len()];
    let mut visited = vec![false; node_addrs.len()];
    dist[local_id as usize] = 0;

    let mut heap = BinaryHeap::new();
    heap.push(HeapItem { dist: 0, node: local_id });

    while let Some(HeapItem { dist: d, node: u }) = heap.pop() {
        if visited[u as usize] {
            continue;
        }
        visited[u as usize] = true;
        if d > dist[u as usize] {
            continue;
        }

        let Some(edges) = adjacency.get(&u) else { continue };
        for &(v, metric) in edges {
            if visited[v as usize] {
                continue;
            }
            let candidate = d.saturating_add(metric);
            if candidate < dist[v as usize] {
                dist[v as usize] = candidate;
                first_hop[v as usize] = if u == local_id { Some(node_addrs[v as usize]) } else { first_hop[u as usize] };
                heap.push(HeapItem { dist: candidate, node: v });
            }
        }
    }

    let mut routes = Vec::new();
    for (idx, addr) in node_addrs.iter().enumerate() {
        if idx as u32 == local_id || dist[idx] == METRIC_INFINITE {
            continue;
        }
        let Some(next_hop) = first_hop[idx] else { continue };
        let Some(link_id) = nhdp
            .neighbors()
            .find(|(_, n)| n.has_addr(&next_hop))
            .and_then(|(_, n)| n.links.first().copied())
        else {
            continue;
        };
        let Some(iface) = nhdp.link(link_id).map(|l| l.iface) else { continue };

        routes.push(RouteEntry {
            destination: host_prefix(*addr),
            next_hop,
            next_hop_iface: iface,
            distance: dist[idx],
            domain,
        });

        if let Some(node) = tc.node_by_originator(addr) {
            for endpoint in tc.endpoints(node) {
                if endpoint.domain != domain {
                    continue;
                }
                routes.push(RouteEntry {
                    destination: endpoint.prefix,
                    next_hop,
                    next_hop_iface: iface,
                    distance: dist[idx].saturating_add(endpoint.metric),
                    domain,
                });
            }
        }
    }

    routes
}

fn host_prefix(addr: IpAddr) -> IpNet {
    let prefix_len = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNet::new(addr, prefix_len).expect("host prefix length is always valid")
}

/// Diff an old and a new route table into the ordered sequence of
/// operations a route sink should apply (see `RouteOp`'s branch-order
/// contract).
pub fn diff_routes(old: &[RouteEntry], new: &[RouteEntry]) -> Vec<RouteOp> {
    let old_by_key: HashMap<(IpNet, u8), &RouteEntry> =
        old.iter().map(|r| ((r.destination, r.domain), r)).collect();
    let new_by_key: HashMap<(IpNet, u8), &RouteEntry> =
        new.iter().map(|r| ((r.destination, r.domain), r)).collect();

    // A route is "single-hop" when the destination address itself is the
    // next hop: no intermediate router sits between us and it.
    let is_single_hop = |r: &RouteEntry| r.destination.addr() == r.next_hop;

    let mut single_hop_upserts = Vec::new();
    let mut multi_hop_upserts = Vec::new();
    let mut multi_hop_removes = Vec::new();
    let mut single_hop_removes = Vec::new();

    for (key, entry) in &new_by_key {
        let op = match old_by_key.get(key) {
            Some(old_entry) if *old_entry == *entry => None,
            Some(_) => Some(RouteOp::Update((*entry).clone())),
            None => Some(RouteOp::Add((*entry).clone())),
        };
        let Some(op) = op else { continue };
        if is_single_hop(*entry) {
            single_hop_upserts.push(op);
        } else {
            multi_hop_upserts.push(op);
        }
    }

    for (key, entry) in &old_by_key {
        if new_by_key.contains_key(key) {
            continue;
        }
        let op = RouteOp::Remove {
            destination: key.0,
            domain: key.1,
        };
        if is_single_hop(*entry) {
            single_hop_removes.push(op);
        } else {
            multi_hop_removes.push(op);
        }
    }

    let mut out = Vec::with_capacity(
        single_hop_upserts.len() + multi_hop_upserts.len() + multi_hop_removes.len() + single_hop_removes.len(),
    );
    out.extend(single_hop_upserts);
    out.extend(multi_hop_upserts);
    out.extend(multi_hop_removes);
    out.extend(single_hop_removes);
    out
}
