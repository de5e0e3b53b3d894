use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use generational_arena::Arena;
use ipnet::IpNet;
use rfc5444::is_newer;

pub type TcNodeId = generational_arena::Index;

/// A remote router we have learned about from a TC message, identified by
/// its originator address. Edges and attached networks are stored
/// separately, keyed by node id, mirroring the split between `tc_node`,
/// `tc_edge` and `tc_endpoint`/`tc_attachment` in the reference topology
/// database.
#[derive(Debug, Clone)]
pub struct TcNode {
    pub originator: IpAddr,
    pub ansn: u16,
    pub expire_time: Instant,
}

/// A directed link from one TC node to another originator, advertised at a
/// given domain's metric. `to` is resolved to a node id once that
/// originator is itself known; until then routing simply can't extend past
/// it. `is_virtual` is true while only this direction has been advertised
/// (the reverse edge is a hint, not confirmed connectivity); it clears the
/// moment the other node advertises the matching reverse edge.
#[derive(Debug, Clone)]
pub struct TcEdge {
    pub domain: u8,
    pub to_originator: IpAddr,
    pub metric: u32,
    pub is_virtual: bool,
}

/// A non-OLSR destination (attached network or routable endpoint address)
/// reachable through a TC node, `distance` hops beyond it.
#[derive(Debug, Clone)]
pub struct TcEndpoint {
    pub domain: u8,
    pub prefix: IpNet,
    pub metric: u32,
    pub distance: u8,
}

/// The topology database: every TC-originating node this router has a
/// current (non-expired) advertisement for, plus the edges and attached
/// networks it most recently advertised.
#[derive(Default)]
pub struct TcDb {
    nodes: Arena<TcNode>,
    by_originator: HashMap<IpAddr, TcNodeId>,
    edges: HashMap<TcNodeId, Vec<TcEdge>>,
    endpoints: HashMap<TcNodeId, Vec<TcEndpoint>>,
}

impl TcDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: TcNodeId) -> Option<&TcNode> {
        self.nodes.get(id)
    }

    pub fn node_by_originator(&self, originator: &IpAddr) -> Option<TcNodeId> {
        self.by_originator.get(originator).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (TcNodeId, &TcNode)> {
        self.nodes.iter()
    }

    pub fn edges(&self, id: TcNodeId) -> &[TcEdge] {
        self.edges.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn endpoints(&self, id: TcNodeId) -> &[TcEndpoint] {
        self.endpoints.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Apply a freshly received TC advertisement. Returns `false` (and
    /// leaves existing state untouched) when `ansn` is not newer than what
    /// is already recorded for this originator, per the sequence-number
    /// comparison rule duplicate detection also uses.
    pub fn update_node(
        &mut self,
        originator: IpAddr,
        ansn: u16,
        edges: Vec<TcEdge>,
        endpoints: Vec<TcEndpoint>,
        now: Instant,
        validity_ms: u64,
    ) -> bool {
        let node_id = match self.by_originator.get(&originator) {
            Some(&id) => {
                let existing = &self.nodes[id];
                if existing.ansn != ansn && !is_newer(ansn, existing.ansn) {
                    return false;
                }
                if existing.ansn == ansn {
                    return false;
                }
                id
            }
            None => {
                let id = self.nodes.insert(TcNode {
                    originator,
                    ansn,
                    expire_time: now + Duration::from_millis(validity_ms),
                });
                self.by_originator.insert(originator, id);
                id
            }
        };

        let node = &mut self.nodes[node_id];
        node.ansn = ansn;
        node.expire_time = now + Duration::from_millis(validity_ms);
        self.edges.insert(node_id, edges);
        self.endpoints.insert(node_id, endpoints);
        self.resolve_virtual_edges();
        true
    }

    /// Like `update_node`, but when `ansn` matches the node's current ansn
    /// (a later fragment of the same TC advertisement, not a retransmit)
    /// extends the edge/endpoint lists instead of rejecting the update.
    /// Callers processing a possibly-fragmented TC message should call this
    /// once per fragment in arrival order.
    pub fn merge_fragment(
        &mut self,
        originator: IpAddr,
        ansn: u16,
        edges: Vec<TcEdge>,
        endpoints: Vec<TcEndpoint>,
        now: Instant,
        validity_ms: u64,
    ) -> bool {
        if let Some(&id) = self.by_originator.get(&originator) {
            if self.nodes[id].ansn == ansn {
                self.nodes[id].expire_time = now + Duration::from_millis(validity_ms);
                self.edges.entry(id).or_default().extend(edges);
                self.endpoints.entry(id).or_default().extend(endpoints);
                self.resolve_virtual_edges();
                return true;
            }
        }
        self.update_node(originator, ansn, edges, endpoints, now, validity_ms)
    }

    /// Recompute each edge's `is_virtual` flag from the current edge set: an
    /// edge is virtual unless the node it points at currently advertises the
    /// matching reverse edge back to us. Mirrors the reference topology
    /// database's `inverse`-pointer bookkeeping, but recomputed from scratch
    /// rather than maintained incrementally, since edges are replaced
    /// wholesale on every update rather than patched in place.
    fn resolve_virtual_edges(&mut self) {
        let mut advertised: HashSet<(IpAddr, IpAddr)> = HashSet::new();
        for (&id, edges) in &self.edges {
            let Some(node) = self.nodes.get(id) else { continue };
            for edge in edges {
                advertised.insert((node.originator, edge.to_originator));
            }
        }

        for (&id, edges) in self.edges.iter_mut() {
            let Some(node) = self.nodes.get(id) else { continue };
            let from = node.originator;
            for edge in edges.iter_mut() {
                edge.is_virtual = !advertised.contains(&(edge.to_originator, from));
            }
        }
    }

    /// Drop nodes (and their edges/endpoints) whose advertisement has
    /// expired. Returns the set of originators removed, so the router can
    /// purge any routes that depended on them.
    pub fn expire(&mut self, now: Instant) -> Vec<IpAddr> {
        let expired: Vec<TcNodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| now >= n.expire_time)
            .map(|(id, _)| id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(node) = self.nodes.remove(id) {
                self.by_originator.remove(&node.originator);
                self.edges.remove(&id);
                self.endpoints.remove(&id);
                removed.push(node.originator);
            }
        }
        if !removed.is_empty() {
            self.resolve_virtual_edges();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_ansn_is_rejected() {
        let mut db = TcDb::new();
        let now = Instant::now();
        let origin: IpAddr = "10.0.0.5".parse().unwrap();

        assert!(db.update_node(origin, 5, Vec::new(), Vec::new(), now, 60_000));
        assert!(!db.update_node(origin, 3, Vec::new(), Vec::new(), now, 60_000));

        let id = db.node_by_originator(&origin).unwrap();
        assert_eq!(db.node(id).unwrap().ansn, 5);
    }

    #[test]
    fn merge_fragment_accumulates_same_ansn() {
        let mut db = TcDb::new();
        let now = Instant::now();
        let origin: IpAddr = "10.0.0.5".parse().unwrap();
        let edge_a = TcEdge {
            domain: 0,
            to_originator: "10.0.0.6".parse().unwrap(),
            metric: 10,
            is_virtual: false,
        };
        let edge_b = TcEdge {
            domain: 0,
            to_originator: "10.0.0.7".parse().unwrap(),
            metric: 20,
            is_virtual: false,
        };

        assert!(db.merge_fragment(origin, 1, vec![edge_a], Vec::new(), now, 60_000));
        assert!(db.merge_fragment(origin, 1, vec![edge_b], Vec::new(), now, 60_000));

        let id = db.node_by_originator(&origin).unwrap();
        assert_eq!(db.edges(id).len(), 2);
    }

    #[test]
    fn expired_nodes_are_removed() {
        let mut db = TcDb::new();
        let now = Instant::now();
        let origin: IpAddr = "10.0.0.5".parse().unwrap();
        db.update_node(origin, 1, Vec::new(), Vec::new(), now, 1000);

        let removed = db.expire(now + Duration::from_millis(1001));
        assert_eq!(removed, vec![origin]);
        assert!(db.node_by_originator(&origin).is_none());
    }

    #[test]
    fn edge_is_virtual_until_the_reverse_edge_is_advertised() {
        let mut db = TcDb::new();
        let now = Instant::now();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        db.update_node(
            a,
            1,
            vec![TcEdge { domain: 0, to_originator: b, metric: 10, is_virtual: false }],
            Vec::new(),
            now,
            60_000,
        );
        let id_a = db.node_by_originator(&a).unwrap();
        assert!(db.edges(id_a)[0].is_virtual, "b hasn't advertised a -> b yet");

        db.update_node(
            b,
            1,
            vec![TcEdge { domain: 0, to_originator: a, metric: 10, is_virtual: false }],
            Vec::new(),
            now,
            60_000,
        );
        assert!(!db.edges(id_a)[0].is_virtual, "b now advertises the reverse edge");
        let id_b = db.node_by_originator(&b).unwrap();
        assert!(!db.edges(id_b)[0].is_virtual);
    }
}
