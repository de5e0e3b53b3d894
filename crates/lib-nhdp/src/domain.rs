use std::collections::HashSet;
use std::net::IpAddr;

/// Maximum number of concurrently registered routing topologies.
pub const MAX_DOMAINS: usize = 4;

pub type DomainId = u8;

pub const WILLINGNESS_NEVER: u8 = 0;
pub const WILLINGNESS_DEFAULT: u8 = 7;
pub const WILLINGNESS_ALWAYS: u8 = 15;

/// Per-link/neighbor cost plugin. The core only calls `initial_metric`; the
/// actual incoming-link-metric value that matters to routing is pushed in by
/// the caller through `NhdpDb::set_incoming_metric` (e.g. from an ETX/ETT
/// plugin living outside this crate) whenever it changes.
pub trait MetricHandler: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Metric assigned to a newly created link before any external
    /// measurement has arrived.
    fn initial_metric(&self) -> u32;
}

/// Default domain-0 metric handler: every link costs the same, i.e. routing
/// degenerates to hop count. Grounded on the constant-metric plugin, which
/// is the only metric plugin whose source was available to this rewrite.
#[derive(Debug, Default)]
pub struct ConstantMetricHandler {
    pub cost: u32,
}

impl MetricHandler for ConstantMetricHandler {
    fn name(&self) -> &str {
        "constant"
    }

    fn initial_metric(&self) -> u32 {
        self.cost.max(1)
    }
}

/// Minimal input an MPR handler needs about the one-hop/two-hop
/// neighborhood, decoupled from the concrete neighbor/link arena types so
/// the handler trait can live next to the domain registry.
pub struct MprInput<'a> {
    pub one_hop: &'a [MprCandidate],
}

#[derive(Clone, Debug)]
pub struct MprCandidate {
    pub neighbor_addr: IpAddr,
    pub willingness: u8,
    pub out_metric: u32,
    pub two_hop: HashSet<IpAddr>,
}

pub trait MprHandler: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Return the subset of one-hop neighbor addresses selected as MPR.
    /// Must be idempotent: calling it twice on unchanged input returns the
    /// same set.
    fn select_mpr(&mut self, input: &MprInput) -> HashSet<IpAddr>;
}

/// Default greedy MPR selector (RFC 7181 §18.4 "simple, greedy" heuristic):
/// repeatedly pick the willing one-hop neighbor covering the most
/// still-uncovered two-hop neighbors, breaking ties by lower outgoing
/// metric, then never-selected neighbors with willingness `ALWAYS` are
/// force-added.
#[derive(Debug, Default)]
pub struct GreedyMprHandler;

impl MprHandler for GreedyMprHandler {
    fn name(&self) -> &str {
        "greedy"
    }

    fn select_mpr(&mut self, input: &MprInput) -> HashSet<IpAddr> {
        let mut selected: HashSet<IpAddr> = HashSet::new();
        let mut covered: HashSet<IpAddr> = HashSet::new();

        let all_two_hop: HashSet<IpAddr> = input
            .one_hop
            .iter()
            .flat_map(|c| c.two_hop.iter().copied())
            .collect();

        for candidate in input.one_hop {
            if candidate.willingness == WILLINGNESS_ALWAYS {
                selected.insert(candidate.neighbor_addr);
                covered.extend(candidate.two_hop.iter().copied());
            }
        }

        loop {
            if covered.is_superset(&all_two_hop) {
                break;
            }

            let best = input
                .one_hop
                .iter()
                .filter(|c| c.willingness != WILLINGNESS_NEVER && !selected.contains(&c.neighbor_addr))
                .max_by(|a, b| {
                    let a_new = a.two_hop.difference(&covered).count();
                    let b_new = b.two_hop.difference(&covered).count();
                    a_new
                        .cmp(&b_new)
                        .then_with(|| b.out_metric.cmp(&a.out_metric))
                });

            match best {
                Some(candidate) if candidate.two_hop.difference(&covered).count() > 0 => {
                    selected.insert(candidate.neighbor_addr);
                    covered.extend(candidate.two_hop.iter().copied());
                }
                _ => break,
            }
        }

        selected
    }
}

/// One independent routing topology: a willingness, a metric handler, and an
/// MPR handler. Domain 0 always exists with the default handlers above.
#[derive(Debug)]
pub struct Domain {
    pub id: DomainId,
    pub willingness: u8,
    pub metric: Box<dyn MetricHandler>,
    pub mpr: Box<dyn MprHandler>,
}

impl Domain {
    pub fn default_for(id: DomainId) -> Self {
        Self {
            id,
            willingness: WILLINGNESS_DEFAULT,
            metric: Box::new(ConstantMetricHandler { cost: 100 }),
            mpr: Box::new(GreedyMprHandler),
        }
    }
}

/// Registry of active domains, keyed by extension byte. Domain 0 is seeded
/// at construction per spec.
#[derive(Debug)]
pub struct DomainRegistry {
    domains: Vec<Domain>,
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self {
            domains: vec![Domain::default_for(0)],
        }
    }
}

impl DomainRegistry {
    pub fn register(&mut self, domain: Domain) -> Result<(), &'static str> {
        if self.domains.len() >= MAX_DOMAINS {
            return Err("maximum number of domains reached");
        }
        if self.domains.iter().any(|d| d.id == domain.id) {
            return Err("domain already registered");
        }
        self.domains.push(domain);
        Ok(())
    }

    pub fn get(&self, id: DomainId) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: DomainId) -> Option<&mut Domain> {
        self.domains.iter_mut().find(|d| d.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.domains.iter().map(|d| d.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_zero_present_by_default() {
        let registry = DomainRegistry::default();
        assert!(registry.get(0).is_some());
    }

    #[test]
    fn greedy_mpr_covers_all_two_hop_neighbors() {
        let a: IpAddr = "10.0.0.2".parse().unwrap();
        let b: IpAddr = "10.0.0.3".parse().unwrap();
        let x: IpAddr = "10.0.1.1".parse().unwrap();
        let y: IpAddr = "10.0.1.2".parse().unwrap();

        let candidates = vec![
            MprCandidate {
                neighbor_addr: a,
                willingness: WILLINGNESS_DEFAULT,
                out_metric: 100,
                two_hop: [x].into_iter().collect(),
            },
            MprCandidate {
                neighbor_addr: b,
                willingness: WILLINGNESS_DEFAULT,
                out_metric: 100,
                two_hop: [x, y].into_iter().collect(),
            },
        ];

        let mut handler = GreedyMprHandler;
        let selected = handler.select_mpr(&MprInput { one_hop: &candidates });
        assert_eq!(selected, [b].into_iter().collect());
    }

    #[test]
    fn greedy_mpr_is_idempotent() {
        let a: IpAddr = "10.0.0.2".parse().unwrap();
        let candidates = vec![MprCandidate {
            neighbor_addr: a,
            willingness: WILLINGNESS_DEFAULT,
            out_metric: 100,
            two_hop: ["10.0.1.1".parse().unwrap()].into_iter().collect(),
        }];

        let mut handler = GreedyMprHandler;
        let first = handler.select_mpr(&MprInput { one_hop: &candidates });
        let second = handler.select_mpr(&MprInput { one_hop: &candidates });
        assert_eq!(first, second);
    }
}
