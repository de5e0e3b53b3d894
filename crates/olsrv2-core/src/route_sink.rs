use tracing::{debug, info, warn};

use olsrv2::RouteOp;

/// Where computed routes go. The daemon binary supplies a sink that talks
/// to the kernel routing table (netlink, `ip route`, ...); tests and the
/// introspection REPL can use `LoggingRouteSink` instead.
pub trait RouteSink {
    fn apply(&mut self, op: &RouteOp);
}

/// Default sink: just logs what would have been applied. Useful standalone
/// and as the fallback when no platform-specific sink is wired in.
#[derive(Default)]
pub struct LoggingRouteSink;

impl RouteSink for LoggingRouteSink {
    fn apply(&mut self, op: &RouteOp) {
        match op {
            RouteOp::Add(route) => info!(
                destination = %route.destination,
                next_hop = %route.next_hop,
                distance = route.distance,
                domain = route.domain,
                "route add"
            ),
            RouteOp::Update(route) => debug!(
                destination = %route.destination,
                next_hop = %route.next_hop,
                distance = route.distance,
                domain = route.domain,
                "route update"
            ),
            RouteOp::Remove { destination, domain } => warn!(%destination, domain, "route remove"),
        }
    }
}

/// Apply a full ordered batch of route operations (see `RouteOp`'s
/// branch-order contract) to `sink`.
pub fn apply_all(sink: &mut dyn RouteSink, ops: &[RouteOp]) {
    for op in ops {
        sink.apply(op);
    }
}
