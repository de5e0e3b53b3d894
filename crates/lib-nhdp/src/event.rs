use std::net::IpAddr;

use crate::link::LinkId;
use crate::neighbor::NeighborId;

/// Notifications emitted by `NhdpDb` as link/neighbor state changes.
/// Consumers (the MPR driver, the TC writer, route recomputation) subscribe
/// by draining `NhdpDb::drain_events` instead of registering callbacks, so
/// state mutation never re-enters the database mid-update.
#[derive(Debug, Clone)]
pub enum NhdpEvent {
    LinkUp { link: LinkId, neighbor: NeighborId },
    LinkDown { link: LinkId, neighbor: NeighborId },
    NeighborSymmetric { neighbor: NeighborId },
    NeighborLost { neighbor: NeighborId },
    TwoHopSetChanged { neighbor: NeighborId },
    OriginatorChanged { neighbor: NeighborId, originator: Option<IpAddr> },
}
