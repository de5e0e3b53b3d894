//! NHDP (RFC 6130) link and neighbor management: the local interface table,
//! the link/neighbor state machine driven by received HELLOs, per-domain
//! metric/MPR plugin seams, and a typed event feed for downstream
//! consumers (MPR selection, TC generation, routing).

mod db;
mod domain;
mod error;
mod event;
mod hello;
mod iface;
mod link;
mod neighbor;

pub use db::NhdpDb;
pub use domain::{
    ConstantMetricHandler, Domain, DomainId, DomainRegistry, GreedyMprHandler, MetricHandler, MprCandidate,
    MprHandler, MprInput, MAX_DOMAINS, WILLINGNESS_ALWAYS, WILLINGNESS_DEFAULT, WILLINGNESS_NEVER,
};
pub use error::{NhdpError, NhdpResult};
pub use event::NhdpEvent;
pub use hello::{HelloAddr, HelloMessage, HELLO_MSG_TYPE};
pub use iface::{AddrState, IfaceId, Interface, InterfaceAddr};
pub use link::{Link, LinkId, LinkStatus};
pub use neighbor::{Neighbor, NeighborId};
