//! OLSRv2 (RFC 7181) on top of NHDP: the topology database fed by received
//! TC messages, the MPR-recompute trigger, Dijkstra routing with ordered
//! route diffing, and the TC message writer.

mod error;
mod mpr;
mod reader_tc;
mod router;
mod tc;
mod writer_tc;

pub use error::{Olsrv2Error, Olsrv2Result};
pub use mpr::MprDriver;
pub use reader_tc::ingest_tc_fragment;
pub use router::{compute_routes, diff_routes, RouteEntry, RouteOp};
pub use tc::{TcDb, TcEdge, TcEndpoint, TcNode, TcNodeId};
pub use writer_tc::{TcAttachedNetwork, TcContentProvider, TcNeighborAddr, TC_MSG_TYPE};
