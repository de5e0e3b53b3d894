//! Top-level OLSRv2 daemon core: wires NHDP, the TC topology database, the
//! duplicate set, and MPR recomputation into one facade driven by a
//! caller-owned event loop.

mod core;
mod dup_set;
mod error;
mod route_sink;

pub use crate::core::{OlsrCore, OlsrCoreBuilder, OlsrCoreConfig, TargetKind};
pub use dup_set::DupSet;
pub use error::{CoreError, CoreResult};
pub use route_sink::{apply_all, LoggingRouteSink, RouteSink};

pub use nhdp;
pub use olsrv2;
pub use rfc5444;
