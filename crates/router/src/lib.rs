//! Fronts a ledger cluster: writes go to the current leader, reads to any
//! reachable node.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cluster;
mod config;
mod error;
mod probe;
mod proxy;
mod router;
mod service;

pub use cluster::{Follower, setup_cluster};
pub use config::RouterConfig;
pub use error::{Error, Result};
pub use probe::{Probe, probe};
pub use proxy::forward;
pub use router::Router;
pub use service::{app, run_router};
