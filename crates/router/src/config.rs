use std::net::SocketAddr;
use std::time::Duration;

use crate::cluster::Follower;

/// Router configuration.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Node base URLs, probed in this order.
    pub backends: Vec<String>,

    /// Address the router listens on.
    pub listen_addr: SocketAddr,

    /// Upper bound for a single `/raft/stats` probe.
    pub probe_timeout: Duration,

    /// Base URL of the node that receives join requests on start.
    pub leader: String,

    /// Nodes joined to the leader on start, in order. Empty skips setup.
    pub followers: Vec<Follower>,

    /// Pause before each join request.
    pub join_delay: Duration,

    /// Upper bound for a single join request.
    pub join_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                "http://localhost:2221".to_string(),
                "http://localhost:2222".to_string(),
                "http://localhost:2223".to_string(),
            ],
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            probe_timeout: Duration::from_secs(1),
            leader: "http://localhost:2221".to_string(),
            followers: vec![
                Follower::new("node2", "localhost:1112"),
                Follower::new("node3", "localhost:1113"),
            ],
            join_delay: Duration::from_secs(2),
            join_timeout: Duration::from_secs(15),
        }
    }
}
