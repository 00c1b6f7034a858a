use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;

/// A node to join to the leader.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Follower {
    /// Raft node id.
    #[serde(rename = "node_id")]
    pub name: String,

    /// Raft address the leader replicates to.
    pub raft_address: String,
}

impl Follower {
    /// Creates a follower entry.
    pub fn new(name: impl Into<String>, raft_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raft_address: raft_address.into(),
        }
    }
}

impl FromStr for Follower {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, address)) if !name.is_empty() && !address.is_empty() => {
                Ok(Self::new(name, address))
            }
            _ => Err(Error::InvalidFollower(s.to_string())),
        }
    }
}

impl fmt::Display for Follower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.raft_address)
    }
}

/// Joins each follower to `leader` in order, pausing `delay` before each
/// request. A request that fails or outlives `timeout` is logged and the
/// remaining followers are still tried.
///
/// Returns how many joins the leader accepted.
pub async fn setup_cluster(
    client: &Client,
    leader: &str,
    followers: &[Follower],
    delay: Duration,
    timeout: Duration,
) -> usize {
    let url = format!("{leader}/raft/join");
    let mut joined = 0;

    for follower in followers {
        tokio::time::sleep(delay).await;

        let request = client.post(&url).timeout(timeout).json(follower);
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%follower, "join request failed: {e}");
                continue;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!(%follower, "{body}");
            joined += 1;
        } else {
            warn!(%follower, %status, "join rejected: {body}");
        }
    }

    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_follower() {
        let follower: Follower = "node2=localhost:1112".parse().unwrap();
        assert_eq!(follower, Follower::new("node2", "localhost:1112"));
        assert_eq!(follower.to_string(), "node2=localhost:1112");

        assert!("node2".parse::<Follower>().is_err());
        assert!("=localhost:1112".parse::<Follower>().is_err());
        assert!("node2=".parse::<Follower>().is_err());
    }

    #[test]
    fn test_join_body_shape() {
        let body = serde_json::to_value(Follower::new("node3", "localhost:1113")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"node_id": "node3", "raft_address": "localhost:1113"})
        );
    }
}
