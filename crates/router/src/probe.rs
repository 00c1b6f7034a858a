use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// What a candidate reported about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// No answer, or a non-200 answer.
    Unreachable,

    /// Answered, but is not the leader.
    Follower,

    /// Answered and reports itself as leader.
    Leader,
}

impl Probe {
    /// Whether the candidate answered at all.
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::Unreachable)
    }
}

#[derive(Deserialize)]
struct StatsState {
    state: String,
}

/// Asks `candidate` for its raft stats.
pub async fn probe(client: &Client, candidate: &str, timeout: Duration) -> Probe {
    let response = match client
        .get(format!("{candidate}/raft/stats"))
        .timeout(timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            debug!(candidate, "probe failed: {e}");
            return Probe::Unreachable;
        }
    };

    if response.status() != StatusCode::OK {
        debug!(candidate, status = %response.status(), "probe rejected");
        return Probe::Unreachable;
    }

    match response.json::<StatsState>().await {
        Ok(stats) if stats.state == "Leader" => Probe::Leader,
        Ok(_) => Probe::Follower,
        Err(e) => {
            debug!(candidate, "undecodable stats: {e}");
            Probe::Follower
        }
    }
}
