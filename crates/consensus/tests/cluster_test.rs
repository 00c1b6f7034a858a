//! Raft engine tests over the real HTTP transport.

use std::time::Duration;

use ledger_consensus::storage::{MemLogStore, RocksLogStore};
use ledger_consensus::{
    ConsensusConfig, ConsensusEngine, Error, MembershipManager, RaftEngine, RaftRole, Suffrage,
};
use ledger_state_machine::{Command, LedgerStateMachine, Transaction, TransactionType};
use ledger_store::Store;
use ledger_store_memory::MemoryStore;
use openraft::storage::RaftLogStorage;
use tokio::net::TcpListener;
use tracing_test::traced_test;

const APPLY_TIMEOUT: Duration = Duration::from_secs(3);

fn fast_config() -> ConsensusConfig {
    ConsensusConfig {
        heartbeat_interval: 100,
        election_timeout_min: 300,
        election_timeout_max: 600,
        ..Default::default()
    }
}

/// Starts a node serving raft RPCs on an ephemeral port.
async fn start_node<L>(id: &str, log_store: L) -> (RaftEngine<MemoryStore>, String)
where
    L: RaftLogStorage<ledger_consensus::TypeConfig>,
{
    start_node_on(id, log_store, MemoryStore::new()).await
}

async fn start_node_on<L>(
    id: &str,
    log_store: L,
    store: MemoryStore,
) -> (RaftEngine<MemoryStore>, String)
where
    L: RaftLogStorage<ledger_consensus::TypeConfig>,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let engine = RaftEngine::new(
        id.to_string(),
        &fast_config(),
        log_store,
        LedgerStateMachine::new(store),
    )
    .await
    .unwrap();

    let app = engine.rpc_router();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    (engine, address)
}

async fn wait_for_key(engine: &RaftEngine<MemoryStore>, key: &str) {
    for _ in 0..100 {
        if engine.ledger().contains(key).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("key {key} never replicated to {}", engine.id());
}

#[tokio::test]
#[traced_test]
async fn test_single_node_bootstrap_and_apply() {
    let (engine, address) = start_node("n1", MemLogStore::new()).await;

    engine.bootstrap(address.clone()).await.unwrap();
    let leader = engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();
    assert_eq!(leader, "n1");
    assert_eq!(engine.state(), RaftRole::Leader);

    let set = Command::set("k", serde_json::json!({"a": 1})).encode().unwrap();
    let result = engine.apply(set, APPLY_TIMEOUT).await.unwrap();
    assert!(!result.is_err());

    let get = Command::get("k").encode().unwrap();
    let result = engine.apply(get, APPLY_TIMEOUT).await.unwrap();
    assert_eq!(result.data, Some(serde_json::json!({"a": 1})));

    let configuration = engine.configuration().await.unwrap();
    assert!(configuration.index > 0);
    assert_eq!(configuration.servers.len(), 1);
    assert_eq!(configuration.servers[0].address, address);
    assert_eq!(configuration.servers[0].suffrage, Suffrage::Voter);

    let stats = engine.stats();
    assert_eq!(stats["state"], "Leader");
    assert_eq!(stats["leader_id"], "n1");
    assert_eq!(stats["num_peers"], "0");
    assert_eq!(stats["id"], "n1");

    // Bootstrapping twice is harmless.
    engine.bootstrap(address).await.unwrap();

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_apply_results_carry_state_machine_errors() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (engine, address) = start_node("n1", MemLogStore::new()).await;
    engine.bootstrap(address).await.unwrap();
    engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();

    let get = Command::get("missing").encode().unwrap();
    let result = engine.apply(get, APPLY_TIMEOUT).await.unwrap();
    assert!(result.error.unwrap().is_not_found());

    let garbage = bytes::Bytes::from_static(b"not a command");
    let result = engine.apply(garbage, APPLY_TIMEOUT).await.unwrap();
    assert!(result.is_err());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fenced_membership_change_rejects_stale_index() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (engine, address) = start_node("n1", MemLogStore::new()).await;
    engine.bootstrap(address).await.unwrap();
    engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();

    let index = engine.configuration().await.unwrap().index;
    let err = engine
        .add_voter(
            "n2".to_string(),
            "127.0.0.1:1".to_string(),
            index + 10,
            APPLY_TIMEOUT,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ConfigurationChanged { expected, actual } if expected == index + 10 && actual == index
    ));

    // Unknown servers are a no-op.
    engine
        .remove_server("ghost".to_string(), 0, APPLY_TIMEOUT)
        .await
        .unwrap();

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_joined_voter_replicates_ledger() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (leader, leader_address) = start_node("n1", MemLogStore::new()).await;
    let (follower, follower_address) = start_node("n2", MemLogStore::new()).await;

    leader.bootstrap(leader_address).await.unwrap();
    leader.wait_for_leader(Duration::from_secs(5)).await.unwrap();

    let response = MembershipManager::new(leader.clone(), APPLY_TIMEOUT)
        .join("n2".to_string(), follower_address.clone())
        .await
        .unwrap();
    assert_eq!(
        response.message,
        format!("node n2 at {follower_address} joined successfully")
    );
    assert_eq!(response.data["num_peers"], "1");

    let transaction = Transaction::new("tx-1", TransactionType::First, 100.0, "USD");
    let command = Command::set_transactions("o1", transaction.clone())
        .encode()
        .unwrap();
    leader.apply(command, APPLY_TIMEOUT).await.unwrap();

    wait_for_key(&follower, "o1").await;
    assert_eq!(
        follower.ledger().transactions("o1").await.unwrap(),
        vec![transaction]
    );
    assert_eq!(follower.state(), RaftRole::Follower);

    let set = Command::set("k", serde_json::json!(1)).encode().unwrap();
    let err = follower.apply(set, APPLY_TIMEOUT).await.unwrap_err();
    assert!(matches!(err, Error::NotLeader { leader: Some(ref id) } if id == "n1"));

    let response = MembershipManager::new(leader.clone(), APPLY_TIMEOUT)
        .remove("n2".to_string())
        .await
        .unwrap();
    assert_eq!(response.message, "node n2 removed successfully");
    assert!(
        leader
            .configuration()
            .await
            .unwrap()
            .server("n2")
            .is_none()
    );

    follower.shutdown().await.unwrap();
    leader.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rocks_log_replays_after_restart() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();

    {
        let log = RocksLogStore::open(dir.path()).unwrap();
        let (engine, address) = start_node("n1", log).await;
        engine.bootstrap(address).await.unwrap();
        engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();

        let set = Command::set("persisted", serde_json::json!("yes"))
            .encode()
            .unwrap();
        engine.apply(set, APPLY_TIMEOUT).await.unwrap();
        engine.shutdown().await.unwrap();
    }

    // The ledger store is fresh; the key can only come back from the raft log.
    let log = RocksLogStore::open(dir.path()).unwrap();
    let (engine, _address) = start_node("n1", log).await;
    engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();

    wait_for_key(&engine, "persisted").await;
    let value = engine.ledger().store().get("persisted").await.unwrap();
    assert_eq!(value.as_deref(), Some(&b"\"yes\""[..]));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_keeps_ledger_after_delete() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let first = Transaction::new("tx-1", TransactionType::First, 1.0, "USD");
    let second = Transaction::new("tx-2", TransactionType::Recurring, 2.0, "USD");

    {
        let log = RocksLogStore::open(dir.path()).unwrap();
        let (engine, address) = start_node_on("n1", log, store.clone()).await;
        engine.bootstrap(address).await.unwrap();
        engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();

        for command in [
            Command::set_transactions("o1", first),
            Command::delete("o1"),
            Command::set_transactions("o1", second.clone()),
        ] {
            let result = engine
                .apply(command.encode().unwrap(), APPLY_TIMEOUT)
                .await
                .unwrap();
            assert_eq!(result.error, None);
        }
        engine.shutdown().await.unwrap();
    }

    let log = RocksLogStore::open(dir.path()).unwrap();
    let (engine, _address) = start_node_on("n1", log, store).await;
    engine.wait_for_leader(Duration::from_secs(5)).await.unwrap();

    // A fresh write commits behind everything the log still holds.
    let marker = Command::set("after-restart", serde_json::json!(true))
        .encode()
        .unwrap();
    engine.apply(marker, APPLY_TIMEOUT).await.unwrap();

    assert_eq!(
        engine.ledger().transactions("o1").await.unwrap(),
        vec![second]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_join_of_unreachable_node_times_out_and_rolls_back() {
    let (leader, leader_address) = start_node("n1", MemLogStore::new()).await;
    leader.bootstrap(leader_address).await.unwrap();
    leader.wait_for_leader(Duration::from_secs(5)).await.unwrap();

    let timeout = Duration::from_millis(500);
    let started = tokio::time::Instant::now();
    let err = MembershipManager::new(leader.clone(), timeout)
        .join("n2".to_string(), "127.0.0.1:1".to_string())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(err.to_string(), "error add voter: timed out after 500ms");

    let configuration = leader.configuration().await.unwrap();
    assert!(configuration.server("n2").is_none());
    assert_eq!(configuration.servers.len(), 1);
    assert!(logs_contain("discarded learner of failed join"));

    leader.shutdown().await.unwrap();
}
