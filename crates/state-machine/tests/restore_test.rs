use bytes::Bytes;
use ledger_state_machine::{
    APPLIED_STATE_KEY, Command, Error, LedgerStateMachine, PaymentPayload, SnapshotPlaceholder,
    Transaction, TransactionType,
};
use ledger_store::Store;
use ledger_store_memory::MemoryStore;
use serde_json::{Value, json};

fn payment(order_id: &str) -> PaymentPayload {
    PaymentPayload {
        card_number: "4111111111111111".to_string(),
        expired_at: "12/30".to_string(),
        cvv: "123".to_string(),
        amount: 100.0,
        currency: "USD".to_string(),
        order_id: order_id.to_string(),
    }
}

async fn run(sm: &LedgerStateMachine<MemoryStore>, command: Command) {
    let result = sm.apply(&command.encode().unwrap()).await;
    assert_eq!(result.error, None, "{command:?}");
}

async fn contents(store: &MemoryStore) -> Vec<(String, Value)> {
    store
        .export()
        .await
        .unwrap()
        .into_iter()
        .map(|(k, v)| (k, serde_json::from_slice(&v).unwrap()))
        .collect()
}

#[tokio::test]
async fn test_snapshot_is_placeholder() {
    let sm = LedgerStateMachine::new(MemoryStore::new());
    run(&sm, Command::set("k", json!({"v": 1}))).await;

    assert_eq!(sm.snapshot(), SnapshotPlaceholder);
    assert!(sm.snapshot().into_bytes().is_empty());
}

#[tokio::test]
async fn test_capture_then_restore_is_key_equivalent() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let source = LedgerStateMachine::new(MemoryStore::new());
    let p = payment("o1");
    run(&source, Command::set(p.recurring_token(), p)).await;
    run(
        &source,
        Command::set_transactions("o1", Transaction::new("t1", TransactionType::First, 100.0, "USD")),
    )
    .await;
    run(
        &source,
        Command::set_transactions(
            "o1",
            Transaction::new("t2", TransactionType::Recurring, 50.0, "USD"),
        ),
    )
    .await;

    let captured = source.capture().await.unwrap();

    let replica = LedgerStateMachine::new(MemoryStore::new());
    let restored = replica.restore(captured.as_slice()).await.unwrap();

    // token, order ledger, two idempotency markers
    assert_eq!(restored, 4);
    assert_eq!(
        contents(replica.store()).await,
        contents(source.store()).await
    );
}

#[tokio::test]
async fn test_restored_ledger_appends_become_overwrites() {
    let sm = LedgerStateMachine::new(MemoryStore::new());

    let stream = [
        json!({"operation": "SET_TRANSACTIONS", "key": "o1",
               "value": {"id": "t1", "type": "first", "amount": 1.0, "currency": "USD"}}),
        json!({"operation": "SET_TRANSACTIONS", "key": "o1",
               "value": {"id": "t2", "type": "recurring", "amount": 2.0, "currency": "USD"}}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n");

    let restored = sm.restore(stream.as_bytes()).await.unwrap();
    assert_eq!(restored, 2);

    // The last record wins as a single object, not an appended list, and no
    // idempotency markers are written.
    let raw = sm.store().get("o1").await.unwrap().unwrap();
    let value: Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(
        value,
        json!({"id": "t2", "type": "recurring", "amount": 2.0, "currency": "USD"})
    );
    assert!(sm.transactions("o1").await.is_err());
    assert_eq!(sm.store().get("t1").await.unwrap(), None);
}

#[tokio::test]
async fn test_restore_merges_into_existing_state() {
    let sm = LedgerStateMachine::new(MemoryStore::new());
    run(&sm, Command::set("kept", json!("old"))).await;
    run(&sm, Command::set("replaced", json!("old"))).await;

    let stream = r#"{"operation":"SET","key":"replaced","value":"new"}"#;
    sm.restore(stream.as_bytes()).await.unwrap();

    assert_eq!(
        contents(sm.store()).await,
        vec![
            ("kept".to_string(), json!("old")),
            ("replaced".to_string(), json!("new")),
        ]
    );
}

#[tokio::test]
async fn test_restore_aborts_on_decode_error() {
    let sm = LedgerStateMachine::new(MemoryStore::new());

    let stream = concat!(
        r#"{"operation":"SET","key":"a","value":1}"#,
        "\n",
        r#"{"operation":"SET","key":"#,
    );

    let err = sm.restore(stream.as_bytes()).await.unwrap_err();

    assert!(matches!(err, Error::Decode(_)));
    // Records before the failure were already written.
    assert_eq!(
        sm.store().get("a").await.unwrap(),
        Some(Bytes::from_static(b"1"))
    );
}

#[tokio::test]
async fn test_restore_of_empty_stream_is_noop() {
    let sm = LedgerStateMachine::new(MemoryStore::new());
    assert_eq!(sm.restore(&b""[..]).await.unwrap(), 0);
    assert!(sm.store().keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_applied_state_never_travels_with_a_capture() {
    let source = LedgerStateMachine::new(MemoryStore::new());
    run(&source, Command::set("k", json!(1))).await;
    source
        .save_applied_state(Bytes::from_static(br#"{"from":"source"}"#))
        .await
        .unwrap();

    let captured = source.capture().await.unwrap();
    assert!(!String::from_utf8_lossy(&captured).contains(APPLIED_STATE_KEY));

    let target = LedgerStateMachine::new(MemoryStore::new());
    let forged = format!(
        "{}{{\"operation\":\"SET\",\"key\":\"{APPLIED_STATE_KEY}\",\"value\":{{\"from\":\"forged\"}}}}\n",
        String::from_utf8(captured).unwrap()
    );
    let restored = target.restore(forged.as_bytes()).await.unwrap();

    assert_eq!(restored, 1);
    assert_eq!(contents(target.store()).await, vec![("k".to_string(), json!(1))]);
    assert_eq!(target.load_applied_state().await.unwrap(), None);
}
