use bytes::Bytes;
use ledger_store::Store;
use serde_json::Value;
use tracing::{debug, warn};

use crate::command::{Command, Record};
use crate::records::Transaction;
use crate::result::{ApplyError, ApplyResult};

/// Store key the consensus layer keeps its applied position under.
///
/// Commands cannot address it and captures leave it out.
pub const APPLIED_STATE_KEY: &str = "__ledger_applied_state__";

/// Applies committed commands to a node-local store.
///
/// The consensus layer calls [`apply`](Self::apply) once per committed log
/// position, strictly sequentially. The ledger append reads, checks and writes
/// in separate store operations and relies on that serialisation.
#[derive(Clone, Debug)]
pub struct LedgerStateMachine<S: Store> {
    store: S,
}

impl<S: Store> LedgerStateMachine<S> {
    /// Wraps `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store, for local reads.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Decodes and applies one committed command payload.
    pub async fn apply(&self, payload: &[u8]) -> ApplyResult {
        match Command::decode(payload) {
            Ok(command) => self.apply_command(command).await,
            Err(error) => {
                warn!(%error, "rejecting committed payload");
                ApplyResult::err(error)
            }
        }
    }

    /// Applies an already decoded command.
    pub async fn apply_command(&self, command: Command) -> ApplyResult {
        debug!(operation = %command.operation(), key = command.key(), "applying command");

        if command.key() == APPLIED_STATE_KEY {
            warn!(key = APPLIED_STATE_KEY, "rejecting command on reserved key");
            return ApplyResult::err(ApplyError::ReservedKey {
                key: APPLIED_STATE_KEY.to_string(),
            });
        }

        let result = match command {
            Command::Set { key, value } => self.set(&key, &value).await,
            Command::Get { key } => self.get(&key).await,
            Command::Delete { key } => self.delete(&key).await,
            Command::SetTransactions { key, transaction } => {
                self.set_transactions(&key, &transaction).await
            }
        };

        if let Some(error) = &result.error {
            warn!(%error, "command failed");
        }

        result
    }

    pub(crate) async fn set(&self, key: &str, value: &Record) -> ApplyResult {
        if value.is_empty() {
            return ApplyResult::ok(None);
        }

        let encoded = match serde_json::to_vec(value) {
            Ok(encoded) => encoded,
            Err(e) => return ApplyResult::err(ApplyError::serialization(e)),
        };

        if let Err(e) = self.store.put(key, Bytes::from(encoded)).await {
            return ApplyResult::err(ApplyError::storage(e));
        }

        ApplyResult::ok(serde_json::to_value(value).ok())
    }

    async fn get(&self, key: &str) -> ApplyResult {
        match self.read_json::<Value>(key).await {
            Ok(value) => ApplyResult::ok(Some(value)),
            Err(error) => ApplyResult {
                error: Some(error),
                data: Some(Value::Object(serde_json::Map::new())),
            },
        }
    }

    async fn delete(&self, key: &str) -> ApplyResult {
        match self.store.del(key).await {
            Ok(()) => ApplyResult::ok(None),
            Err(e) => ApplyResult::err(ApplyError::storage(e)),
        }
    }

    async fn set_transactions(&self, key: &str, transaction: &Transaction) -> ApplyResult {
        match self.append_transaction(key, transaction).await {
            Ok(()) => ApplyResult::ok(serde_json::to_value(transaction).ok()),
            Err(error) => ApplyResult::err(error),
        }
    }

    async fn append_transaction(
        &self,
        key: &str,
        transaction: &Transaction,
    ) -> Result<(), ApplyError> {
        let marker = self
            .store
            .get(transaction.id.as_str())
            .await
            .map_err(ApplyError::storage)?;

        if marker.is_some() {
            debug!(order_id = key, transaction_id = %transaction.id, "transaction already applied");
            return Ok(());
        }

        let encoded = serde_json::to_vec(transaction).map_err(ApplyError::serialization)?;
        self.store
            .put(transaction.id.as_str(), Bytes::from(encoded))
            .await
            .map_err(ApplyError::storage)?;

        let mut ledger = match self.store.get(key).await.map_err(ApplyError::storage)? {
            Some(bytes) => {
                serde_json::from_slice::<Vec<Transaction>>(&bytes).map_err(ApplyError::decode)?
            }
            None => Vec::with_capacity(1),
        };
        ledger.push(transaction.clone());

        let encoded = serde_json::to_vec(&ledger).map_err(ApplyError::serialization)?;
        self.store
            .put(key, Bytes::from(encoded))
            .await
            .map_err(ApplyError::storage)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, ApplyError> {
        let bytes = self
            .store
            .get(key)
            .await
            .map_err(ApplyError::storage)?
            .ok_or_else(|| ApplyError::not_found(key))?;

        serde_json::from_slice(&bytes).map_err(ApplyError::decode)
    }

    /// Reads the bookkeeping record saved by the consensus layer.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn load_applied_state(&self) -> Result<Option<Bytes>, ApplyError> {
        self.store
            .get(APPLIED_STATE_KEY)
            .await
            .map_err(ApplyError::storage)
    }

    /// Replaces the consensus bookkeeping record.
    ///
    /// # Errors
    ///
    /// Propagates store write failures.
    pub async fn save_applied_state(&self, state: Bytes) -> Result<(), ApplyError> {
        self.store
            .put(APPLIED_STATE_KEY, state)
            .await
            .map_err(ApplyError::storage)
    }

    /// Reads an order ledger from the local store.
    ///
    /// # Errors
    ///
    /// [`ApplyError::NotFound`] if the order has no transactions.
    pub async fn transactions(&self, order_id: &str) -> Result<Vec<Transaction>, ApplyError> {
        self.read_json(order_id).await
    }

    /// Whether `key` exists in the local store.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn contains(&self, key: &str) -> Result<bool, ApplyError> {
        Ok(self
            .store
            .get(key)
            .await
            .map_err(ApplyError::storage)?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use ledger_store_memory::MemoryStore;
    use serde_json::json;

    use super::*;
    use crate::records::{PaymentPayload, TransactionType};

    fn machine() -> LedgerStateMachine<MemoryStore> {
        LedgerStateMachine::new(MemoryStore::new())
    }

    fn trx(id: &str, amount: f64) -> Transaction {
        Transaction::new(id, TransactionType::First, amount, "USD")
    }

    async fn apply(sm: &LedgerStateMachine<MemoryStore>, command: &Command) -> ApplyResult {
        sm.apply(&command.encode().unwrap()).await
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let sm = machine();
        let payment = PaymentPayload {
            card_number: "4111".to_string(),
            expired_at: "12/30".to_string(),
            cvv: "123".to_string(),
            amount: 100.0,
            currency: "USD".to_string(),
            order_id: "o1".to_string(),
        };

        let set = apply(&sm, &Command::set("token", payment.clone())).await;
        assert!(!set.is_err());

        let got = apply(&sm, &Command::get("token")).await;
        assert_eq!(got.error, None);
        assert_eq!(got.data, Some(serde_json::to_value(&payment).unwrap()));
    }

    #[tokio::test]
    async fn test_get_missing_returns_sentinel_and_not_found() {
        let sm = machine();

        let got = apply(&sm, &Command::get("missing")).await;

        assert_eq!(got.error, Some(ApplyError::not_found("missing")));
        assert_eq!(got.data, Some(json!({})));
        assert!(sm.store().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_null_is_noop() {
        let sm = machine();

        let result = apply(&sm, &Command::set("k", Value::Null)).await;

        assert_eq!(result, ApplyResult::ok(None));
        assert_eq!(sm.store().get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_absent_key_succeeds() {
        let sm = machine();
        assert_eq!(
            apply(&sm, &Command::delete("nothing")).await,
            ApplyResult::ok(None)
        );
    }

    #[tokio::test]
    async fn test_delete_removes_key() {
        let sm = machine();
        apply(&sm, &Command::set("k", json!({"v": 1}))).await;

        apply(&sm, &Command::delete("k")).await;

        assert!(!sm.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_operation_does_not_mutate() {
        let sm = machine();

        let result = sm
            .apply(br#"{"operation":"PUT","key":"k","value":{"a":1}}"#)
            .await;

        assert!(matches!(
            result.error,
            Some(ApplyError::UnknownOperation { .. })
        ));
        assert!(sm.store().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_rejected() {
        let sm = machine();
        let result = sm.apply(b"not json").await;
        assert!(matches!(result.error, Some(ApplyError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_ledger_append_writes_marker_and_list() {
        let sm = machine();

        apply(&sm, &Command::set_transactions("o1", trx("t1", 1.0))).await;
        apply(&sm, &Command::set_transactions("o1", trx("t2", 2.0))).await;

        assert_eq!(
            sm.transactions("o1").await.unwrap(),
            vec![trx("t1", 1.0), trx("t2", 2.0)]
        );

        let marker = sm.store().get("t1").await.unwrap().unwrap();
        let marker: Transaction = serde_json::from_slice(&marker).unwrap();
        assert_eq!(marker, trx("t1", 1.0));
    }

    #[tokio::test]
    async fn test_ledger_append_is_idempotent_in_first_seen_order() {
        let sm = machine();
        let ids = ["a", "b", "a", "c", "b", "a", "d"];

        for (i, id) in ids.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let result = apply(&sm, &Command::set_transactions("o1", trx(id, i as f64))).await;
            assert_eq!(result.error, None);
        }

        let ledger: Vec<String> = sm
            .transactions("o1")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ledger, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_replay_of_same_append_is_noop() {
        let sm = machine();
        let command = Command::set_transactions("o1", trx("t1", 5.0));

        let first = apply(&sm, &command).await;
        let replay = apply(&sm, &command).await;

        assert_eq!(first, replay);
        assert_eq!(sm.transactions("o1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_ledger_aborts_append() {
        let sm = machine();
        apply(&sm, &Command::set("o1", json!({"not": "a list"}))).await;

        let result = apply(&sm, &Command::set_transactions("o1", trx("t1", 1.0))).await;

        assert!(matches!(result.error, Some(ApplyError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_commands_cannot_touch_applied_state() {
        let sm = machine();
        sm.save_applied_state(Bytes::from_static(b"{}")).await.unwrap();

        for command in [
            Command::set(APPLIED_STATE_KEY, json!({"clobbered": true})),
            Command::delete(APPLIED_STATE_KEY),
            Command::set_transactions(APPLIED_STATE_KEY, trx("t1", 1.0)),
        ] {
            let result = apply(&sm, &command).await;
            assert!(matches!(result.error, Some(ApplyError::ReservedKey { .. })));
        }

        assert_eq!(
            sm.load_applied_state().await.unwrap().as_deref(),
            Some(&b"{}"[..])
        );
        assert!(!sm.contains("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_transactions_for_unknown_order_is_not_found() {
        let sm = machine();
        let err = sm.transactions("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "key nope does not exists");
    }
}
