//! Payment, recurring charge and order status handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use ledger_consensus::ConsensusEngine;
use ledger_state_machine::{Command, PaymentPayload, Transaction, TransactionType};
use ledger_store::Store;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::ApiError;
use crate::state::AppState;

/// `POST /api/pay` body. Missing fields default to empty values.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PayRequest {
    card_number: String,
    expired_at: String,
    cvv: String,
    amount: f64,
    currency: String,
    order_id: String,
}

impl From<PayRequest> for PaymentPayload {
    fn from(request: PayRequest) -> Self {
        Self {
            card_number: request.card_number,
            expired_at: request.expired_at,
            cvv: request.cvv,
            amount: request.amount,
            currency: request.currency,
            order_id: request.order_id,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct PayResponse {
    token: String,
    addr: String,
}

/// `POST /api/recurring` body.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RecurringRequest {
    token: String,
    amount: f64,
    currency: String,
    order_id: String,
}

#[derive(Serialize)]
pub(crate) struct RecurringResponse {
    addr: String,
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    order_id: String,
    transactions: Vec<Transaction>,
}

fn new_transaction(kind: TransactionType, amount: f64, currency: String) -> Transaction {
    Transaction::new(Uuid::new_v4().to_string(), kind, amount, currency)
}

/// Records a first payment and issues its recurring token.
pub(crate) async fn pay<E, S>(
    State(state): State<AppState<E, S>>,
    payload: Result<Json<PayRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PayResponse>), ApiError>
where
    E: ConsensusEngine,
    S: Store,
{
    let Json(request) = payload?;
    state.ensure_leader()?;

    let payment = PaymentPayload::from(request);
    let token = payment.recurring_token();
    let order_id = payment.order_id.clone();
    let transaction =
        new_transaction(TransactionType::First, payment.amount, payment.currency.clone());

    state.commit(Command::set(token.clone(), payment)).await?;
    state
        .commit(Command::set_transactions(order_id.clone(), transaction))
        .await?;

    info!(%order_id, "payment recorded");
    Ok((
        StatusCode::CREATED,
        Json(PayResponse {
            token,
            addr: state.addr.to_string(),
        }),
    ))
}

/// Records a recurring charge against an existing token.
///
/// The token is checked against the local store only.
pub(crate) async fn recurring<E, S>(
    State(state): State<AppState<E, S>>,
    payload: Result<Json<RecurringRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecurringResponse>), ApiError>
where
    E: ConsensusEngine,
    S: Store,
{
    let Json(request) = payload?;
    state.ensure_leader()?;

    let known = state.ledger.contains(&request.token).await.map_err(|e| {
        ApiError::new(format!(
            "error getting key {} from storage: {e}",
            request.token
        ))
    })?;
    if !known {
        return Err(ApiError::new(format!(
            "key {} does not exists",
            request.token
        )));
    }

    let transaction = new_transaction(TransactionType::Recurring, request.amount, request.currency);
    state
        .commit(Command::set_transactions(request.order_id.clone(), transaction))
        .await?;

    info!(order_id = %request.order_id, "recurring charge recorded");
    Ok((
        StatusCode::CREATED,
        Json(RecurringResponse {
            addr: state.addr.to_string(),
        }),
    ))
}

/// Returns an order's ledger from the local store.
pub(crate) async fn status<E, S>(
    State(state): State<AppState<E, S>>,
    Path(order_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError>
where
    E: ConsensusEngine,
    S: Store,
{
    let transactions = state.ledger.transactions(&order_id).await.map_err(|e| {
        if e.is_not_found() {
            ApiError::new(e.to_string())
        } else {
            ApiError::new(format!("error getting key {order_id} from storage: {e}"))
        }
    })?;

    Ok(Json(StatusResponse {
        order_id,
        transactions,
    }))
}
