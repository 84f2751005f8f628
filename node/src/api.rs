//! # REST API
//!
//! Builds the axum router that exposes the ledger service's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/status`                     | Service status summary             |
//! | POST   | `/wallets`                    | Get-or-create a wallet             |
//! | GET    | `/wallets/:owner`             | List an owner's wallets            |
//! | POST   | `/transactions`               | Submit a transaction               |
//! | GET    | `/transactions/:id`           | Transaction by id                  |
//! | GET    | `/owners/:owner/transactions` | An owner's transaction history     |
//! | POST   | `/transactions/:id/settle`    | Settlement confirmer callback      |
//! | POST   | `/transactions/:id/cancel`    | Cooperative cancellation           |
//! | PUT    | `/verification/:user/flags`   | Verification workflow flag update  |
//! | GET    | `/verification/:user`         | Verification status read           |
//! | GET    | `/metrics`                    | Prometheus text exposition         |
//!
//! The callers are the platform's collaborators: the presentation layer
//! (reads), the verification workflow (flag writes), and the settlement
//! confirmer (settle calls). Authentication happens upstream; this service
//! trusts the `owner` and `role` fields the session layer supplies.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vela_ledger::engine::{
    EngineError, LedgerEngine, SettlementOutcome, SubmitRequest, Transaction, TransactionId,
    TransactionKind,
};
use vela_ledger::money::{Amount, Currency};
use vela_ledger::verification::{Role, VerificationFlag, VerificationRecord};
use vela_ledger::wallet::{Wallet, WalletId, WalletType};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The service's reported version string.
    pub version: String,
    /// The ledger engine.
    pub engine: Arc<LedgerEngine>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// When the service started, for uptime reporting.
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/wallets", post(create_wallet_handler))
        .route("/wallets/:owner", get(list_wallets_handler))
        .route("/transactions", post(submit_transaction_handler))
        .route("/transactions/:id", get(get_transaction_handler))
        .route("/owners/:owner/transactions", get(list_transactions_handler))
        .route("/transactions/:id/settle", post(settle_transaction_handler))
        .route("/transactions/:id/cancel", post(cancel_transaction_handler))
        .route("/verification/:user/flags", put(set_verification_flag_handler))
        .route("/verification/:user", get(get_verification_handler))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body for `POST /wallets`.
#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    /// The owning user.
    pub owner: String,
    /// Wallet type: `primary`, `savings`, `crypto`, or `investment`.
    pub wallet_type: String,
    /// Currency code for first creation, e.g. `USD`.
    pub currency: String,
}

/// Body for `POST /transactions`.
#[derive(Debug, Deserialize)]
pub struct SubmitTransactionRequest {
    /// The submitting user (from the session layer).
    pub owner: String,
    /// The session role: `consumer`, `merchant`, or `agent`.
    pub role: String,
    /// Transaction kind: `send`, `receive`, `topup`, `withdraw`, `payment`.
    pub kind: String,
    /// Decimal amount string, e.g. `"100.00"`.
    pub amount: String,
    /// Currency code, e.g. `USD`.
    pub currency: String,
    /// Source wallet id, for kinds that debit one.
    pub from_wallet: Option<String>,
    /// Destination wallet id, for kinds that credit one.
    pub to_wallet: Option<String>,
    /// Free-text statement line.
    #[serde(default)]
    pub description: String,
    /// Caller-supplied idempotency key. Optional but recommended.
    pub idempotency_key: Option<String>,
}

/// Body for `POST /transactions/:id/settle`.
#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    /// The confirmer's verdict: `commit` or `fail`.
    pub outcome: SettlementOutcome,
}

/// Body for `PUT /verification/:user/flags`.
///
/// `flag` is one of `phone`, `documents`, `biometric` — or `rejected`,
/// which applies (value `true`) or clears (value `false`) the compliance
/// rejection override.
#[derive(Debug, Deserialize)]
pub struct SetFlagRequest {
    /// Which flag to change.
    pub flag: String,
    /// The new value.
    pub value: bool,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Service software version.
    pub version: String,
    /// Seconds since the service started.
    pub uptime_seconds: i64,
    /// Number of wallets in the registry.
    pub wallet_count: usize,
    /// Total transactions admitted.
    pub transaction_count: usize,
    /// Transactions currently pending settlement.
    pub pending_transactions: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Wallet representation returned by the API. Balances are decimal strings
/// in the wallet's currency — minor units never cross the API boundary.
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponse {
    /// Wallet id.
    pub id: String,
    /// Owning user.
    pub owner: String,
    /// Wallet type.
    pub wallet_type: String,
    /// Currency code.
    pub currency: String,
    /// Settled balance as a decimal string.
    pub balance: String,
    /// Sum of open holds as a decimal string.
    pub pending_balance: String,
    /// Spendable funds (`balance - pending_balance`) as a decimal string.
    pub available: String,
    /// Whether the wallet is active.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletResponse {
    fn from(w: &Wallet) -> Self {
        let decimal = |minor: u64| Amount::from_minor(minor, w.currency).to_decimal_string();
        Self {
            id: w.id.to_string(),
            owner: w.owner.clone(),
            wallet_type: w.wallet_type.to_string(),
            currency: w.currency.to_string(),
            balance: decimal(w.balance),
            pending_balance: decimal(w.pending_balance),
            available: decimal(w.available()),
            active: w.active,
            created_at: w.created_at,
        }
    }
}

/// Transaction representation returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Transaction id.
    pub id: String,
    /// Submitting user.
    pub owner: String,
    /// Transaction kind.
    pub kind: String,
    /// Lifecycle status.
    pub status: String,
    /// Decimal amount string.
    pub amount: String,
    /// Currency code.
    pub currency: String,
    /// Source wallet id, if any.
    pub from_wallet: Option<String>,
    /// Destination wallet id, if any.
    pub to_wallet: Option<String>,
    /// Statement line.
    pub description: String,
    /// Caller-supplied idempotency key, if any.
    pub idempotency_key: Option<String>,
    /// Admission timestamp.
    pub created_at: DateTime<Utc>,
    /// Terminal-state timestamp, if reached.
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            owner: tx.owner.clone(),
            kind: tx.kind.to_string(),
            status: tx.status.to_string(),
            amount: tx.amount.to_decimal_string(),
            currency: tx.amount.currency().to_string(),
            from_wallet: tx.from_wallet.map(|id| id.to_string()),
            to_wallet: tx.to_wallet.map(|id| id.to_string()),
            description: tx.description.clone(),
            idempotency_key: tx.idempotency_key.clone(),
            created_at: tx.created_at,
            settled_at: tx.settled_at,
        }
    }
}

/// Verification state returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationResponse {
    /// The user.
    pub user_id: String,
    /// Phone step completed.
    pub phone_verified: bool,
    /// Documents step completed.
    pub documents_verified: bool,
    /// Biometric step completed.
    pub biometric_verified: bool,
    /// Derived aggregate status.
    pub kyc_status: String,
    /// Steps still outstanding, in presentation order.
    pub missing_steps: Vec<String>,
}

impl From<&VerificationRecord> for VerificationResponse {
    fn from(r: &VerificationRecord) -> Self {
        Self {
            user_id: r.user_id.clone(),
            phone_verified: r.phone_verified,
            documents_verified: r.documents_verified,
            biometric_verified: r.biometric_verified,
            kyc_status: r.kyc_status.to_string(),
            missing_steps: r.missing_steps().iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Generic error body returned by all endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps an engine error to its HTTP status and JSON body.
fn engine_error(err: EngineError) -> Response {
    let status = match &err {
        EngineError::InvalidRequest(_) | EngineError::InvalidCurrency(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::NotVerified { .. } | EngineError::RoleDenied { .. } => StatusCode::FORBIDDEN,
        EngineError::WalletNotFound(_) | EngineError::TransactionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        EngineError::DuplicateInFlight { .. } | EngineError::AlreadySettled { .. } => {
            StatusCode::CONFLICT
        }
        EngineError::InsufficientFunds { .. }
        | EngineError::WalletInactive(_)
        | EngineError::Overflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Shorthand for a 400 with a plain message.
fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the service is alive.
///
/// This is the liveness probe for orchestrators. It intentionally does not
/// inspect internal state — that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns a service status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let resp = StatusResponse {
        version: state.version.clone(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        wallet_count: state.engine.registry().wallet_count(),
        transaction_count: state.engine.transaction_count(),
        pending_transactions: state.engine.pending_count(),
        timestamp: Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `POST /wallets` — get-or-create a wallet for `(owner, type)`.
async fn create_wallet_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateWalletRequest>,
) -> Response {
    let wallet_type: WalletType = match req.wallet_type.parse() {
        Ok(t) => t,
        Err(e) => return bad_request(e),
    };
    let currency: Currency = match req.currency.parse() {
        Ok(c) => c,
        Err(e) => return engine_error(EngineError::from(e)),
    };

    let before = Utc::now();
    match state.engine.registry().get_or_create(&req.owner, wallet_type, currency) {
        Ok(wallet) => {
            if wallet.created_at >= before {
                state.metrics.wallets_created_total.inc();
            }
            (StatusCode::OK, Json(WalletResponse::from(&wallet))).into_response()
        }
        Err(e) => engine_error(EngineError::from(e)),
    }
}

/// `GET /wallets/:owner` — lists an owner's wallets, oldest first.
///
/// An owner with no wallets yet gets an empty list, not a 404 — lazy
/// creation means "no wallets" is a perfectly ordinary state.
async fn list_wallets_handler(
    Path(owner): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let wallets: Vec<WalletResponse> = state
        .engine
        .registry()
        .wallets_for(&owner)
        .iter()
        .map(WalletResponse::from)
        .collect();
    Json(wallets)
}

/// `POST /transactions` — submits a transaction, returning it `pending`.
async fn submit_transaction_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitTransactionRequest>,
) -> Response {
    let timer = state.metrics.submission_latency_seconds.start_timer();

    let role: Role = match req.role.parse() {
        Ok(r) => r,
        Err(e) => return bad_request(e),
    };
    let kind: TransactionKind = match req.kind.parse() {
        Ok(k) => k,
        Err(e) => return bad_request(e),
    };
    let currency: Currency = match req.currency.parse() {
        Ok(c) => c,
        Err(e) => return engine_error(EngineError::from(e)),
    };
    let amount = match Amount::parse(&req.amount, currency) {
        Ok(a) => a,
        Err(e) => return engine_error(EngineError::from(e)),
    };
    let from_wallet = match parse_wallet_id(req.from_wallet.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let to_wallet = match parse_wallet_id(req.to_wallet.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let before = Utc::now();
    let result = state.engine.submit(SubmitRequest {
        owner: req.owner,
        role,
        kind,
        amount,
        from_wallet,
        to_wallet,
        description: req.description,
        idempotency_key: req.idempotency_key,
    });
    timer.observe_duration();

    match result {
        Ok(tx) => {
            // A replayed idempotency key returns a transaction admitted in
            // the past; only fresh admissions count as submissions.
            if tx.created_at >= before {
                state.metrics.submissions_total.inc();
            } else {
                state.metrics.duplicates_replayed_total.inc();
            }
            state
                .metrics
                .pending_transactions
                .set(state.engine.pending_count() as i64);
            (StatusCode::OK, Json(TransactionResponse::from(&tx))).into_response()
        }
        Err(err) => {
            match &err {
                EngineError::NotVerified { .. } | EngineError::RoleDenied { .. } => {
                    state.metrics.authorization_denied_total.inc();
                }
                EngineError::InsufficientFunds { .. } => {
                    state.metrics.insufficient_funds_total.inc();
                }
                _ => {}
            }
            engine_error(err)
        }
    }
}

/// `GET /transactions/:id` — returns a transaction's current state.
async fn get_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let id: TransactionId = match id.parse() {
        Ok(id) => id,
        Err(_) => return bad_request(format!("malformed transaction id: {id}")),
    };
    match state.engine.transaction(id) {
        Ok(tx) => (StatusCode::OK, Json(TransactionResponse::from(&tx))).into_response(),
        Err(err) => engine_error(err),
    }
}

/// `GET /owners/:owner/transactions` — an owner's history, newest first.
async fn list_transactions_handler(
    Path(owner): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let transactions: Vec<TransactionResponse> = state
        .engine
        .transactions_for(&owner)
        .iter()
        .map(TransactionResponse::from)
        .collect();
    Json(transactions)
}

/// `POST /transactions/:id/settle` — the settlement confirmer's callback.
///
/// Idempotent: re-settling a terminal transaction returns its recorded
/// state with a 200.
async fn settle_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SettleRequest>,
) -> Response {
    let id: TransactionId = match id.parse() {
        Ok(id) => id,
        Err(_) => return bad_request(format!("malformed transaction id: {id}")),
    };

    let before = Utc::now();
    match state.engine.settle(id, req.outcome) {
        Ok(tx) => {
            // Only count transitions that happened in this call, not
            // idempotent replays of an earlier terminal state.
            if tx.settled_at.is_some_and(|at| at >= before) {
                match req.outcome {
                    SettlementOutcome::Commit => {
                        state.metrics.transactions_completed_total.inc()
                    }
                    SettlementOutcome::Fail => state.metrics.transactions_failed_total.inc(),
                }
            }
            state
                .metrics
                .pending_transactions
                .set(state.engine.pending_count() as i64);
            (StatusCode::OK, Json(TransactionResponse::from(&tx))).into_response()
        }
        Err(err) => engine_error(err),
    }
}

/// `POST /transactions/:id/cancel` — cancels a still-pending transaction.
async fn cancel_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let id: TransactionId = match id.parse() {
        Ok(id) => id,
        Err(_) => return bad_request(format!("malformed transaction id: {id}")),
    };
    match state.engine.cancel(id) {
        Ok(tx) => {
            state.metrics.transactions_cancelled_total.inc();
            state
                .metrics
                .pending_transactions
                .set(state.engine.pending_count() as i64);
            (StatusCode::OK, Json(TransactionResponse::from(&tx))).into_response()
        }
        Err(err) => engine_error(err),
    }
}

/// `PUT /verification/:user/flags` — the verification workflow's write path.
async fn set_verification_flag_handler(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SetFlagRequest>,
) -> Response {
    let record = if req.flag.eq_ignore_ascii_case("rejected") {
        if req.value {
            state.engine.gate().reject(&user)
        } else {
            state.engine.gate().reset(&user)
        }
    } else {
        let flag: VerificationFlag = match req.flag.parse() {
            Ok(f) => f,
            Err(e) => return bad_request(e),
        };
        state.engine.gate().set_flag(&user, flag, req.value)
    };
    (StatusCode::OK, Json(VerificationResponse::from(&record))).into_response()
}

/// `GET /verification/:user` — reads a user's verification state.
async fn get_verification_handler(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.engine.gate().record(&user) {
        Some(record) => {
            (StatusCode::OK, Json(VerificationResponse::from(&record))).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no verification record for user {user}"),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses an optional wallet id string, mapping malformed ids to a 400.
fn parse_wallet_id(raw: Option<&str>) -> Result<Option<WalletId>, Response> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| bad_request(format!("malformed wallet id: {s}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use vela_ledger::verification::VerificationFlag;

    /// Creates a test AppState with a fresh in-memory engine.
    fn test_app_state() -> AppState {
        AppState {
            version: "0.1.0-test".into(),
            engine: Arc::new(LedgerEngine::new()),
            metrics: Arc::new(crate::metrics::LedgerMetrics::new()),
            started_at: Utc::now(),
        }
    }

    /// Fully verifies a user and gives them a funded USD primary wallet.
    fn funded_wallet(state: &AppState, user: &str, balance: &str) -> WalletId {
        for flag in VerificationFlag::ALL {
            state.engine.gate().set_flag(user, flag, true);
        }
        let wallet = state
            .engine
            .registry()
            .get_or_create(user, WalletType::Primary, Currency::USD)
            .unwrap();
        if balance != "0" {
            state
                .engine
                .registry()
                .credit(wallet.id, Amount::parse(balance, Currency::USD).unwrap())
                .unwrap();
        }
        wallet.id
    }

    /// Sends a GET request and returns `(status, body_bytes)`.
    async fn get_req(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    /// Sends a request with a JSON body and returns `(status, body_bytes)`.
    async fn json_req(
        router: &Router,
        method: &str,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    fn send_body(from: WalletId, to: WalletId, amount: &str) -> serde_json::Value {
        serde_json::json!({
            "owner": "alice",
            "role": "consumer",
            "kind": "send",
            "amount": amount,
            "currency": "USD",
            "from_wallet": from.to_string(),
            "to_wallet": to.to_string(),
            "description": "api test",
        })
    }

    // -- Liveness & status ---------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get_req(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_endpoint_reports_counts() {
        let state = test_app_state();
        funded_wallet(&state, "alice", "100.00");

        let router = create_router(state);
        let (status, body) = get_req(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.version, "0.1.0-test");
        assert_eq!(resp.wallet_count, 1);
        assert_eq!(resp.transaction_count, 0);
    }

    // -- Wallets -------------------------------------------------------------

    #[tokio::test]
    async fn create_wallet_is_idempotent_per_owner_and_type() {
        let router = create_router(test_app_state());
        let body = serde_json::json!({
            "owner": "alice", "wallet_type": "primary", "currency": "USD"
        });

        let (status, first) = json_req(&router, "POST", "/wallets", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let first: WalletResponse = serde_json::from_slice(&first).unwrap();
        assert_eq!(first.balance, "0.00");
        assert!(first.active);

        let (_, second) = json_req(&router, "POST", "/wallets", body).await;
        let second: WalletResponse = serde_json::from_slice(&second).unwrap();
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn create_wallet_rejects_unsupported_currency() {
        let router = create_router(test_app_state());
        let body = serde_json::json!({
            "owner": "alice", "wallet_type": "primary", "currency": "DOGE"
        });

        let (status, body) = json_req(&router, "POST", "/wallets", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("DOGE"));
    }

    #[tokio::test]
    async fn list_wallets_returns_empty_for_unknown_owner() {
        let router = create_router(test_app_state());
        let (status, body) = get_req(&router, "/wallets/nobody").await;

        assert_eq!(status, StatusCode::OK);
        let wallets: Vec<WalletResponse> = serde_json::from_slice(&body).unwrap();
        assert!(wallets.is_empty());
    }

    // -- Transactions --------------------------------------------------------

    #[tokio::test]
    async fn full_send_flow_over_http() {
        let state = test_app_state();
        let alice = funded_wallet(&state, "alice", "1000.00");
        let bob = funded_wallet(&state, "bob", "0");
        let router = create_router(state);

        // Submit.
        let (status, body) =
            json_req(&router, "POST", "/transactions", send_body(alice, bob, "100.00")).await;
        assert_eq!(status, StatusCode::OK);
        let tx: TransactionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(tx.status, "pending");
        assert_eq!(tx.amount, "100.00");

        // Settle.
        let (status, body) = json_req(
            &router,
            "POST",
            &format!("/transactions/{}/settle", tx.id),
            serde_json::json!({ "outcome": "commit" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let settled: TransactionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(settled.status, "completed");
        assert!(settled.settled_at.is_some());

        // Balances.
        let (_, body) = get_req(&router, "/wallets/alice").await;
        let wallets: Vec<WalletResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(wallets[0].balance, "900.00");
        assert_eq!(wallets[0].pending_balance, "0.00");

        let (_, body) = get_req(&router, "/wallets/bob").await;
        let wallets: Vec<WalletResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(wallets[0].balance, "100.00");

        // History.
        let (_, body) = get_req(&router, "/owners/alice/transactions").await;
        let history: Vec<TransactionResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, tx.id);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_replays_original() {
        let state = test_app_state();
        let alice = funded_wallet(&state, "alice", "1000.00");
        let bob = funded_wallet(&state, "bob", "0");
        let router = create_router(state);

        let mut body = send_body(alice, bob, "100.00");
        body["idempotency_key"] = serde_json::json!("k1");

        let (_, first) = json_req(&router, "POST", "/transactions", body.clone()).await;
        let first: TransactionResponse = serde_json::from_slice(&first).unwrap();

        let (status, second) = json_req(&router, "POST", "/transactions", body).await;
        assert_eq!(status, StatusCode::OK);
        let second: TransactionResponse = serde_json::from_slice(&second).unwrap();
        assert_eq!(second.id, first.id);

        // Exactly one hold was taken.
        let (_, wallets) = get_req(&router, "/wallets/alice").await;
        let wallets: Vec<WalletResponse> = serde_json::from_slice(&wallets).unwrap();
        assert_eq!(wallets[0].pending_balance, "100.00");
    }

    #[tokio::test]
    async fn insufficient_funds_maps_to_422() {
        let state = test_app_state();
        let alice = funded_wallet(&state, "alice", "500.00");
        let bob = funded_wallet(&state, "bob", "0");
        let router = create_router(state);

        let (status, body) =
            json_req(&router, "POST", "/transactions", send_body(alice, bob, "2000.00")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("insufficient funds"));
    }

    #[tokio::test]
    async fn unverified_sender_maps_to_403() {
        let state = test_app_state();
        // Alice exists but only has the phone step.
        state
            .engine
            .gate()
            .set_flag("alice", VerificationFlag::Phone, true);
        let alice = state
            .engine
            .registry()
            .get_or_create("alice", WalletType::Primary, Currency::USD)
            .unwrap()
            .id;
        state
            .engine
            .registry()
            .credit(alice, Amount::parse("100.00", Currency::USD).unwrap())
            .unwrap();
        let bob = funded_wallet(&state, "bob", "0");
        let router = create_router(state);

        let (status, body) =
            json_req(&router, "POST", "/transactions", send_body(alice, bob, "10.00")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("not verified"));
    }

    #[tokio::test]
    async fn settle_unknown_transaction_maps_to_404() {
        let router = create_router(test_app_state());
        let id = TransactionId::new();

        let (status, _) = json_req(
            &router,
            "POST",
            &format!("/transactions/{id}/settle"),
            serde_json::json!({ "outcome": "commit" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_after_settlement_maps_to_409() {
        let state = test_app_state();
        let alice = funded_wallet(&state, "alice", "1000.00");
        let bob = funded_wallet(&state, "bob", "0");
        let router = create_router(state);

        let (_, body) =
            json_req(&router, "POST", "/transactions", send_body(alice, bob, "10.00")).await;
        let tx: TransactionResponse = serde_json::from_slice(&body).unwrap();

        json_req(
            &router,
            "POST",
            &format!("/transactions/{}/settle", tx.id),
            serde_json::json!({ "outcome": "commit" }),
        )
        .await;

        let (status, body) = json_req(
            &router,
            "POST",
            &format!("/transactions/{}/cancel", tx.id),
            serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("already settled"));
    }

    #[tokio::test]
    async fn malformed_ids_map_to_400() {
        let router = create_router(test_app_state());

        let (status, _) = get_req(&router, "/transactions/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut body = serde_json::json!({
            "owner": "alice", "role": "consumer", "kind": "send",
            "amount": "1.00", "currency": "USD",
            "to_wallet": "also-not-a-uuid",
        });
        body["from_wallet"] = serde_json::json!("nope");
        let (status, _) = json_req(&router, "POST", "/transactions", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- Verification --------------------------------------------------------

    #[tokio::test]
    async fn verification_flags_drive_kyc_status() {
        let router = create_router(test_app_state());

        let (status, body) = json_req(
            &router,
            "PUT",
            "/verification/alice/flags",
            serde_json::json!({ "flag": "phone", "value": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: VerificationResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.kyc_status, "in_progress");
        assert_eq!(resp.missing_steps, vec!["documents", "biometric"]);

        for flag in ["documents", "biometric"] {
            json_req(
                &router,
                "PUT",
                "/verification/alice/flags",
                serde_json::json!({ "flag": flag, "value": true }),
            )
            .await;
        }

        let (status, body) = get_req(&router, "/verification/alice").await;
        assert_eq!(status, StatusCode::OK);
        let resp: VerificationResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.kyc_status, "verified");
        assert!(resp.missing_steps.is_empty());
    }

    #[tokio::test]
    async fn rejection_override_via_flags_endpoint() {
        let router = create_router(test_app_state());

        json_req(
            &router,
            "PUT",
            "/verification/alice/flags",
            serde_json::json!({ "flag": "phone", "value": true }),
        )
        .await;
        let (_, body) = json_req(
            &router,
            "PUT",
            "/verification/alice/flags",
            serde_json::json!({ "flag": "rejected", "value": true }),
        )
        .await;
        let resp: VerificationResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.kyc_status, "rejected");

        let (_, body) = json_req(
            &router,
            "PUT",
            "/verification/alice/flags",
            serde_json::json!({ "flag": "rejected", "value": false }),
        )
        .await;
        let resp: VerificationResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.kyc_status, "in_progress");
    }

    #[tokio::test]
    async fn unknown_verification_record_maps_to_404() {
        let router = create_router(test_app_state());
        let (status, _) = get_req(&router, "/verification/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // -- Metrics -------------------------------------------------------------

    #[tokio::test]
    async fn metrics_endpoint_exposes_counters() {
        let state = test_app_state();
        let alice = funded_wallet(&state, "alice", "1000.00");
        let bob = funded_wallet(&state, "bob", "0");
        let router = create_router(state);

        json_req(&router, "POST", "/transactions", send_body(alice, bob, "10.00")).await;

        let (status, body) = get_req(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("vela_submissions_total 1"));
        assert!(text.contains("vela_pending_transactions 1"));
    }
}
