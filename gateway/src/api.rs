//! # REST API
//!
//! The axum router for the gateway's HTTP surface. All handlers share
//! [`AppState`] through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                      | Description                              |
//! |--------|---------------------------|------------------------------------------|
//! | GET    | `/health`                 | Liveness probe                           |
//! | POST   | `/api/v1/token/generate`  | Issue (or reuse) a transaction token     |
//! | POST   | `/api/v1/token/validate`  | Check a token, optionally pinned         |
//! | POST   | `/wrapper/bank/token`     | Same as `generate`, for wrapper clients  |
//! | POST   | `/wrapper/bank/validate`  | Encrypted bank validation                |
//!
//! Every response from `/wrapper/bank/validate`, including errors, is a
//! `{"encData": ...}` envelope.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use txnwrap::envelope::{EncryptedBody, PayloadEnvelope};
use txnwrap::token::{IssueRequest, TokenService};
use txnwrap::WrapperError;

use crate::bank::{BankValidationError, BankValidationService};
use crate::downstream::BankValidationRequest;
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state. Cheap to clone; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub tokens: Arc<TokenService>,
    pub envelope: Arc<PayloadEnvelope>,
    pub bank: Arc<BankValidationService>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/token/generate", post(generate_token_handler))
        .route("/api/v1/token/validate", post(validate_token_handler))
        .route("/wrapper/bank/token", post(wrapper_token_handler))
        .route("/wrapper/bank/validate", post(bank_validate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenValidateRequest {
    pub token: String,
    pub client_id: Option<String>,
    pub processor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenValidateResponse {
    pub valid: bool,
}

/// Body of `/wrapper/bank/validate` before decryption.
#[derive(Debug, Default, Deserialize)]
pub struct BankValidateBody {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "encData", alias = "encryptedData")]
    pub enc_data: Option<String>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn message_json(message: &str) -> String {
    serde_json::json!({ "message": message }).to_string()
}

// ---------------------------------------------------------------------------
// Token Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /api/v1/token/generate`
async fn generate_token_handler(
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Response {
    issue_token(&state, &request)
}

/// `POST /wrapper/bank/token`
async fn wrapper_token_handler(
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Response {
    info!(
        client_id = %request.client_id,
        processor = %request.processor,
        transaction_user_id = %request.transaction_user_id,
        transaction_merchant_id = %request.transaction_merchant_id,
        "incoming wrapper token generation request"
    );
    issue_token(&state, &request)
}

fn issue_token(state: &AppState, request: &IssueRequest) -> Response {
    match state.tokens.issue_detailed(request) {
        Ok(issued) => {
            if issued.reused {
                state.metrics.tokens_reused_total.inc();
            } else {
                state.metrics.tokens_issued_total.inc();
            }
            (StatusCode::OK, Json(TokenResponse { token: issued.token })).into_response()
        }
        Err(e) => {
            let status = match &e {
                WrapperError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                WrapperError::Unauthenticated => StatusCode::UNAUTHORIZED,
                WrapperError::Conflict(_) => StatusCode::CONFLICT,
                WrapperError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                WrapperError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status.is_server_error() {
                error!(error = %e, "token issuance failed");
            } else {
                warn!(error = %e, "token issuance refused");
            }
            error_body(status, e.to_string())
        }
    }
}

/// `POST /api/v1/token/validate`
async fn validate_token_handler(
    State(state): State<AppState>,
    Json(request): Json<TokenValidateRequest>,
) -> Response {
    if request.token.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "Token is required");
    }
    let valid = state.tokens.validate(
        &request.token,
        request.client_id.as_deref(),
        request.processor.as_deref(),
    );
    state.metrics.record_validation(valid);
    (StatusCode::OK, Json(TokenValidateResponse { valid })).into_response()
}

// ---------------------------------------------------------------------------
// Bank Validation
// ---------------------------------------------------------------------------

/// Token from an `Authorization` header value: trimmed, optional
/// case-insensitive `Bearer ` prefix, optional surrounding double quotes.
pub fn extract_header_token(header: Option<&str>) -> Option<String> {
    let mut value = header?.trim();
    if value.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("bearer ")) {
        value = value[7..].trim();
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value = value[1..value.len() - 1].trim();
    }
    (!value.is_empty()).then(|| value.to_string())
}

/// Header token if present, else the trimmed body token.
pub fn resolve_token(header: Option<&str>, body_token: Option<&str>) -> Option<String> {
    extract_header_token(header).or_else(|| {
        body_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Downstream error body: JSON passes through, anything else is wrapped.
fn downstream_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        message_json("Bank validation failed with downstream error")
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        message_json(trimmed)
    }
}

fn enveloped(state: &AppState, status: StatusCode, plain_json: &str) -> Response {
    let body: EncryptedBody = state.envelope.seal_str(plain_json);
    (status, Json(body)).into_response()
}

/// `POST /wrapper/bank/validate`
async fn bank_validate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: BankValidateBody = if body.is_empty() {
        BankValidateBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed bank validation body");
                return enveloped(
                    &state,
                    StatusCode::BAD_REQUEST,
                    &message_json("Malformed request body"),
                );
            }
        }
    };

    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let Some(token) = resolve_token(header, request.token.as_deref()) else {
        warn!("missing authorization token");
        return enveloped(
            &state,
            StatusCode::UNAUTHORIZED,
            &message_json("Authorization header or body token is required"),
        );
    };

    let enc_data = match request.enc_data.as_deref().map(str::trim) {
        Some(data) if !data.is_empty() => data.to_string(),
        _ => {
            return enveloped(
                &state,
                StatusCode::BAD_REQUEST,
                &message_json("encData is required"),
            )
        }
    };

    let bank_request: BankValidationRequest =
        match state.envelope.open_json(&EncryptedBody { enc_data }) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "bank validation payload rejected");
                let message = match e {
                    WrapperError::InvalidInput(m) => m,
                    other => other.to_string(),
                };
                return enveloped(&state, StatusCode::UNAUTHORIZED, &message_json(&message));
            }
        };
    info!(request_id = ?bank_request.request_id, "incoming bank validation request");

    match state.bank.validate_account(&bank_request, &token).await {
        Ok(body) => {
            let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
            enveloped(&state, StatusCode::OK, body)
        }
        Err(BankValidationError::TokenRejected) => enveloped(
            &state,
            StatusCode::UNAUTHORIZED,
            &message_json(&BankValidationError::TokenRejected.to_string()),
        ),
        Err(BankValidationError::Downstream { status, body }) => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            enveloped(&state, status, &downstream_body(&body))
        }
        Err(BankValidationError::Transport(_)) => enveloped(
            &state,
            StatusCode::INTERNAL_SERVER_ERROR,
            &message_json("Bank validation failed"),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{BankValidator, DownstreamError};
    use crate::metrics::GatewayMetrics;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use tower::ServiceExt;
    use txnwrap::config::WrapperConfig;
    use txnwrap::storage::{AuditStatus, AuditStore, TokenDB};

    const KEY: &str = "0123456789abcdef0123456789abcdef";
    const IV: &str = "abcdef9876543210";

    /// Downstream stub that returns a canned outcome and records requests.
    struct StubValidator {
        outcome: Mutex<Result<String, DownstreamError>>,
        seen: Mutex<Vec<BankValidationRequest>>,
    }

    impl StubValidator {
        fn new(outcome: Result<String, DownstreamError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(outcome),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl BankValidator for StubValidator {
        async fn validate(
            &self,
            request: &BankValidationRequest,
        ) -> Result<String, DownstreamError> {
            self.seen.lock().push(request.clone());
            match &*self.outcome.lock() {
                Ok(body) => Ok(body.clone()),
                Err(DownstreamError::Status { status, body }) => Err(DownstreamError::Status {
                    status: *status,
                    body: body.clone(),
                }),
                Err(DownstreamError::Transport(m)) => Err(DownstreamError::Transport(m.clone())),
            }
        }
    }

    struct Harness {
        router: Router,
        envelope: Arc<PayloadEnvelope>,
        db: Arc<TokenDB>,
        stub: Arc<StubValidator>,
        metrics: SharedMetrics,
    }

    fn harness(outcome: Result<String, DownstreamError>) -> Harness {
        let config = WrapperConfig::new(KEY, IV, "s3cret")
            .with_payload_key("fedcba9876543210fedcba9876543210", "0011223344556677");
        let db = Arc::new(TokenDB::open_temporary().expect("temp db"));
        let tokens = Arc::new(TokenService::new(&config, db.clone()).unwrap());
        let envelope = Arc::new(PayloadEnvelope::new(&config).unwrap());
        let metrics = Arc::new(GatewayMetrics::new());
        let stub = StubValidator::new(outcome);
        let bank = Arc::new(BankValidationService::new(
            tokens.clone(),
            stub.clone(),
            db.clone(),
            metrics.clone(),
        ));
        let state = AppState {
            version: "0.1.0-test".into(),
            tokens,
            envelope: envelope.clone(),
            bank,
            metrics: metrics.clone(),
        };
        Harness {
            router: create_router(state),
            envelope,
            db,
            stub,
            metrics,
        }
    }

    fn now_timestamp() -> String {
        chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    fn issue_body(client: &str) -> serde_json::Value {
        serde_json::json!({
            "clientId": client,
            "processor": "razorpay",
            "transactionUserId": "U1",
            "transactionMerchantId": "M1",
            "transactionTimestamp": now_timestamp(),
        })
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
        authorization: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(auth) = authorization {
            builder = builder.header("authorization", auth);
        }
        let req = builder
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(router, req).await
    }

    async fn issue(h: &Harness, client: &str) -> String {
        let (status, body) = post_json(&h.router, "/api/v1/token/generate", issue_body(client), None).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice::<TokenResponse>(&body).unwrap().token
    }

    /// Decrypts an enveloped response body into JSON.
    fn open(h: &Harness, body: &[u8]) -> serde_json::Value {
        let sealed: EncryptedBody = serde_json::from_slice(body).expect("enveloped body");
        h.envelope.open_json(&sealed).expect("decryptable body")
    }

    fn bank_request_env(h: &Harness) -> String {
        h.envelope.encrypt_payload(
            r#"{"requestId":"REQ-1","custName":"Asha","custAcctNo":"123456789012","custIfsc":"HDFC0001"}"#,
        )
    }

    // -- 1. Health -----------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let h = harness(Ok("{}".into()));
        let (status, body) = get(&h.router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    // -- 2. Issue and validate -------------------------------------------------

    #[tokio::test]
    async fn generate_then_validate() {
        let h = harness(Ok("{}".into()));
        let token = issue(&h, "C1").await;

        let (status, body) = post_json(
            &h.router,
            "/api/v1/token/validate",
            serde_json::json!({ "token": token, "clientId": "C1", "processor": "RAZORPAY" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: TokenValidateResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.valid);

        let (_, body) = post_json(
            &h.router,
            "/api/v1/token/validate",
            serde_json::json!({ "token": token, "clientId": "C2" }),
            None,
        )
        .await;
        let resp: TokenValidateResponse = serde_json::from_slice(&body).unwrap();
        assert!(!resp.valid);

        assert_eq!(h.metrics.token_validations_total.get(), 2);
        assert_eq!(h.metrics.token_rejections_total.get(), 1);
    }

    #[tokio::test]
    async fn wrapper_token_endpoint_is_idempotent() {
        let h = harness(Ok("{}".into()));
        let body = issue_body("C1");
        let (s1, b1) = post_json(&h.router, "/wrapper/bank/token", body.clone(), None).await;
        let (s2, b2) = post_json(&h.router, "/wrapper/bank/token", body, None).await;
        assert_eq!(s1, StatusCode::OK);
        assert_eq!(s2, StatusCode::OK);
        assert_eq!(b1, b2);
        assert_eq!(h.metrics.tokens_issued_total.get(), 1);
        assert_eq!(h.metrics.tokens_reused_total.get(), 1);
    }

    #[tokio::test]
    async fn generate_with_bad_timestamp_is_400() {
        let h = harness(Ok("{}".into()));
        let mut body = issue_body("C1");
        body["transactionTimestamp"] = "01/01/2024 10:00".into();
        let (status, body) = post_json(&h.router, "/api/v1/token/generate", body, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("transactionTimestamp"));
    }

    #[tokio::test]
    async fn validate_with_blank_token_is_400() {
        let h = harness(Ok("{}".into()));
        let (status, _) = post_json(
            &h.router,
            "/api/v1/token/validate",
            serde_json::json!({ "token": "  " }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- 3. Token resolution -----------------------------------------------------

    #[test]
    fn header_token_forms() {
        assert_eq!(extract_header_token(Some("Bearer abc")).as_deref(), Some("abc"));
        assert_eq!(extract_header_token(Some("bearer  abc ")).as_deref(), Some("abc"));
        assert_eq!(extract_header_token(Some("BEARER \"abc\"")).as_deref(), Some("abc"));
        assert_eq!(extract_header_token(Some("\"abc\"")).as_deref(), Some("abc"));
        assert_eq!(extract_header_token(Some("abc")).as_deref(), Some("abc"));
        assert_eq!(extract_header_token(Some("Bearer \"\"")), None);
        assert_eq!(extract_header_token(Some("   ")), None);
        assert_eq!(extract_header_token(None), None);
    }

    #[test]
    fn header_wins_over_body() {
        assert_eq!(
            resolve_token(Some("Bearer from-header"), Some("from-body")).as_deref(),
            Some("from-header")
        );
        assert_eq!(
            resolve_token(Some("  "), Some(" from-body ")).as_deref(),
            Some("from-body")
        );
        assert_eq!(resolve_token(None, Some("   ")), None);
    }

    // -- 4. Bank validation: rejections ------------------------------------------

    #[tokio::test]
    async fn missing_token_is_enveloped_401() {
        let h = harness(Ok("{}".into()));
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "encData": enc }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json = open(&h, &body);
        assert_eq!(json["message"], "Authorization header or body token is required");
        assert!(h.stub.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_enc_data_is_enveloped_400() {
        let h = harness(Ok("{}".into()));
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": "abc" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(open(&h, &body)["message"], "encData is required");
    }

    #[tokio::test]
    async fn undecryptable_payload_is_enveloped_401() {
        let h = harness(Ok("{}".into()));
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": "abc", "encData": "not-base64!" }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(open(&h, &body)["message"], "invalid encrypted payload");
    }

    #[tokio::test]
    async fn rejected_token_is_audited_and_enveloped_401() {
        let h = harness(Ok("{}".into()));
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "encData": enc }),
            Some("Bearer bm90LWEtdG9rZW4="),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(open(&h, &body)["message"], "Invalid or expired wrapper token");

        let audits = h.db.audits_for_request("REQ-1").unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].status, AuditStatus::TokenInvalid);
        assert!(h.stub.seen.lock().is_empty());
    }

    // -- 5. Bank validation: downstream outcomes ---------------------------------

    #[tokio::test]
    async fn success_passes_body_through_and_audits_masked() {
        let h = harness(Ok(r#"{"verified":true,"nameMatch":"FULL"}"#.into()));
        let token = issue(&h, "C1").await;
        let enc = bank_request_env(&h);
        let auth = format!("Bearer \"{token}\"");

        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "encData": enc }),
            Some(auth.as_str()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json = open(&h, &body);
        assert_eq!(json["verified"], true);

        let seen = h.stub.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].cust_acct_no.as_deref(), Some("123456789012"));
        drop(seen);

        let audits = h.db.audits_for_request("REQ-1").unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].status, AuditStatus::Success);
        assert!(audits[0].request_payload.contains("****9012"));
        assert!(!audits[0].request_payload.contains("123456789012"));
        assert_eq!(audits[0].response_payload, r#"{"verified":true,"nameMatch":"FULL"}"#);
        assert_eq!(
            h.metrics
                .downstream_calls_total
                .with_label_values(&["SUCCESS"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn body_token_is_used_without_header() {
        let h = harness(Ok(String::new()));
        let token = issue(&h, "C1").await;
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": format!("  {token} "), "encryptedData": enc }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        // Empty downstream body becomes an empty object.
        assert_eq!(open(&h, &body), serde_json::json!({}));
    }

    #[tokio::test]
    async fn downstream_json_error_passes_through_with_status() {
        let h = harness(Err(DownstreamError::Status {
            status: 422,
            body: r#"{"code":"ACCT_CLOSED"}"#.into(),
        }));
        let token = issue(&h, "C1").await;
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": token, "encData": enc }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(open(&h, &body)["code"], "ACCT_CLOSED");
        let audits = h.db.audits_for_request("REQ-1").unwrap();
        assert_eq!(audits[0].status, AuditStatus::Failed);
    }

    #[tokio::test]
    async fn downstream_text_error_is_wrapped() {
        let h = harness(Err(DownstreamError::Status {
            status: 502,
            body: "upstream \"gateway\" sad".into(),
        }));
        let token = issue(&h, "C1").await;
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": token, "encData": enc }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(open(&h, &body)["message"], "upstream \"gateway\" sad");
    }

    #[tokio::test]
    async fn downstream_empty_error_gets_generic_message() {
        let h = harness(Err(DownstreamError::Status {
            status: 404,
            body: "  ".into(),
        }));
        let token = issue(&h, "C1").await;
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": token, "encData": enc }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            open(&h, &body)["message"],
            "Bank validation failed with downstream error"
        );
    }

    #[tokio::test]
    async fn transport_failure_is_enveloped_500() {
        let h = harness(Err(DownstreamError::Transport("connection refused".into())));
        let token = issue(&h, "C1").await;
        let enc = bank_request_env(&h);
        let (status, body) = post_json(
            &h.router,
            "/wrapper/bank/validate",
            serde_json::json!({ "token": token, "encData": enc }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(open(&h, &body)["message"], "Bank validation failed");
        let audits = h.db.audits_for_request("REQ-1").unwrap();
        assert_eq!(audits[0].status, AuditStatus::Error);
        assert_eq!(audits[0].response_payload, "connection refused");
    }

    #[tokio::test]
    async fn malformed_body_is_enveloped_400() {
        let h = harness(Ok("{}".into()));
        let req = Request::builder()
            .method("POST")
            .uri("/wrapper/bank/validate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&h.router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(open(&h, &body)["message"], "Malformed request body");
    }
}
