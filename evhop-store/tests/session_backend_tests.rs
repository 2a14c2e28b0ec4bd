use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use evhop_core::backend::{BackendError, BookingBackend, GuestLogin, TripSubmission};
use evhop_core::payment::{PaymentGateway, PaymentStatus};
use evhop_core::session::{StoredToken, TokenKind};
use evhop_shared::models::UserProfile;
use evhop_shared::Masked;
use evhop_store::app_config::BackendConfig;
use evhop_store::{BackendClient, GuestTokenProvider, MemorySessionStore, SessionBackend};
use serde_json::{json, Value};

#[derive(Default)]
struct Upstream {
    accounts: AtomicUsize,
    submits: AtomicUsize,
    /// Tokens answered with 401
    reject: Vec<String>,
    /// Reject every token
    always_reject: bool,
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn create_account(State(up): State<Arc<Upstream>>) -> Json<Value> {
    let n = up.accounts.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "token": format!("anon-{}", n) }))
}

async fn submit(State(up): State<Arc<Upstream>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    up.submits.fetch_add(1, Ordering::SeqCst);
    if up.always_reject || up.reject.contains(&bearer(&headers)) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "token expired" })));
    }
    (StatusCode::OK, Json(json!({ "order_id": "ORD-42", "price": 150000 })))
}

async fn guest_login(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "token": "guest-1",
        "user": { "name": body["name"], "whatsapp": body["whatsapp"] }
    }))
}

/// Echoes the profile the way the backend stores it, name title-cased
async fn save_profile(headers: HeaderMap, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_empty() {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing token" })));
    }
    if let Some(name) = body["name"].as_str() {
        let mut chars = name.chars();
        let titled: String = chars.next().map(|c| c.to_uppercase().chain(chars).collect()).unwrap_or_default();
        body["name"] = Value::String(titled);
    }
    (StatusCode::OK, Json(json!({ "data": body })))
}

async fn payment_detail() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "order_id": "ORD-42", "status": "settlement" })))
}

async fn cars() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "message": "Order sudah kedaluwarsa", "details": { "order_id": "ORD-42" } })),
    )
}

async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/auth/anonymous", post(create_account))
        .route("/auth/guest", post(guest_login))
        .route("/profile", put(save_profile))
        .route("/trips/submit", post(submit))
        .route("/checkout/{order_id}/payment-detail", get(payment_detail))
        .route("/cars", get(cars))
        .with_state(upstream);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn session_backend(base_url: &str) -> SessionBackend {
    let client = BackendClient::new(&BackendConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
    })
    .unwrap();
    let store = Arc::new(MemorySessionStore::new(base_url));
    let tokens = Arc::new(GuestTokenProvider::with_device_id(Arc::new(client.clone()), store, "device-test"));
    SessionBackend::new(client, tokens)
}

fn trip() -> TripSubmission {
    TripSubmission {
        pickup_at: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(10, 0, 0).unwrap(),
        return_at: None,
        is_round_trip: false,
        rental: None,
    }
}

#[tokio::test]
async fn test_unauthorized_refreshes_token_and_retries_once() {
    let upstream = Arc::new(Upstream { reject: vec!["anon-1".to_string()], ..Default::default() });
    let base_url = spawn_upstream(upstream.clone()).await;
    let backend = session_backend(&base_url);

    let submitted = backend.submit_trip(&trip()).await.unwrap();

    assert_eq!(submitted.order_id, "ORD-42");
    assert_eq!(submitted.price, Some(150_000));
    assert_eq!(upstream.accounts.load(Ordering::SeqCst), 2);
    assert_eq!(upstream.submits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_unauthorized_is_surfaced() {
    let upstream = Arc::new(Upstream { always_reject: true, ..Default::default() });
    let base_url = spawn_upstream(upstream.clone()).await;
    let backend = session_backend(&base_url);

    let err = backend.submit_trip(&trip()).await.unwrap_err();

    assert!(matches!(err, BackendError::Unauthorized));
    assert_eq!(upstream.submits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_upstream_errors_are_normalized() {
    let upstream = Arc::new(Upstream::default());
    let base_url = spawn_upstream(upstream).await;
    let backend = session_backend(&base_url);

    match backend.list_cars("ORD-42").await.unwrap_err() {
        BackendError::Upstream { status, message, details } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Order sudah kedaluwarsa");
            assert_eq!(details, Some(json!({ "order_id": "ORD-42" })));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_payment_detail_status_aliases() {
    let upstream = Arc::new(Upstream::default());
    let base_url = spawn_upstream(upstream).await;
    let backend = session_backend(&base_url);

    let detail = backend.payment_detail("ORD-42").await.unwrap();
    assert_eq!(detail.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let backend = session_backend("http://127.0.0.1:1");
    let err = backend.submit_trip(&trip()).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn test_rejected_guest_token_falls_back_to_anonymous() {
    let upstream = Arc::new(Upstream { reject: vec!["guest-stale".to_string()], ..Default::default() });
    let base_url = spawn_upstream(upstream.clone()).await;
    let backend = session_backend(&base_url);
    let store = backend.tokens().store().clone();
    store
        .set_token(TokenKind::Guest, StoredToken::issue(TokenKind::Guest, "guest-stale".into(), Utc::now()))
        .await
        .unwrap();

    let submitted = backend.submit_trip(&trip()).await.unwrap();

    assert_eq!(submitted.order_id, "ORD-42");
    assert_eq!(upstream.accounts.load(Ordering::SeqCst), 1);
    assert_eq!(upstream.submits.load(Ordering::SeqCst), 2);
    assert!(store.get_token(TokenKind::Guest).await.unwrap().is_none());
    assert_eq!(store.get_token(TokenKind::Anonymous).await.unwrap().map(|t| t.value), Some("anon-1".to_string()));
}

#[tokio::test]
async fn test_guest_login_token_is_used_for_bookings() {
    let upstream = Arc::new(Upstream::default());
    let base_url = spawn_upstream(upstream.clone()).await;
    let backend = session_backend(&base_url);

    let profile = backend
        .tokens()
        .login_guest(&GuestLogin {
            name: "Made".to_string(),
            whatsapp: Masked("6281234567890".to_string()),
            email: None,
        })
        .await
        .unwrap();
    backend.submit_trip(&trip()).await.unwrap();

    assert_eq!(profile.name.as_deref(), Some("Made"));
    assert_eq!(upstream.accounts.load(Ordering::SeqCst), 0);
    assert_eq!(backend.tokens().token().await.unwrap(), (TokenKind::Guest, "guest-1".to_string()));
}

#[tokio::test]
async fn test_profile_update_refreshes_cached_profile() {
    let upstream = Arc::new(Upstream::default());
    let base_url = spawn_upstream(upstream).await;
    let backend = session_backend(&base_url);

    let saved = backend
        .update_profile(&UserProfile {
            name: Some("wayan".to_string()),
            whatsapp: Some(Masked("6281234567890".to_string())),
            email: None,
        })
        .await
        .unwrap();

    assert_eq!(saved.name.as_deref(), Some("Wayan"));
    let cached = backend.tokens().store().get_profile().await.unwrap();
    assert_eq!(cached, Some(saved));
}
