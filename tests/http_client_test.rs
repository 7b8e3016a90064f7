mod helpers;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use lotion::analysis::client::HttpAnalysisClient;
use lotion::analysis::{AnalysisClient, Outcome, Unit};
use lotion::config::{ClientConfig, TranscriptionConfig};
use lotion::polling::PollPolicy;
use lotion::transcription::TranscriptionClient;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

async fn insight(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("secret") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    let embedded = json!({ "echo": body["text"], "speaker": body["speaker"] });
    (
        StatusCode::OK,
        Json(json!({ "response": format!("Here is the insight you asked for: {embedded}") })),
    )
}

fn scoring_router() -> Router {
    Router::new()
        .route("/insight", post(insight))
        .route(
            "/limited",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "4")], "slow down") }),
        )
        .route(
            "/limited-body",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Rate limit reached for requests", "retry_after": 2})),
                )
            }),
        )
        .route(
            "/broken",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/prose", post(|| async { "nothing structured here" }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "{}"
            }),
        )
}

fn client_for(base: &str, path: &str) -> HttpAnalysisClient {
    let config = ClientConfig {
        endpoint: format!("{base}{path}"),
        api_key: Some("secret".into()),
        request_timeout_secs: 1,
        ..ClientConfig::default()
    };
    HttpAnalysisClient::new(&config).unwrap()
}

fn unit() -> Unit {
    Unit::new(0, "u-0", "Our budget is fixed this quarter.").with_speaker("B")
}

#[tokio::test]
async fn success_extracts_embedded_payload() {
    let base = helpers::serve(scoring_router()).await;
    let outcome = client_for(&base, "/insight").analyze(&unit()).await;
    assert_eq!(
        outcome,
        Outcome::Ok(json!({ "echo": "Our budget is fixed this quarter.", "speaker": "B" }))
    );
}

#[tokio::test]
async fn missing_credentials_is_an_error() {
    let base = helpers::serve(scoring_router()).await;
    let config = ClientConfig {
        endpoint: format!("{base}/insight"),
        ..ClientConfig::default()
    };
    let outcome = HttpAnalysisClient::new(&config).unwrap().analyze(&unit()).await;
    assert_eq!(outcome, Outcome::Error("HTTP 401".into()));
}

#[tokio::test]
async fn too_many_requests_honors_retry_after() {
    let base = helpers::serve(scoring_router()).await;
    let outcome = client_for(&base, "/limited").analyze(&unit()).await;
    assert_eq!(outcome, Outcome::RateLimited(Duration::from_secs(4)));
}

#[tokio::test]
async fn structured_rate_limit_body() {
    let base = helpers::serve(scoring_router()).await;
    let outcome = client_for(&base, "/limited-body").analyze(&unit()).await;
    assert_eq!(outcome, Outcome::RateLimited(Duration::from_secs(2)));
}

#[tokio::test]
async fn server_error_and_unparseable_body() {
    let base = helpers::serve(scoring_router()).await;
    assert_eq!(
        client_for(&base, "/broken").analyze(&unit()).await,
        Outcome::Error("HTTP 500".into())
    );
    assert_eq!(
        client_for(&base, "/prose").analyze(&unit()).await,
        Outcome::Error("unparseable response".into())
    );
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let base = helpers::serve(scoring_router()).await;
    let outcome = client_for(&base, "/slow").analyze(&unit()).await;
    assert_eq!(outcome, Outcome::Error("timeout".into()));
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    // Bind then drop a listener to get a port nothing is serving.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = client_for(&format!("http://{addr}"), "/insight")
        .analyze(&unit())
        .await;
    assert!(matches!(outcome, Outcome::Error(ref m) if m.starts_with("request failed")));
}

async fn job_status(State(polls): State<Arc<AtomicU32>>, Path(id): Path<String>) -> Json<Value> {
    let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
    match (id.as_str(), n) {
        ("bad", _) => Json(json!({"id": id, "status": "error", "error": "audio unreadable"})),
        (_, n) if n < 3 => Json(json!({"id": id, "status": "processing"})),
        _ => Json(json!({"id": id, "status": "completed", "text": "hello"})),
    }
}

fn transcription_client(base: &str) -> TranscriptionClient {
    TranscriptionClient::new(&TranscriptionConfig {
        endpoint: format!("{base}/jobs"),
        api_key: None,
    })
    .unwrap()
}

fn quick_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 10,
        max_duration: None,
    }
}

#[tokio::test]
async fn transcription_wait_polls_until_completed() {
    let polls = Arc::new(AtomicU32::new(0));
    let router = Router::new()
        .route("/jobs/{id}", get(job_status))
        .with_state(Arc::clone(&polls));
    let base = helpers::serve(router).await;

    let job = transcription_client(&base)
        .wait_for("job-1", &quick_policy(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job["status"], "completed");
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn transcription_error_status_is_reported() {
    let router = Router::new()
        .route("/jobs/{id}", get(job_status))
        .with_state(Arc::new(AtomicU32::new(0)));
    let base = helpers::serve(router).await;

    let err = transcription_client(&base)
        .wait_for("bad", &quick_policy(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("audio unreadable"));
}
