//! Grading client tests against scripted and HTTP-backed providers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use deskcoach::credentials::ApiKey;
use deskcoach::grading::{build_request, GradingClient, PromptPayload, TraineeReply};
use deskcoach::profile::HotelProfile;
use deskcoach::providers::openai::OpenAiProvider;
use deskcoach::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, ResponseFormat,
    StopReason, UsageStats,
};
use deskcoach::scenario::Scenario;
use deskcoach::{CoachError, SchemaViolation, TransportKind};

/// Provider that replays canned outcomes and records requests.
struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
    last: Mutex<Option<CompletionRequest>>,
    structured: bool,
}

impl ScriptedProvider {
    fn new(outcomes: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
            structured: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().expect("lock") = Some(request);
        let outcome = self
            .outcomes
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".to_owned())));
        outcome.map(|text| CompletionResponse {
            text,
            stop_reason: StopReason::EndTurn,
            usage: UsageStats::default(),
            model: "scripted".to_owned(),
        })
    }

    fn supports_structured_output(&self) -> bool {
        self.structured
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

fn grade_json(policy: u8, tone: u8) -> String {
    format!(
        r#"{{"policy_score": {policy}, "tone_score": {tone}, "clarity_score": 70,
            "feedback": "Offer a room move.", "suggested_reply": "Let me find you a quieter room."}}"#
    )
}

fn payload() -> PromptPayload {
    let profile = HotelProfile::new(
        "The Statler Hotel",
        vec!["warm".to_owned(), "concise".to_owned()],
        vec!["No complimentary upgrades without manager approval.".to_owned()],
        Vec::new(),
    )
    .expect("profile should be valid");
    let scenario = Scenario::new(
        "noise-upgrade",
        "Guest demands a free upgrade after a noise complaint.",
    );
    let reply = TraineeReply::new("noise-upgrade", "Sorry, no free upgrades.");
    build_request(&profile, &scenario, &reply).expect("payload should build")
}

#[tokio::test]
async fn grade_returns_validated_result_and_declares_schema() {
    let provider = ScriptedProvider::new(vec![Ok(grade_json(40, 35))]);
    let client = GradingClient::new(provider.clone());

    let result = client.grade(&payload()).await.expect("grade should succeed");
    assert_eq!(result.policy_score(), 40);
    assert_eq!(provider.calls(), 1);

    let last = provider.last.lock().expect("lock").take().expect("request recorded");
    assert!(matches!(last.response_format, ResponseFormat::JsonSchema { .. }));
    assert_eq!(last.system.as_deref(), Some(payload().system.as_str()));
    assert_eq!(last.messages.len(), 1);
}

#[tokio::test]
async fn same_payload_may_grade_differently() {
    let provider = ScriptedProvider::new(vec![Ok(grade_json(40, 35)), Ok(grade_json(55, 60))]);
    let client = GradingClient::new(provider.clone());
    let payload = payload();

    let first = client.grade(&payload).await.expect("first grade");
    let second = client.grade(&payload).await.expect("second grade");
    assert_ne!(first, second);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn out_of_range_answer_is_schema_violation() {
    let provider = ScriptedProvider::new(vec![Ok(grade_json(40, 35).replace("40", "150"))]);
    let client = GradingClient::new(provider);

    match client.grade(&payload()).await {
        Err(CoachError::Schema(SchemaViolation::OutOfRange { field, value })) => {
            assert_eq!(field, "policy_score");
            assert_eq!(value, 150);
        }
        other => panic!("expected out-of-range violation, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_is_transport_error() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::HttpStatus {
        status: 429,
        body: "slow down".to_owned(),
    })]);
    let client = GradingClient::new(provider);

    match client.grade(&payload()).await {
        Err(CoachError::Transport { kind, .. }) => assert_eq!(kind, TransportKind::RateLimited),
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn envelope_parse_failure_is_schema_violation() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Parse("no choices".to_owned()))]);
    let client = GradingClient::new(provider);
    let err = client.grade(&payload()).await.expect_err("should fail");
    assert!(matches!(err, CoachError::Schema(SchemaViolation::Envelope(_))));
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Over HTTP
// ---------------------------------------------------------------------------

async fn serve_once(status_line: &str, body: &str) -> String {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 8192];
            let _ = socket.read(&mut read_buf).await;
            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}/v1")
}

fn http_client(base_url: &str) -> GradingClient {
    let key = ApiKey::new("sk-test").expect("key should be valid");
    let provider = OpenAiProvider::new("gpt-4o".to_owned(), key, base_url, Duration::from_secs(5))
        .expect("provider should build");
    GradingClient::new(Arc::new(provider))
}

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "model": "gpt-4o",
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 200, "completion_tokens": 60}
    })
    .to_string()
}

#[tokio::test]
async fn http_success_is_parsed() {
    let url = serve_once("200 OK", &completion_body(&grade_json(80, 90))).await;
    let result = http_client(&url).grade(&payload()).await.expect("should grade");
    assert_eq!(result.tone_score(), 90);
}

#[tokio::test]
async fn http_unauthorized_is_classified() {
    let url = serve_once("401 Unauthorized", r#"{"error":"invalid api key"}"#).await;
    match http_client(&url).grade(&payload()).await {
        Err(CoachError::Transport { kind, .. }) => assert_eq!(kind, TransportKind::Unauthorized),
        other => panic!("expected unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn http_server_error_keeps_status() {
    let url = serve_once("503 Service Unavailable", "overloaded").await;
    match http_client(&url).grade(&payload()).await {
        Err(CoachError::Transport { kind, detail }) => {
            assert_eq!(kind, TransportKind::Status(503));
            assert!(detail.contains("overloaded"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_non_json_content_is_schema_violation() {
    let url = serve_once("200 OK", &completion_body("Pretty good reply overall!")).await;
    match http_client(&url).grade(&payload()).await {
        Err(CoachError::Schema(SchemaViolation::NotJson(_))) => {}
        other => panic!("expected not-json violation, got {other:?}"),
    }
}

#[tokio::test]
async fn http_unreachable_is_connect_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        listener.local_addr().expect("should have addr")
    };
    let client = http_client(&format!("http://{addr}/v1"));
    match client.grade(&payload()).await {
        Err(CoachError::Transport { kind, .. }) => assert_eq!(kind, TransportKind::Connect),
        other => panic!("expected connect error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_timeout_is_classified() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("should have addr");
    // Accept the connection and never answer.
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        }
    });

    let key = ApiKey::new("sk-test").expect("key should be valid");
    let provider = OpenAiProvider::new(
        "gpt-4o".to_owned(),
        key,
        &format!("http://{addr}/v1"),
        Duration::from_millis(300),
    )
    .expect("provider should build");
    match GradingClient::new(Arc::new(provider)).grade(&payload()).await {
        Err(CoachError::Transport { kind, .. }) => assert_eq!(kind, TransportKind::Timeout),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn unavailable_provider_is_network_error() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Unavailable(
        "gateway offline".to_owned(),
    ))]);
    match GradingClient::new(provider).grade(&payload()).await {
        Err(CoachError::Transport { kind, detail }) => {
            assert_eq!(kind, TransportKind::Network);
            assert_eq!(detail, "gateway offline");
        }
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_sends_short_plain_request() {
    let provider = ScriptedProvider::new(vec![Ok("ok".to_owned())]);
    let client = GradingClient::new(provider.clone());
    let answered = client.ping().await.expect("ping should succeed");
    assert_eq!(answered, "scripted");
    assert_eq!(provider.calls(), 1);

    let request = provider.last.lock().expect("lock").take().expect("request recorded");
    assert!(matches!(request.response_format, ResponseFormat::Text));
    assert!(request.system.is_none());
    assert!(request.max_tokens.is_some_and(|n| n <= 16));
}

#[tokio::test]
async fn ping_rejects_empty_answer() {
    let provider = ScriptedProvider::new(vec![Ok("  ".to_owned())]);
    match GradingClient::new(provider).ping().await {
        Err(CoachError::Schema(SchemaViolation::EmptyResponse)) => {}
        other => panic!("expected empty response, got {other:?}"),
    }
}

#[tokio::test]
async fn http_ping_reports_rejected_key() {
    let url = serve_once("401 Unauthorized", r#"{"error":"invalid api key"}"#).await;
    match http_client(&url).ping().await {
        Err(CoachError::Transport { kind, .. }) => assert_eq!(kind, TransportKind::Unauthorized),
        other => panic!("expected unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn http_ping_names_serving_model() {
    let url = serve_once("200 OK", &completion_body("ok")).await;
    assert_eq!(http_client(&url).ping().await.expect("ping should succeed"), "gpt-4o");
}
