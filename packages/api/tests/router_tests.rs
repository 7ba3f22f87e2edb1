// ABOUTME: Router tests for the eval, script and health endpoints
// ABOUTME: Run against the in-memory store and a scripted sandbox runtime

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

use evald_api::{create_router, AppState};
use evald_sandbox::testing::{response_message, ScriptedBehavior, ScriptedRuntime};
use evald_sandbox::{
    ExecutionFailure, ExecutionOutcome, ExecutionReport, LogEntry, LogLevel, Orchestrator,
    OrchestratorConfig, Permissions, SandboxRuntime, WorkerHandle, WorkerProcess, WorkerSpec,
};
use evald_staging::{MemoryScriptStore, ScriptId, ScriptStore, StagingError};

const PUBLIC_URL: &str = "http://127.0.0.1:8000";

fn app_with(
    store: Arc<dyn ScriptStore>,
    runtime: Arc<dyn SandboxRuntime>,
    timeout: Duration,
) -> Router {
    let orchestrator = Orchestrator::new(
        runtime,
        OrchestratorConfig {
            timeout,
            permissions: Permissions::minimal(),
        },
    );
    create_router(AppState::new(
        store,
        Arc::new(orchestrator),
        Url::parse(PUBLIC_URL).unwrap(),
        4096,
    ))
}

fn app(store: Arc<MemoryScriptStore>, runtime: Arc<ScriptedRuntime>) -> Router {
    app_with(store, runtime, Duration::from_secs(1))
}

fn eval_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/eval")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn responding(outcome: ExecutionOutcome) -> Arc<ScriptedRuntime> {
    let message = response_message(&outcome);
    Arc::new(ScriptedRuntime::new(move |_| {
        ScriptedBehavior::Respond(message.clone())
    }))
}

#[tokio::test]
async fn test_up_reports_ok() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let response = app.oneshot(get_request("/up")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_get_script_serves_staged_content() {
    let store = Arc::new(MemoryScriptStore::default());
    let id = store.put("console.log(1);".to_string()).await.unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(store, runtime);

    let response = app
        .oneshot(get_request(&format!("/scripts/{}", id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/typescript"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(body_bytes(response).await, b"console.log(1);");
}

#[tokio::test]
async fn test_get_script_unknown_id_is_empty_404() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let response = app
        .oneshot(get_request(&format!("/scripts/{}", ScriptId::new())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_get_script_malformed_id_is_404() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let response = app
        .oneshot(get_request("/scripts/not-a-uuid"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_get_script_expires_after_ttl() {
    let store = Arc::new(MemoryScriptStore::new(Duration::from_secs(30)));
    let id = store.put("export {};".to_string()).await.unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(store, runtime);
    let uri = format!("/scripts/{}", id);

    tokio::time::advance(Duration::from_secs(29)).await;
    let response = app.clone().oneshot(get_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::advance(Duration::from_secs(2)).await;
    let response = app.oneshot(get_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_eval_returns_logs_and_duration() {
    let store = Arc::new(MemoryScriptStore::default());
    let runtime = responding(ExecutionOutcome::Success(ExecutionReport {
        logs: vec![
            LogEntry::new(LogLevel::Log, vec![json!("hello"), json!(42)]),
            LogEntry::new(LogLevel::Error, vec![json!("oops")]),
        ],
        duration: 3.25,
    }));
    let app = app(store.clone(), runtime.clone());

    let response = app
        .oneshot(eval_request(r#"{"code": "console.log('hello', 42)"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "logs": [
                {"level": "log", "args": ["hello", 42]},
                {"level": "error", "args": ["oops"]}
            ],
            "duration": 3.25
        })
    );
    assert_eq!(runtime.launched(), 1);
    assert_eq!(runtime.live(), 0);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_eval_points_worker_at_staged_wrapper() {
    let store = Arc::new(MemoryScriptStore::default());
    let seen = Arc::new(Mutex::new(Vec::<(Url, String)>::new()));
    let recorder = seen.clone();
    let message = response_message(&ExecutionOutcome::Success(ExecutionReport {
        logs: vec![],
        duration: 0.0,
    }));
    let runtime = Arc::new(ScriptedRuntime::new(move |spec| {
        recorder
            .lock()
            .unwrap()
            .push((spec.script_url.clone(), spec.frame_token.marker()));
        ScriptedBehavior::Respond(message.clone())
    }));
    let app = app(store.clone(), runtime);

    let response = app
        .oneshot(eval_request(r#"{"code": "console.log('staged')"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (url, marker) = seen.lock().unwrap()[0].clone();
    let id_segment = url.path().strip_prefix("/scripts/").unwrap().to_string();
    assert!(url.as_str().starts_with("http://127.0.0.1:8000/scripts/"));

    let staged = store
        .get(&id_segment.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(staged.contains(r#"console.log('staged')"#));
    assert!(staged.contains("createRecordingConsole"));
    // The worker only accepts frames carrying the marker baked into this wrapper.
    assert!(staged.contains(&serde_json::to_string(&marker).unwrap()));
}

#[tokio::test]
async fn test_eval_missing_code_is_400_and_stages_nothing() {
    let store = Arc::new(MemoryScriptStore::default());
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));

    for body in [r#"{}"#, r#"{"code": ""}"#, r#"{"code": null}"#] {
        let response = app(store.clone(), runtime.clone())
            .oneshot(eval_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(body_json(response).await, json!({"error": "Missing code"}));
    }

    assert!(store.is_empty().await);
    assert_eq!(runtime.launched(), 0);
}

#[tokio::test]
async fn test_eval_unparsable_body_is_400() {
    let store = Arc::new(MemoryScriptStore::default());
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));

    for body in ["not json", r#"{"code": 5}"#, ""] {
        let response = app(store.clone(), runtime.clone())
            .oneshot(eval_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {:?}", body);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Invalid request body"})
        );
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_eval_accepts_body_without_json_content_type() {
    let runtime = responding(ExecutionOutcome::Success(ExecutionReport {
        logs: vec![],
        duration: 0.0,
    }));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let request = Request::builder()
        .method("POST")
        .uri("/eval")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"code": "1"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_eval_oversized_body_is_413() {
    let store = Arc::new(MemoryScriptStore::default());
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(store.clone(), runtime.clone());

    let code = "x".repeat(8192);
    let response = app
        .oneshot(eval_request(json!({ "code": code }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.is_empty().await);
    assert_eq!(runtime.launched(), 0);
}

#[tokio::test]
async fn test_eval_failure_outcome_is_500() {
    let runtime = responding(ExecutionOutcome::Failure(ExecutionFailure {
        error: "URL.createObjectURL is not a function".to_string(),
        duration: 0.2,
    }));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let response = app
        .oneshot(eval_request(r#"{"code": "1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Execution failed: URL.createObjectURL is not a function"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_eval_timeout_is_500_and_worker_terminated() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Silent));
    let app = app_with(
        Arc::new(MemoryScriptStore::default()),
        runtime.clone(),
        Duration::from_millis(50),
    );

    let response = app
        .oneshot(eval_request(r#"{"code": "while (true) {}"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Execution timed out after 50 ms"})
    );
    assert_eq!(runtime.terminated(), 1);
    assert_eq!(runtime.live(), 0);
}

#[tokio::test]
async fn test_eval_worker_exit_is_500() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime.clone());

    let response = app
        .oneshot(eval_request(r#"{"code": "Deno.exit(0)"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Sandbox worker exited without a result"})
    );
    assert_eq!(runtime.live(), 0);
}

#[tokio::test]
async fn test_eval_launch_failure_is_500() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| {
        ScriptedBehavior::LaunchError("deno: No such file or directory".to_string())
    }));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let response = app
        .oneshot(eval_request(r#"{"code": "1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to start sandbox worker"})
    );
}

#[tokio::test]
async fn test_eval_unexpected_message_is_500_without_payload() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| {
        ScriptedBehavior::Respond(json!({"type": "response", "data": {"forged": "internal-detail"}}))
    }));
    let app = app(Arc::new(MemoryScriptStore::default()), runtime);

    let response = app
        .oneshot(eval_request(r#"{"code": "1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body, json!({"error": "Sandbox worker sent an unexpected message"}));
    assert!(!body.to_string().contains("internal-detail"));
}

struct UnavailableStore;

#[async_trait]
impl ScriptStore for UnavailableStore {
    async fn put(&self, _content: String) -> evald_staging::Result<ScriptId> {
        Err(StagingError::Connection("connection refused".to_string()))
    }

    async fn get(&self, _id: &ScriptId) -> evald_staging::Result<Option<String>> {
        Err(StagingError::Connection("connection refused".to_string()))
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(30)
    }
}

#[tokio::test]
async fn test_store_unavailable_fails_before_launch() {
    let runtime = Arc::new(ScriptedRuntime::new(|_| ScriptedBehavior::Exit));
    let app = app_with(
        Arc::new(UnavailableStore),
        runtime.clone(),
        Duration::from_secs(1),
    );

    let response = app
        .clone()
        .oneshot(eval_request(r#"{"code": "1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to stage script"})
    );
    assert_eq!(runtime.launched(), 0);

    let response = app
        .oneshot(get_request(&format!("/scripts/{}", ScriptId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(response).await.is_empty());
}

/// Reads the staged script back from the store and echoes it as the only log
/// entry, so each response shows which submission its worker actually ran.
struct StoreEchoRuntime {
    store: Arc<MemoryScriptStore>,
}

struct FinishedProcess;

#[async_trait]
impl WorkerProcess for FinishedProcess {
    async fn terminate(&mut self) -> evald_sandbox::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SandboxRuntime for StoreEchoRuntime {
    fn name(&self) -> &'static str {
        "store-echo"
    }

    async fn launch(&self, spec: WorkerSpec) -> evald_sandbox::Result<WorkerHandle> {
        let id: ScriptId = spec
            .script_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|segment| segment.parse().ok())
            .ok_or_else(|| evald_sandbox::SandboxError::LaunchFailed("bad url".to_string()))?;
        let content = self
            .store
            .get(&id)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        // Yield so concurrent requests interleave between staging and reply.
        tokio::task::yield_now().await;

        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(json!({
            "type": "response",
            "data": {"ok": true, "logs": [{"level": "log", "args": [content]}], "duration": 0}
        })));
        Ok(WorkerHandle::new(Uuid::new_v4(), rx, Box::new(FinishedProcess)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evals_do_not_share_logs() {
    let store = Arc::new(MemoryScriptStore::default());
    let runtime = Arc::new(StoreEchoRuntime {
        store: store.clone(),
    });
    let app = app_with(store.clone(), runtime, Duration::from_secs(5));

    let requests = (0..24).map(|i| {
        let app = app.clone();
        async move {
            let body = json!({ "code": format!("console.log('marker-{}-end')", i) });
            let response = app.oneshot(eval_request(body.to_string())).await.unwrap();
            (i, response.status(), body_json(response).await)
        }
    });

    for (i, status, body) in futures::future::join_all(requests).await {
        assert_eq!(status, StatusCode::OK);
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        let staged = logs[0]["args"][0].as_str().unwrap();
        assert!(staged.contains(&format!("marker-{}-end", i)));
        for other in (0..24).filter(|other| *other != i) {
            assert!(!staged.contains(&format!("marker-{}-end", other)));
        }
    }
    assert_eq!(store.len().await, 24);
}
