#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use qedit_api::config::ServerConfig;
use qedit_api::router::build_app_router;
use qedit_api::state::AppState;
use qedit_core::api_keys::hash_api_key;
use qedit_core::job::JobStatus;
use qedit_core::preset::Preset;
use qedit_core::prompt_filter::PromptFilterConfig;
use qedit_pipeline::{EngineError, GenerateRequest, InferenceEngine};
use qedit_queue::QueueConfig;

pub const TEST_API_KEY: &str = "test-key-0123456789";

/// Smallest byte string `image::guess_format` recognises as PNG.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// In-memory engine. Returns [`PNG_BYTES`] for every generation; with a
/// gate, each generation waits for a permit from [`FakeEngine::release`].
/// Loads take `load_delay`.
#[derive(Default)]
pub struct FakeEngine {
    gate: Option<Semaphore>,
    load_delay: Duration,
}

impl FakeEngine {
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        })
    }

    pub fn slow_load(load_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            load_delay,
            ..Default::default()
        })
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    async fn load(&self, _preset: Preset) -> Result<(), EngineError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok(())
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<Vec<u8>, EngineError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        Ok(PNG_BYTES.to_vec())
    }
}

/// Build a test `ServerConfig` writing outputs under `output_dir`.
pub fn test_config(output_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        api_key_hash: hash_api_key(TEST_API_KEY),
        api_key_is_default: false,
        output_dir: output_dir.to_path_buf(),
        max_upload_bytes: 1024 * 1024,
        engine_url: "http://127.0.0.1:1".to_string(),
        queue: QueueConfig {
            max_size: 10,
            ..Default::default()
        },
        prompt_filter: PromptFilterConfig::default(),
    }
}

/// Everything a test needs; keep `_dir` alive for the output directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub _dir: tempfile::TempDir,
}

/// Build the full application router with all middleware layers around
/// `engine`. The queue worker is NOT started.
pub fn build_test_app_with(
    engine: Arc<dyn InferenceEngine>,
    tweak: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    tweak(&mut config);

    let state = AppState::new(config.clone(), engine);
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        _dir: dir,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(FakeEngine::default()), |_| {})
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_authed(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("x-api-key", TEST_API_KEY)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_authed(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::post(uri)
        .header("x-api-key", TEST_API_KEY)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "qedit-test-boundary";

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// The usual valid submission: a PNG and an instruction.
    pub fn valid(instruction: &str) -> Self {
        Self::new()
            .file("image", "face.png", PNG_BYTES)
            .text("instruction", instruction)
    }

    pub fn into_request(mut self, api_key: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let mut builder = Request::post("/api/v1/submit").header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

pub async fn submit(app: &Router, form: Form) -> Response<Body> {
    send(app, form.into_request(Some(TEST_API_KEY))).await
}

/// Submit and return the new job id, asserting acceptance.
pub async fn submit_ok(app: &Router, instruction: &str) -> String {
    let response = submit(app, Form::valid(instruction)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Poll `/status/{id}` until it reports `status`, panicking after 5 seconds.
pub async fn wait_for_status(app: &Router, job_id: &str, status: JobStatus) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let response = get_authed(app, &format!("/api/v1/status/{job_id}")).await;
        let json = body_json(response).await;
        if json["status"] == status.as_str() {
            return json;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {status}; last: {json}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
