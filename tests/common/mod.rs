//! Shared harness for the HTTP integration tests.
//!
//! Builds the real router over an in-memory store and a scripted converter,
//! then drives it in-process with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use markerd::convert::{Conversion, Converter};
use markerd::error::ConvertError;
use markerd::server::{build_router, AppState};
use markerd::store::{JobStore, MemoryStore};
use markerd::CoordinatorConfig;

pub const BOUNDARY: &str = "markerd-test-boundary";

/// What the scripted converter should do after its delay.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed(String),
    Fail(String),
    /// Never return; only the runner deadline resolves the job.
    Hang,
}

pub struct FakeConverter {
    pub delay: Duration,
    pub outcome: Outcome,
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(&self, _req: Conversion<'_>) -> Result<String, ConvertError> {
        match &self.outcome {
            Outcome::Succeed(text) => {
                tokio::time::sleep(self.delay).await;
                Ok(text.clone())
            }
            Outcome::Fail(detail) => {
                tokio::time::sleep(self.delay).await;
                Err(ConvertError::Failed {
                    status: "exit 1".to_string(),
                    detail: detail.clone(),
                })
            }
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                unreachable!("hang converter should be cut off by the deadline")
            }
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// App with default config and a converter that succeeds quickly.
    pub fn new() -> Self {
        Self::with_converter(Outcome::Succeed("Hello".to_string()), Duration::from_millis(50))
    }

    pub fn with_converter(outcome: Outcome, delay: Duration) -> Self {
        Self::build(outcome, delay, |_| {})
    }

    pub fn build(
        outcome: Outcome,
        delay: Duration,
        tweak: impl FnOnce(&mut CoordinatorConfig),
    ) -> Self {
        Self::build_with_store(Arc::new(MemoryStore::new()), outcome, delay, tweak)
    }

    /// Like [`TestApp::build`], but over a caller-supplied store backend.
    pub fn build_with_store(
        store: Arc<dyn JobStore>,
        outcome: Outcome,
        delay: Duration,
        tweak: impl FnOnce(&mut CoordinatorConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = CoordinatorConfig {
            data_dir: dir.path().to_path_buf(),
            ..CoordinatorConfig::default()
        };
        tweak(&mut config);

        let converter = Arc::new(FakeConverter { delay, outcome });
        let state = AppState::new(store, converter, config);
        let router = build_router(state.clone());
        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn post_multipart(&self, uri: &str, body: Vec<u8>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Submit a PDF upload and return the new job id.
    pub async fn submit(&self, filename: &str, payload: &[u8], fields: &[(&str, &str)]) -> Uuid {
        let body = multipart_body(Some((filename, payload)), fields);
        let resp = self.post_multipart("/convert", body).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp).await;
        assert_eq!(json["accepted"], Value::Bool(true));
        json["id"].as_str().unwrap().parse().unwrap()
    }

    /// Poll until the job reports something other than `processing`, or
    /// panic after ~5 s.
    pub async fn poll_until_terminal(&self, id: Uuid) -> (StatusCode, Value) {
        for _ in 0..250 {
            let resp = self.get(&format!("/status/{id}")).await;
            let status = resp.status();
            let json = body_json(resp).await;
            if !(status == StatusCode::OK && json["status"] == "processing") {
                return (status, json);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {id} never left processing");
    }
}

/// Build a multipart/form-data body with optional file part plus text fields.
pub fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((filename, payload)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
