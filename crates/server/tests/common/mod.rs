//! Common test utilities for API testing with a mock extractor.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real orchestrator and artifact store (in a temp dir) with a
//! [`MockExtractor`] standing in for `yt-dlp`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reelfetch_core::artifact::StorageConfig;
use reelfetch_core::orchestrator::{OrchestratorConfig, RetryConfig};
use reelfetch_core::testing::MockExtractor;
use reelfetch_core::{ArtifactStore, Config, Orchestrator};
use reelfetch_server::state::AppState;

/// Test fixture for API testing with a mock extractor.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_download() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/download", json!({
///         "url": "https://youtu.be/dQw4w9WgXcQ",
///         "type": "audio",
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock extractor - control executions and metadata
    pub extractor: Arc<MockExtractor>,
    pub orchestrator: Arc<Orchestrator>,
    /// Temporary directory holding the artifact store
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Raw response, for non-JSON endpoints
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom limits.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let extractor = Arc::new(MockExtractor::new());

        let config = Config {
            storage: StorageConfig::default().with_root(temp_dir.path().join("store")),
            orchestrator: OrchestratorConfig {
                workers: test_config.workers,
                queue_capacity: test_config.queue_capacity,
                wait_timeout_secs: test_config.wait_timeout_secs,
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_delay_ms: 10,
                    max_delay_ms: 50,
                    backoff_multiplier: 2.0,
                },
                ..Default::default()
            },
            ..Default::default()
        };

        let store = Arc::new(
            ArtifactStore::open(config.storage.clone())
                .await
                .expect("Failed to open artifact store"),
        );
        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&extractor) as Arc<dyn reelfetch_core::Extractor>,
            store,
        ));
        orchestrator.start().await;

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = reelfetch_server::api::create_router(state);

        Self {
            router,
            extractor,
            orchestrator,
            temp_dir,
        }
    }

    /// Send a GET request to the test router.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a GET request and keep the raw body and headers.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }

    /// Poll a job until it reaches `state` or give up after two seconds.
    pub async fn wait_for_job_state(&self, key: &str, state: &str) -> TestResponse {
        let path = format!("/api/v1/jobs/{}", key);
        for _ in 0..200 {
            let response = self.get(&path).await;
            if response.body["state"] == state {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached state {}", key, state);
    }

    /// Send a request to the test router.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub wait_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 8,
            wait_timeout_secs: 5,
        }
    }
}

impl TestConfig {
    /// One worker and a single pending slot.
    pub fn tiny() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1,
            wait_timeout_secs: 1,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
