//! In-process API tests against a real orchestrator and store with a mock
//! extractor.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestConfig, TestFixture};
use reelfetch_core::{resolve, ExtractorError, FormatRequest, MediaKind};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const SHORT_URL: &str = "https://youtu.be/dQw4w9WgXcQ?t=42";

// =============================================================================
// Health, config, stats
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_reports_effective_limits() {
    let fixture = TestFixture::with_config(TestConfig::tiny()).await;
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["orchestrator"]["workers"], 1);
    assert_eq!(response.body["orchestrator"]["queue_capacity"], 1);
    assert_eq!(response.body["extractor"]["backend"], "yt_dlp");
}

#[tokio::test]
async fn test_stats_reports_orchestrator_and_store() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/stats").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["orchestrator"]["running"], true);
    assert_eq!(response.body["orchestrator"]["workers"], 2);
    assert_eq!(response.body["store"]["artifacts"], 0);
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_info_returns_metadata() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/info", json!({ "url": SHORT_URL }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["url"], WATCH_URL);
    assert_eq!(response.body["title"], "Mock Video");
    assert_eq!(response.body["author"], "Mock Channel");
    assert_eq!(response.body["duration_seconds"], 212);
    let encodings = response.body["encodings"].as_array().unwrap();
    assert_eq!(encodings.len(), 2);
    assert_eq!(encodings[1]["id"], "22");
    assert_eq!(encodings[1]["resolution_or_bitrate"], "1280x720");
}

#[tokio::test]
async fn test_info_rejects_foreign_url() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/info", json!({ "url": "https://example.com/watch?v=dQw4w9WgXcQ" }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_info_maps_extractor_failure() {
    let fixture = TestFixture::new().await;
    fixture
        .extractor
        .set_next_metadata_error(ExtractorError::UnsupportedSource("live stream".into()))
        .await;

    let response = fixture
        .post("/api/v1/info", json!({ "url": WATCH_URL }))
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["kind"], "unsupported_source");
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn test_download_accepted_then_completes() {
    let fixture = TestFixture::new().await;
    fixture.extractor.hold().await;

    let response = fixture
        .post("/api/v1/download", json!({ "url": WATCH_URL, "type": "video" }))
        .await;

    assert_status!(response, StatusCode::ACCEPTED);
    let key = response.body["key"].as_str().unwrap().to_string();
    assert_eq!(response.body["status_url"], format!("/api/v1/jobs/{}", key));
    assert!(response.body.get("download_url").is_none());

    fixture.extractor.release().await;
    let job = fixture.wait_for_job_state(&key, "completed").await;

    assert_eq!(job.body["media_kind"], "video");
    assert_eq!(job.body["encoding"], "video/best");
    assert_eq!(job.body["artifact"]["display_name"], "Mock Video.mp4");
    let download_url = job.body["download_url"].as_str().unwrap().to_string();

    let file = fixture.get_raw(&download_url).await;
    assert_eq!(file.status, StatusCode::OK);
    assert_eq!(file.body.as_ref(), b"mock media payload");
    assert_eq!(file.headers["content-type"], "video/mp4");
    let disposition = file.headers["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("filename=\"Mock Video.mp4\""));
}

#[tokio::test]
async fn test_download_wait_returns_artifact() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/download",
            json!({ "url": WATCH_URL, "type": "audio", "wait": true }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"], "completed");
    assert_eq!(response.body["filename"], "Mock Video.mp3");
    assert_eq!(response.body["size"], 18);
    assert_eq!(response.body["artifact"]["media_kind"], "audio");

    let file = fixture
        .get_raw(response.body["download_url"].as_str().unwrap())
        .await;
    assert_eq!(file.status, StatusCode::OK);
    assert_eq!(file.headers["content-type"], "audio/mpeg");
}

#[tokio::test]
async fn test_equivalent_urls_share_one_execution() {
    let fixture = TestFixture::new().await;
    fixture.extractor.hold().await;

    let first = fixture
        .post("/api/v1/download", json!({ "url": WATCH_URL, "type": "video" }))
        .await;
    let second = fixture
        .post("/api/v1/download", json!({ "url": SHORT_URL, "type": "video" }))
        .await;

    assert_status!(first, StatusCode::ACCEPTED);
    assert_status!(second, StatusCode::ACCEPTED);
    assert_eq!(first.body["key"], second.body["key"]);

    fixture.extractor.release().await;
    let key = first.body["key"].as_str().unwrap();
    fixture.wait_for_job_state(key, "completed").await;

    assert_eq!(fixture.extractor.invocation_count(), 1);
}

#[tokio::test]
async fn test_explicit_format_is_a_distinct_job() {
    let fixture = TestFixture::new().await;

    let best = fixture
        .post("/api/v1/download", json!({ "url": WATCH_URL, "type": "video", "wait": true }))
        .await;
    let explicit = fixture
        .post(
            "/api/v1/download",
            json!({ "url": WATCH_URL, "type": "video", "format_id": "22", "wait": true }),
        )
        .await;

    assert_status!(best, StatusCode::OK);
    assert_status!(explicit, StatusCode::OK);
    assert_ne!(best.body["key"], explicit.body["key"]);
    assert_eq!(fixture.extractor.invocation_count(), 2);
}

#[tokio::test]
async fn test_download_rejects_bad_format() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            "/api/v1/download",
            json!({ "url": WATCH_URL, "type": "video", "format_id": "../../x" }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["kind"], "invalid_input");
    assert_eq!(fixture.extractor.invocation_count(), 0);
}

#[tokio::test]
async fn test_download_overloaded() {
    let fixture = TestFixture::with_config(TestConfig::tiny()).await;
    fixture.extractor.hold().await;

    let running = fixture
        .post(
            "/api/v1/download",
            json!({ "url": "https://youtu.be/aaaaaaaaaaa", "type": "video" }),
        )
        .await;
    assert_status!(running, StatusCode::ACCEPTED);
    fixture.extractor.wait_for_invocations(1).await;

    let queued = fixture
        .post(
            "/api/v1/download",
            json!({ "url": "https://youtu.be/bbbbbbbbbbb", "type": "video" }),
        )
        .await;
    assert_status!(queued, StatusCode::ACCEPTED);

    let rejected = fixture
        .post(
            "/api/v1/download",
            json!({ "url": "https://youtu.be/ccccccccccc", "type": "video" }),
        )
        .await;
    assert_status!(rejected, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(rejected.body["kind"], "overloaded");

    // Joining an existing job is never rejected
    let joined = fixture
        .post(
            "/api/v1/download",
            json!({ "url": "https://youtu.be/bbbbbbbbbbb", "type": "video" }),
        )
        .await;
    assert_status!(joined, StatusCode::ACCEPTED);

    fixture.extractor.release().await;
}

#[tokio::test]
async fn test_download_failure_is_reported() {
    let fixture = TestFixture::new().await;
    fixture
        .extractor
        .push_failure(ExtractorError::Decode("corrupt stream".into()))
        .await;

    let response = fixture
        .post(
            "/api/v1/download",
            json!({ "url": WATCH_URL, "type": "video", "wait": true }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["kind"], "extraction_failed");

    // The failure stays on the job record
    let resolved = resolve(WATCH_URL, &FormatRequest::best(MediaKind::Video)).unwrap();
    let job = fixture.get(&format!("/api/v1/jobs/{}", resolved.key)).await;
    assert_status!(job, StatusCode::OK);
    assert_eq!(job.body["state"], "failed");
    assert_eq!(job.body["error"]["kind"], "extraction_failed");
    assert_eq!(job.body["attempt"], 1);
    assert_eq!(fixture.extractor.invocation_count(), 1);
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn test_job_lookup_errors() {
    let fixture = TestFixture::new().await;

    let bad = fixture.get("/api/v1/jobs/not-a-key").await;
    assert_status!(bad, StatusCode::BAD_REQUEST);

    let unknown = fixture
        .get("/api/v1/jobs/0123456789abcdef0123456789abcdef")
        .await;
    assert_status!(unknown, StatusCode::NOT_FOUND);

    let unknown_wait = fixture
        .get("/api/v1/jobs/0123456789abcdef0123456789abcdef/wait")
        .await;
    assert_status!(unknown_wait, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_job_wait_times_out_then_completes() {
    let fixture = TestFixture::new().await;
    fixture.extractor.hold().await;

    let response = fixture
        .post("/api/v1/download", json!({ "url": WATCH_URL, "type": "audio" }))
        .await;
    let key = response.body["key"].as_str().unwrap().to_string();
    fixture.extractor.wait_for_invocations(1).await;

    let pending = fixture
        .get(&format!("/api/v1/jobs/{}/wait?timeout_secs=0", key))
        .await;
    assert_status!(pending, StatusCode::ACCEPTED);
    assert_eq!(pending.body["state"], "running");
    assert_eq!(pending.body["attempt"], 1);

    fixture.extractor.release().await;
    let done = fixture
        .get(&format!("/api/v1/jobs/{}/wait?timeout_secs=5", key))
        .await;
    assert_status!(done, StatusCode::OK);
    assert_eq!(done.body["state"], "completed");
    assert!(done.body["download_url"].is_string());
}

#[tokio::test]
async fn test_retried_job_reports_attempts() {
    let fixture = TestFixture::new().await;
    fixture
        .extractor
        .push_failure(ExtractorError::Network("connection reset".into()))
        .await;

    let response = fixture
        .post(
            "/api/v1/download",
            json!({ "url": WATCH_URL, "type": "video", "wait": true }),
        )
        .await;
    assert_status!(response, StatusCode::OK);

    let key = response.body["key"].as_str().unwrap();
    let job = fixture.get(&format!("/api/v1/jobs/{}", key)).await;
    assert_eq!(job.body["state"], "completed");
    assert_eq!(job.body["attempt"], 2);
}

// =============================================================================
// Artifact serving
// =============================================================================

#[tokio::test]
async fn test_download_rejects_malformed_handle() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/downloads/..%2F..%2Fetc%2Fpasswd").await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.get("/downloads/not-a-handle").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_unknown_handle() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .get("/downloads/0123456789abcdef0123456789abcdef")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let response = fixture.get_raw("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);

    let text = String::from_utf8(response.body.to_vec()).unwrap();
    assert!(text.contains("reelfetch_http_requests_total"));
    assert!(text.contains("reelfetch_orchestrator_running"));
    assert!(text.contains("reelfetch_jobs_by_state"));
}
