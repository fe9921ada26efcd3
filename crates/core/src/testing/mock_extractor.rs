//! Mock extractor for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};

use crate::artifact::EncodeSink;
use crate::extractor::{EncodedFile, Extractor, ExtractorError, MediaMetadata};
use crate::identity::{MediaKind, WorkSpec};

/// Mock implementation of the Extractor trait.
///
/// Provides controllable behavior for testing:
/// - Script failures for upcoming executions (consumed in order)
/// - Hold executions behind a gate until the test releases them
/// - Count and record executions
///
/// Executions that are not scripted to fail write `payload` into the sink
/// as `media.mp4` (video) or `media.mp3` (audio).
///
/// # Example
///
/// ```rust,ignore
/// use reelfetch_core::testing::MockExtractor;
///
/// let extractor = MockExtractor::new();
/// extractor.push_failure(ExtractorError::Network("reset".into())).await;
/// extractor.hold().await;
///
/// // ... submit jobs, assert they are running ...
///
/// extractor.release().await;
/// assert_eq!(extractor.invocation_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockExtractor {
    /// Scripted failures, consumed one per execution.
    failures: Arc<Mutex<VecDeque<ExtractorError>>>,
    /// Executions performed.
    recorded: Arc<RwLock<Vec<WorkSpec>>>,
    /// Number of executions started.
    invocations: watch::Sender<usize>,
    /// Executions block while this is false.
    gate: watch::Sender<bool>,
    /// Bytes written for successful executions.
    payload: Arc<RwLock<Vec<u8>>>,
    /// Title reported for successful executions.
    title: Arc<RwLock<Option<String>>>,
    /// Simulated execution time.
    delay: Arc<RwLock<Duration>>,
    metadata: Arc<RwLock<MediaMetadata>>,
    next_metadata_error: Arc<Mutex<Option<ExtractorError>>>,
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    /// Create a new mock extractor with an open gate.
    pub fn new() -> Self {
        Self {
            failures: Arc::new(Mutex::new(VecDeque::new())),
            recorded: Arc::new(RwLock::new(Vec::new())),
            invocations: watch::Sender::new(0),
            gate: watch::Sender::new(true),
            payload: Arc::new(RwLock::new(b"mock media payload".to_vec())),
            title: Arc::new(RwLock::new(Some("Mock Video".to_string()))),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            metadata: Arc::new(RwLock::new(super::fixtures::media_metadata())),
            next_metadata_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Make the next unscripted execution fail with `error`.
    pub async fn push_failure(&self, error: ExtractorError) {
        self.failures.lock().await.push_back(error);
    }

    /// Block executions until [`release`](Self::release) is called.
    pub async fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held and future executions proceed.
    pub async fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Number of executions started so far.
    pub fn invocation_count(&self) -> usize {
        *self.invocations.borrow()
    }

    /// Wait until at least `count` executions have started.
    pub async fn wait_for_invocations(&self, count: usize) {
        let mut rx = self.invocations.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    /// Work specs of all executions, in start order.
    pub async fn recorded_work(&self) -> Vec<WorkSpec> {
        self.recorded.read().await.clone()
    }

    pub async fn set_payload(&self, payload: impl Into<Vec<u8>>) {
        *self.payload.write().await = payload.into();
    }

    pub async fn set_title(&self, title: Option<String>) {
        *self.title.write().await = title;
    }

    /// Set the simulated execution time.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    pub async fn set_metadata(&self, metadata: MediaMetadata) {
        *self.metadata.write().await = metadata;
    }

    /// Configure the next metadata lookup to fail with the given error.
    pub async fn set_next_metadata_error(&self, error: ExtractorError) {
        *self.next_metadata_error.lock().await = Some(error);
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_metadata(&self, _url: &str) -> Result<MediaMetadata, ExtractorError> {
        if let Some(error) = self.next_metadata_error.lock().await.take() {
            return Err(error);
        }
        Ok(self.metadata.read().await.clone())
    }

    async fn fetch_and_encode(
        &self,
        work: &WorkSpec,
        sink: &EncodeSink,
    ) -> Result<EncodedFile, ExtractorError> {
        self.recorded.write().await.push(work.clone());
        self.invocations.send_modify(|n| *n += 1);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        let extension = match work.encoding.kind {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        };
        let path = sink.dir().join(format!("media.{extension}"));
        let payload = self.payload.read().await.clone();
        tokio::fs::write(&path, &payload).await?;

        Ok(EncodedFile {
            path,
            bytes_written: payload.len() as u64,
            title: self.title.read().await.clone(),
        })
    }

    async fn validate(&self) -> Result<(), ExtractorError> {
        Ok(())
    }
}
