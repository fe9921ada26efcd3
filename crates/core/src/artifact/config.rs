//! Configuration for the artifact store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the artifact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory. Nothing outside it is ever read or written.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Artifacts older than this are removed by the sweep (seconds).
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// Buffer size for streamed copies (bytes).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_root() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_retention() -> u64 {
    86_400 // 24 hours
}

fn default_buffer_size() -> usize {
    64 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            retention_secs: default_retention(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl StorageConfig {
    /// Sets the root directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the retention window.
    pub fn with_retention_secs(mut self, secs: u64) -> Self {
        self.retention_secs = secs;
        self
    }
}
