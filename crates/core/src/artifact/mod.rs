//! Artifact store: the on-disk area holding completed downloads.
//!
//! Layout under the configured root:
//! - `objects/<handle>`: published payloads
//! - `objects/<handle>.json`: sidecar [`ArtifactRef`] used to rebuild the index
//! - `staging/`: in-progress writes, renamed into `objects/` when complete
//! - `scratch/`: per-job working directories handed to the extractor
//!
//! Storage paths are derived only from opaque handles. The human readable
//! name travels as metadata and never touches the filesystem.

mod config;
mod error;
mod store;
mod types;

pub use config::StorageConfig;
pub use error::StoreError;
pub use store::{ArtifactLease, ArtifactReader, ArtifactStore, EncodeSink};
pub use types::{display_name, ArtifactHandle, ArtifactRef, StoreStats, SweepReport};
