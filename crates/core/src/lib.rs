pub mod artifact;
pub mod config;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod metrics;
pub mod orchestrator;
pub mod testing;

pub use artifact::{ArtifactHandle, ArtifactReader, ArtifactRef, ArtifactStore, StoreError};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use error::{ErrorInfo, ErrorKind};
pub use extractor::{create_extractor, Extractor, ExtractorError, MediaMetadata};
pub use identity::{resolve, FormatRequest, IdentityError, JobKey, MediaKind, WorkSpec};
pub use orchestrator::{
    JobState, JobView, Orchestrator, OrchestratorStatus, SubmitError, WaitError, WaiterHandle,
};
