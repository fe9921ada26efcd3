use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker pool, queue and retry bounds are usable
/// - Artifacts outlive the job records that reference them
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.workers == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.workers must be at least 1".to_string(),
        ));
    }
    if orchestrator.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.queue_capacity must be at least 1".to_string(),
        ));
    }
    if orchestrator.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if orchestrator.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.retry.backoff_multiplier must be >= 1.0".to_string(),
        ));
    }

    if config.storage.retention_secs < orchestrator.job_retention_secs {
        return Err(ConfigError::ValidationError(format!(
            "storage.retention_secs ({}) must be >= orchestrator.job_retention_secs ({})",
            config.storage.retention_secs, orchestrator.job_retention_secs
        )));
    }

    Ok(())
}
