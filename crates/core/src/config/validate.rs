use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.workers.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "workers.max_concurrent_jobs must be at least 1".to_string(),
        ));
    }

    if config.transcoder.monitor_join_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.monitor_join_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.transcoder.progress_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.progress_buffer must be at least 1".to_string(),
        ));
    }

    if config.events.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "events.buffer_size must be at least 1".to_string(),
        ));
    }

    Ok(())
}
