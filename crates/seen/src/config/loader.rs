use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SUPPORTED_VERSION: &str = "1.0";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.storage_directory.trim().is_empty() {
        return Err(invalid("storage_directory must not be empty"));
    }

    if config.worker_count == 0 {
        return Err(invalid("worker_count must be > 0"));
    }

    if config.queue_capacity < config.worker_count {
        return Err(invalid(format!(
            "queue_capacity ({}) must be at least worker_count ({})",
            config.queue_capacity, config.worker_count
        )));
    }

    let tools = &config.tools;
    if tools.frame_sample_rate == 0 {
        return Err(invalid("tools.frame_sample_rate must be > 0"));
    }

    for (name, value) in [
        ("ffmpeg", &tools.ffmpeg),
        ("prep_script", &tools.prep_script),
        ("blur_script", &tools.blur_script),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(format!("tools.{} must not be empty", name)));
        }
    }

    if config.logging.level.trim().is_empty() {
        return Err(invalid("logging.level must not be empty"));
    }

    Ok(())
}
