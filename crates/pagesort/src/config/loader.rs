use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let extractor = &config.extractor;
    if extractor.min_batch_size == 0 || extractor.min_batch_size > extractor.max_batch_size {
        return Err(ConfigError::Validation {
            message: format!(
                "Invalid batch bounds: min_batch_size {} must be between 1 and max_batch_size {}",
                extractor.min_batch_size, extractor.max_batch_size
            ),
        });
    }
    if extractor.batch_size == Some(0) {
        return Err(ConfigError::Validation {
            message: "batch_size must be positive".to_string(),
        });
    }
    if extractor.max_retries == 0 {
        return Err(ConfigError::Validation {
            message: "max_retries must be at least 1".to_string(),
        });
    }
    if extractor.timeout_secs == 0 || config.classifier.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "Timeouts must be positive".to_string(),
        });
    }

    let done = config.storage.done_directory.trim();
    if done.is_empty() || done.contains(['/', '\\']) || done == "." || done == ".." {
        return Err(ConfigError::Validation {
            message: format!(
                "done_directory must be a single directory name, got '{}'",
                config.storage.done_directory
            ),
        });
    }

    tracing_subscriber::EnvFilter::try_new(&config.logging.level).map_err(|e| {
        ConfigError::Validation {
            message: format!("Invalid logging level '{}': {}", config.logging.level, e),
        }
    })?;

    Ok(())
}
