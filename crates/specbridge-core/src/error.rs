use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecBridgeError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("authentication failed for {0}: check your credentials")]
    Authentication(String),

    #[error("rate limit exceeded for {platform}{}", retry_hint(.retry_after))]
    RateLimit {
        platform: String,
        retry_after: Option<u64>,
    },

    #[error("adapter '{adapter}' error: {message}")]
    Adapter { adapter: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl SpecBridgeError {
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        SpecBridgeError::Adapter {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SpecBridgeError::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            SpecBridgeError::ConfigParse(_) => "CONFIG_PARSE_ERROR",
            SpecBridgeError::Authentication(_) => "AUTH_ERROR",
            SpecBridgeError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            SpecBridgeError::Adapter { .. } => "ADAPTER_ERROR",
            SpecBridgeError::Io(_) => "IO_ERROR",
            SpecBridgeError::Yaml(_) => "YAML_ERROR",
            SpecBridgeError::Json(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SpecBridgeError>;
