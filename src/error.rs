use thiserror::Error;

#[derive(Error, Debug)]
pub enum EcsInfoError {
    #[error("Listing failed ({operation}): {message}")]
    Listing {
        operation: &'static str,
        message: String,
    },

    #[error("Describe failed ({operation}): {message}")]
    Describe {
        operation: &'static str,
        message: String,
    },

    #[error("Load balancer health query failed for {load_balancer}: {message}")]
    Enrichment {
        load_balancer: String,
        message: String,
    },

    #[error("No cluster matches {0}")]
    NotFound(String),

    #[error("Invalid {kind} record {id}: {reason}")]
    InvalidRecord {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Invalid cluster name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to parse document: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EcsInfoError {
    pub(crate) fn invalid(kind: &'static str, id: &str, reason: impl Into<String>) -> Self {
        EcsInfoError::InvalidRecord {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EcsInfoError>;
