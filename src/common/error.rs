//! Error types for couchdb-bootstrap

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Service discovery failed: {0}")]
    Discovery(String),

    #[error("Environment error: {0}")]
    Environment(#[from] config::ConfigError),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Remote API Errors ===
    #[error("Orchestrator request to {url} failed with status {status}: {body}")]
    Orchestrator {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid replica count: {0}")]
    InvalidCardinality(i64),

    #[error("{action} rejected by {endpoint} with status {status}: {body}")]
    ActionRejected {
        action: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },
}

impl Error {
    /// Is this a problem with the environment rather than with a remote API?
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ReadFile { .. }
                | Error::InvalidConfig(_)
                | Error::Discovery(_)
                | Error::Environment(_)
                | Error::Pattern(_)
        )
    }

    /// Short category label used when reporting a fatal error
    pub fn category(&self) -> &'static str {
        if self.is_configuration() {
            "configuration error"
        } else {
            "remote call failed"
        }
    }
}
