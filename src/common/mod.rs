//! Common utilities and types shared across couchdb-bootstrap

pub mod config;
pub mod discovery;
pub mod error;

pub use config::{Config, Credentials, EnvSettings, OrchestratorConfig};
pub use discovery::ServiceEndpoint;
pub use error::{Error, Result};
