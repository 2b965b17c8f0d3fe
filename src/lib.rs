//! # couchdb-bootstrap
//!
//! Clustering sidecar for CouchDB running as a Kubernetes StatefulSet:
//! - No consensus protocol: the highest pod ordinal forms the cluster
//! - Cluster size read once from the StatefulSet status API
//! - `_users` check guards against re-forming a configured cluster
//! - Idempotent `_cluster_setup` calls, safe to repeat after a crash
//!
//! ## Architecture
//!
//! ```text
//!      Kubernetes API  (spec.replicas)
//!            │
//! ┌──────────▼──────────┐   enable_cluster / add_node / finish_cluster
//! │ couchdb-2 sidecar   │──────────────┐
//! │ (coordinator)       │              │ localhost:5984/_cluster_setup
//! └─────────────────────┘      ┌───────▼────────┐
//!                              │  couchdb-2     │──▶ couchdb-0, couchdb-1
//!                              └────────────────┘
//! ```
//!
//! ## Usage
//!
//! Run the `couchdb-bootstrap` binary as a sidecar container next to
//! CouchDB. It reads everything from the environment:
//!
//! ```bash
//! HOSTNAME=couchdb-2 \
//! COUCHDB_USER=admin COUCHDB_PASSWORD=secret \
//! HEADLESS_SERVICE_NAME=couchdb-internal \
//! LOG_LEVEL=info \
//! couchdb-bootstrap
//! ```

pub mod common;
pub mod coordinator;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::{Bootstrap, Outcome, Phase};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
