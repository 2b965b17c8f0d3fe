//! Cluster bootstrap coordinator
//!
//! Every StatefulSet member runs the same pipeline:
//! - Wait for the local CouchDB to answer
//! - Stop if the cluster was already configured
//! - Read the expected member count from Kubernetes
//! - Elect the highest ordinal as forming node
//! - Forming node: run the `_cluster_setup` join protocol
//! - Park until shutdown

pub mod actions;
pub mod admin;
pub mod election;
pub mod formation;
pub mod lifecycle;
pub mod orchestrator;
pub mod readiness;

pub use actions::JoinAction;
pub use admin::{build_client, AdminApi, CouchAdmin};
pub use election::{elect, Cardinality, FormationRole, MemberIdentity};
pub use formation::FormationPlan;
pub use lifecycle::{Bootstrap, Outcome, Phase};
pub use orchestrator::{CardinalitySource, StatefulSetClient};
