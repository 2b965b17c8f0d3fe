//! Cluster formation protocol
//!
//! Every call targets the forming node's own admin endpoint: CouchDB
//! assembles a cluster by telling one node about each peer, so peers only
//! need to be reachable, not configured.

use crate::common::config::BIND_ADDRESS;
use crate::common::{Config, Result};
use crate::coordinator::actions::JoinAction;
use crate::coordinator::admin::AdminApi;
use crate::coordinator::election::Cardinality;

/// Ordered list of actions issued by the forming node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormationPlan {
    actions: Vec<JoinAction>,
}

/// Local `enable_cluster`, issued by every member
pub fn enable_local(config: &Config, cardinality: Cardinality) -> JoinAction {
    JoinAction::EnableCluster {
        bind_address: BIND_ADDRESS.to_string(),
        credentials: config.credentials.clone(),
        node_count: cardinality.get(),
    }
}

impl FormationPlan {
    pub fn new(config: &Config, cardinality: Cardinality) -> Self {
        let mut actions = Vec::with_capacity(2 + 2 * cardinality.get() as usize);
        actions.push(enable_local(config, cardinality));

        for ordinal in cardinality.ordinals() {
            let peer = config.peer_address(ordinal);
            actions.push(JoinAction::EnableClusterAndAddNode {
                bind_address: BIND_ADDRESS.to_string(),
                credentials: config.credentials.clone(),
                node_count: cardinality.get(),
                port: config.target_port,
                remote_node: peer.clone(),
                remote_credentials: config.credentials.clone(),
            });
            actions.push(JoinAction::AddNode {
                host: peer,
                port: config.target_port,
                credentials: config.credentials.clone(),
            });
        }

        actions.push(JoinAction::FinishCluster);
        Self { actions }
    }

    pub fn actions(&self) -> &[JoinAction] {
        &self.actions
    }

    /// Apply every action in order, stopping at the first failure.
    pub async fn execute<A>(&self, api: &A) -> Result<usize>
    where
        A: AdminApi + ?Sized,
    {
        for action in &self.actions {
            if let JoinAction::EnableClusterAndAddNode { remote_node, .. } = action {
                tracing::info!("Adding {} to cluster", remote_node);
            }
            if let Err(e) = api.apply(action).await {
                tracing::error!("{} failed: {}", action, e);
                return Err(e);
            }
        }
        Ok(self.actions.len())
    }
}
