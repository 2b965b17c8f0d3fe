//! `_cluster_setup` actions
//!
//! CouchDB uses one endpoint for every setup step, discriminated by the
//! `action` field. Two of our actions share `enable_cluster` and differ only
//! by the presence of the remote node fields.

use crate::common::Credentials;
use serde::{Deserialize, Serialize};

/// One idempotent cluster formation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SetupRequest", from = "SetupRequest")]
pub enum JoinAction {
    /// Put the target node into cluster mode
    EnableCluster {
        bind_address: String,
        credentials: Credentials,
        node_count: u32,
    },

    /// Put a remote node into cluster mode, via the forming node
    EnableClusterAndAddNode {
        bind_address: String,
        credentials: Credentials,
        node_count: u32,
        port: u16,
        remote_node: String,
        remote_credentials: Credentials,
    },

    AddNode {
        host: String,
        port: u16,
        credentials: Credentials,
    },

    /// Commit the topology
    FinishCluster,
}

impl JoinAction {
    pub fn name(&self) -> &'static str {
        match self {
            JoinAction::EnableCluster { .. } => "EnableCluster",
            JoinAction::EnableClusterAndAddNode { .. } => "EnableClusterAndAddNode",
            JoinAction::AddNode { .. } => "AddNode",
            JoinAction::FinishCluster => "FinishCluster",
        }
    }
}

impl std::fmt::Display for JoinAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinAction::EnableClusterAndAddNode { remote_node, .. } => {
                write!(f, "{} {}", self.name(), remote_node)
            }
            JoinAction::AddNode { host, port, .. } => write!(f, "{} {}:{}", self.name(), host, port),
            _ => f.write_str(self.name()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum SetupRequest {
    EnableCluster {
        bind_address: String,
        username: String,
        password: String,
        node_count: u32,
        #[serde(flatten)]
        remote: Option<RemoteNode>,
    },
    AddNode {
        host: String,
        port: u16,
        username: String,
        password: String,
    },
    FinishCluster,
}

#[derive(Serialize, Deserialize)]
struct RemoteNode {
    port: u16,
    remote_node: String,
    remote_current_user: String,
    remote_current_password: String,
}

impl From<JoinAction> for SetupRequest {
    fn from(action: JoinAction) -> Self {
        match action {
            JoinAction::EnableCluster {
                bind_address,
                credentials,
                node_count,
            } => SetupRequest::EnableCluster {
                bind_address,
                username: credentials.username,
                password: credentials.password,
                node_count,
                remote: None,
            },
            JoinAction::EnableClusterAndAddNode {
                bind_address,
                credentials,
                node_count,
                port,
                remote_node,
                remote_credentials,
            } => SetupRequest::EnableCluster {
                bind_address,
                username: credentials.username,
                password: credentials.password,
                node_count,
                remote: Some(RemoteNode {
                    port,
                    remote_node,
                    remote_current_user: remote_credentials.username,
                    remote_current_password: remote_credentials.password,
                }),
            },
            JoinAction::AddNode {
                host,
                port,
                credentials,
            } => SetupRequest::AddNode {
                host,
                port,
                username: credentials.username,
                password: credentials.password,
            },
            JoinAction::FinishCluster => SetupRequest::FinishCluster,
        }
    }
}

impl From<SetupRequest> for JoinAction {
    fn from(request: SetupRequest) -> Self {
        match request {
            SetupRequest::EnableCluster {
                bind_address,
                username,
                password,
                node_count,
                remote: None,
            } => JoinAction::EnableCluster {
                bind_address,
                credentials: Credentials::new(username, password),
                node_count,
            },
            SetupRequest::EnableCluster {
                bind_address,
                username,
                password,
                node_count,
                remote: Some(remote),
            } => JoinAction::EnableClusterAndAddNode {
                bind_address,
                credentials: Credentials::new(username, password),
                node_count,
                port: remote.port,
                remote_node: remote.remote_node,
                remote_credentials: Credentials::new(
                    remote.remote_current_user,
                    remote.remote_current_password,
                ),
            },
            SetupRequest::AddNode {
                host,
                port,
                username,
                password,
            } => JoinAction::AddNode {
                host,
                port,
                credentials: Credentials::new(username, password),
            },
            SetupRequest::FinishCluster => JoinAction::FinishCluster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("admin", "password")
    }

    #[test]
    fn test_enable_cluster_wire_format() {
        let action = JoinAction::EnableCluster {
            bind_address: "0.0.0.0".into(),
            credentials: creds(),
            node_count: 3,
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "action": "enable_cluster",
                "bind_address": "0.0.0.0",
                "username": "admin",
                "password": "password",
                "node_count": 3
            })
        );
    }

    #[test]
    fn test_remote_enable_wire_format() {
        let action = JoinAction::EnableClusterAndAddNode {
            bind_address: "0.0.0.0".into(),
            credentials: creds(),
            node_count: 3,
            port: 5984,
            remote_node: "couchdb-1.couchdb-internal.default.svc.cluster.local".into(),
            remote_credentials: Credentials::new("remote", "secret"),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "enable_cluster",
                "bind_address": "0.0.0.0",
                "username": "admin",
                "password": "password",
                "node_count": 3,
                "port": 5984,
                "remote_node": "couchdb-1.couchdb-internal.default.svc.cluster.local",
                "remote_current_user": "remote",
                "remote_current_password": "secret"
            })
        );
    }

    #[test]
    fn test_add_node_and_finish_wire_format() {
        let add = JoinAction::AddNode {
            host: "couchdb-0.couchdb-internal.default.svc.cluster.local".into(),
            port: 5984,
            credentials: creds(),
        };
        assert_eq!(
            serde_json::to_value(&add).unwrap(),
            json!({
                "action": "add_node",
                "host": "couchdb-0.couchdb-internal.default.svc.cluster.local",
                "port": 5984,
                "username": "admin",
                "password": "password"
            })
        );
        assert_eq!(
            serde_json::to_value(&JoinAction::FinishCluster).unwrap(),
            json!({ "action": "finish_cluster" })
        );
    }

    #[test]
    fn test_actions_parse_back() {
        let actions = vec![
            JoinAction::EnableCluster {
                bind_address: "0.0.0.0".into(),
                credentials: creds(),
                node_count: 2,
            },
            JoinAction::EnableClusterAndAddNode {
                bind_address: "0.0.0.0".into(),
                credentials: creds(),
                node_count: 2,
                port: 6984,
                remote_node: "peer".into(),
                remote_credentials: Credentials::new("u", "p"),
            },
            JoinAction::AddNode {
                host: "peer".into(),
                port: 6984,
                credentials: creds(),
            },
            JoinAction::FinishCluster,
        ];

        for action in actions {
            let body = serde_json::to_string(&action).unwrap();
            let parsed: JoinAction = serde_json::from_str(&body).unwrap();
            assert_eq!(parsed, action, "{body}");
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = serde_json::from_value::<JoinAction>(json!({ "action": "remove_node" }));
        assert!(err.is_err());
    }

    #[test]
    fn test_display() {
        let add = JoinAction::AddNode {
            host: "peer".into(),
            port: 5984,
            credentials: creds(),
        };
        assert_eq!(add.to_string(), "AddNode peer:5984");
        assert_eq!(JoinAction::FinishCluster.to_string(), "FinishCluster");
    }
}
