//! StatefulSet replica count from the Kubernetes API

use crate::common::{Config, Error, Result};
use crate::coordinator::election::Cardinality;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Source of the expected cluster size
#[async_trait]
pub trait CardinalitySource: Send + Sync {
    async fn cardinality(&self) -> Result<Cardinality>;
}

#[derive(Debug, Deserialize)]
struct StatefulSetStatus {
    #[serde(default)]
    kind: Option<String>,
    spec: StatefulSetSpec,
}

#[derive(Debug, Deserialize)]
struct StatefulSetSpec {
    replicas: i64,
}

/// Reads `spec.replicas` of this pod's StatefulSet
pub struct StatefulSetClient {
    client: Client,
    status_url: String,
    token: Option<String>,
}

impl StatefulSetClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            status_url: status_url(
                &config.orchestrator.base_url,
                &config.namespace,
                &config.identity.group,
            ),
            token: config.orchestrator.token.clone(),
        }
    }
}

/// Status resource URL of the named StatefulSet
pub fn status_url(base_url: &str, namespace: &str, set_name: &str) -> String {
    format!(
        "{}/apis/apps/v1/namespaces/{}/statefulsets/{}/status",
        base_url.trim_end_matches('/'),
        namespace,
        set_name
    )
}

#[async_trait]
impl CardinalitySource for StatefulSetClient {
    async fn cardinality(&self) -> Result<Cardinality> {
        let mut request = self.client.get(&self.status_url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::debug!("{}", self.status_url);
            return Err(Error::Orchestrator {
                url: self.status_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: StatefulSetStatus = serde_json::from_str(&body)?;
        tracing::debug!(
            "{} reports {} replicas",
            parsed.kind.as_deref().unwrap_or("StatefulSet"),
            parsed.spec.replicas
        );
        Cardinality::new(parsed.spec.replicas)
    }
}
