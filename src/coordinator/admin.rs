//! CouchDB administrative API client

use crate::common::{Config, Credentials, Error, Result};
use crate::coordinator::actions::JoinAction;
use async_trait::async_trait;
use reqwest::Client;

/// Operations the bootstrap needs from the local CouchDB
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Unauthenticated probe; `false` covers both errors and non-success
    async fn is_ready(&self) -> bool;

    /// Whether the `_users` system database already exists
    async fn is_configured(&self) -> Result<bool>;

    /// POST one `_cluster_setup` action, failing on any non-success status
    async fn apply(&self, action: &JoinAction) -> Result<()>;
}

/// Build the HTTP client shared by every remote call.
///
/// Trusts the configured Kubernetes CA in addition to the system roots.
pub fn build_client(config: &Config) -> Result<Client> {
    let mut builder = Client::builder().timeout(config.request_timeout);

    if let Some(path) = &config.orchestrator.ca_certificate {
        let pem = std::fs::read(path).map_err(|source| Error::ReadFile {
            path: path.clone(),
            source,
        })?;
        let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            Error::InvalidConfig(format!("invalid CA certificate {}: {e}", path.display()))
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    Ok(builder.build()?)
}

pub struct CouchAdmin {
    client: Client,
    service_url: String,
    admin_url: String,
    credentials: Credentials,
}

impl CouchAdmin {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            admin_url: config.admin_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
        }
    }

    fn setup_url(&self) -> String {
        format!("{}/_cluster_setup", self.admin_url)
    }
}

#[async_trait]
impl AdminApi for CouchAdmin {
    async fn is_ready(&self) -> bool {
        match self.client.get(&self.service_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::trace!("CouchDB not reachable yet: {}", e);
                false
            }
        }
    }

    async fn is_configured(&self) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/_users", self.service_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        tracing::debug!("_users check returned {}", resp.status());
        Ok(resp.status().is_success())
    }

    async fn apply(&self, action: &JoinAction) -> Result<()> {
        let url = self.setup_url();
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(action)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!("{} response: {} {}", action.name(), status, body);

        if !status.is_success() {
            return Err(Error::ActionRejected {
                action: action.name(),
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
