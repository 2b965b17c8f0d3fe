//! Configuration for the bootstrap sidecar
//!
//! Everything is read from the environment (and the mounted service account
//! directory) exactly once at startup, then passed around by reference.

use crate::common::discovery;
use crate::common::{Error, Result};
use crate::coordinator::election::MemberIdentity;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Mounted Kubernetes service account directory
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

pub const DEFAULT_HEADLESS_SERVICE: &str = "couchdb-internal";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "password";

/// Address CouchDB nodes bind their cluster interface to
pub const BIND_ADDRESS: &str = "0.0.0.0";

/// DNS suffix of in-cluster service names
pub const CLUSTER_DOMAIN: &str = "svc.cluster.local";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const READINESS_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of the process environment, keyed by variable name
pub fn environment() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Recognised environment variables, as set (empty values count as unset)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    pub hostname: Option<String>,
    pub set_name: Option<String>,
    pub headless_service_name: Option<String>,
    pub namespace: Option<String>,
    pub couchdb_user: Option<String>,
    pub couchdb_password: Option<String>,
    pub log_level: Option<String>,
    pub ca_certificate_path: Option<String>,
    pub token: Option<String>,
    pub kubernetes_service_host: Option<String>,
    pub kubernetes_service_port: Option<String>,
}

impl EnvSettings {
    pub fn from_vars(vars: &BTreeMap<String, String>) -> Result<Self> {
        let source: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let settings = ::config::Config::builder()
            .add_source(
                ::config::Environment::default()
                    .source(Some(source))
                    .ignore_empty(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Log verbosity from `LOG_LEVEL`; anything unrecognised means warn
    pub fn log_filter(&self) -> LevelFilter {
        match self.log_level.as_deref().map(str::to_lowercase).as_deref() {
            Some("debug") => LevelFilter::DEBUG,
            Some("info") => LevelFilter::INFO,
            Some("error") | Some("fatal") => LevelFilter::ERROR,
            _ => LevelFilter::WARN,
        }
    }
}

/// CouchDB admin credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Kubernetes API access
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// e.g. `https://10.96.0.1:443`
    pub base_url: String,

    /// Bearer token; requests are anonymous without one
    pub token: Option<String>,

    /// Extra root certificate (PEM) trusted by the HTTP client
    pub ca_certificate: Option<PathBuf>,
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("ca_certificate", &self.ca_certificate)
            .finish()
    }
}

/// Resolved bootstrap configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Who this pod is within the StatefulSet
    pub identity: MemberIdentity,

    /// Headless service giving each pod a stable DNS name
    pub headless_service: String,

    pub namespace: String,

    pub credentials: Credentials,

    /// Kubernetes service URL, used for the readiness probe and `_users` check
    pub service_url: String,

    /// Local admin endpoint receiving `_cluster_setup` calls
    pub admin_url: String,

    /// Port CouchDB listens on in every pod
    pub target_port: u16,

    pub orchestrator: OrchestratorConfig,

    pub request_timeout: Duration,

    pub readiness_interval: Duration,
}

impl Config {
    /// Resolve from the live process environment
    pub fn from_env() -> Result<Self> {
        let vars = environment();
        let settings = EnvSettings::from_vars(&vars)?;
        Self::resolve(&settings, &vars, Path::new(SERVICE_ACCOUNT_DIR))
    }

    /// Resolve from already-collected settings.
    ///
    /// `vars` is the full environment, scanned for the CouchDB service;
    /// `account_dir` holds the `namespace`, `token` and `ca.crt` files.
    pub fn resolve(
        settings: &EnvSettings,
        vars: &BTreeMap<String, String>,
        account_dir: &Path,
    ) -> Result<Self> {
        let hostname = settings
            .hostname
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("HOSTNAME is not set".into()))?;
        let identity = MemberIdentity::resolve(hostname, settings.set_name.as_deref())?;

        let endpoint = discovery::resolve(vars)?;

        let credentials = Credentials::new(
            settings.couchdb_user.as_deref().unwrap_or(DEFAULT_USERNAME),
            settings
                .couchdb_password
                .as_deref()
                .unwrap_or(DEFAULT_PASSWORD),
        );

        Ok(Self {
            identity,
            headless_service: settings
                .headless_service_name
                .clone()
                .unwrap_or_else(|| DEFAULT_HEADLESS_SERVICE.to_string()),
            namespace: resolve_namespace(settings, account_dir)?,
            credentials,
            service_url: endpoint.url,
            admin_url: format!("http://localhost:{}", endpoint.target_port),
            target_port: endpoint.target_port,
            orchestrator: resolve_orchestrator(settings, account_dir)?,
            request_timeout: REQUEST_TIMEOUT,
            readiness_interval: READINESS_INTERVAL,
        })
    }

    /// Stable DNS name of the pod with the given ordinal
    pub fn peer_address(&self, ordinal: u32) -> String {
        format!(
            "{}-{}.{}.{}.{}",
            self.identity.group, ordinal, self.headless_service, self.namespace, CLUSTER_DOMAIN
        )
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_namespace(settings: &EnvSettings, account_dir: &Path) -> Result<String> {
    if let Some(namespace) = &settings.namespace {
        return Ok(namespace.clone());
    }

    let path = account_dir.join("namespace");
    let namespace = read_file(&path)?.trim().to_string();
    if namespace.is_empty() {
        return Err(Error::InvalidConfig(format!("{} is empty", path.display())));
    }
    Ok(namespace)
}

fn resolve_orchestrator(settings: &EnvSettings, account_dir: &Path) -> Result<OrchestratorConfig> {
    let host = settings
        .kubernetes_service_host
        .as_deref()
        .ok_or_else(|| Error::InvalidConfig("KUBERNETES_SERVICE_HOST is not set".into()))?;
    let port = settings
        .kubernetes_service_port
        .as_deref()
        .ok_or_else(|| Error::InvalidConfig("KUBERNETES_SERVICE_PORT is not set".into()))?;

    let base_url = if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    };

    // A missing token file is not an error: the request goes out anonymously.
    let token = match &settings.token {
        Some(token) => Some(token.clone()),
        None => std::fs::read_to_string(account_dir.join("token"))
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
    };

    let ca_certificate = settings
        .ca_certificate_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| account_dir.join("ca.crt"));

    Ok(OrchestratorConfig {
        base_url,
        token,
        ca_certificate: Some(ca_certificate),
    })
}
