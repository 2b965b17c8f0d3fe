//! CouchDB service discovery from Kubernetes-injected environment variables
//!
//! Kubernetes exports `<SERVICE>_SERVICE_PORT_<PORT_NAME>=<port>` for every
//! named port of every service in the namespace. The CouchDB service is the
//! one exposing a port named `couchdb-port`, or failing that, any port on
//! 5984.

use crate::common::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// Well-known CouchDB HTTP port
pub const COUCHDB_PORT: u16 = 5984;

const EXACT_PATTERN: &str = "_SERVICE_PORT_COUCHDB_PORT=[0-9]+$";

/// Where the local CouchDB service can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Service name prefix, e.g. `COUCHDB` for `COUCHDB_SERVICE_PORT`
    pub service_name: String,

    /// Service URL derived from `<SERVICE>_PORT` (`tcp://` rewritten to `http://`)
    pub url: String,

    /// Port CouchDB listens on inside each pod
    pub target_port: u16,
}

/// Find the service name for CouchDB among `vars`.
///
/// An exact `couchdb-port` match always wins over a port-number match.
pub fn service_name(vars: &BTreeMap<String, String>) -> Result<String> {
    let exact = Regex::new(EXACT_PATTERN)?;
    let fuzzy = Regex::new(&format!("_SERVICE_PORT_.+={COUCHDB_PORT}$"))?;

    let mut fuzzy_match = None;
    for (key, value) in vars {
        let pair = format!("{key}={value}");

        if let Some(m) = exact.find(&pair) {
            if m.start() > 0 {
                return Ok(pair[..m.start()].to_string());
            }
        }

        if fuzzy_match.is_none() {
            if let Some(m) = fuzzy.find(&pair) {
                if m.start() > 0 {
                    fuzzy_match = Some(pair[..m.start()].to_string());
                }
            }
        }
    }

    fuzzy_match.ok_or_else(|| {
        Error::Discovery(
            "could not determine the Kubernetes service for CouchDB; when using a port \
             other than 5984 it must be named 'couchdb-port'"
                .into(),
        )
    })
}

/// Resolve the CouchDB service URL and target port.
pub fn resolve(vars: &BTreeMap<String, String>) -> Result<ServiceEndpoint> {
    let service_name = service_name(vars)?;

    let port_var = format!("{service_name}_PORT");
    let url = vars
        .get(&port_var)
        .map(|v| v.replacen("tcp", "http", 1))
        .ok_or_else(|| Error::Discovery(format!("{port_var} is not set")))?;

    let service_port_var = format!("{service_name}_SERVICE_PORT");
    let raw_port = vars
        .get(&service_port_var)
        .ok_or_else(|| Error::Discovery(format!("{service_port_var} is not set")))?;
    // Assumes the service port and the container target port are the same.
    let target_port = raw_port.trim().parse::<u16>().map_err(|_| {
        Error::Discovery(format!("{service_port_var} is not a port: {raw_port}"))
    })?;

    tracing::debug!("Using {} for CouchDB service URL", url);
    tracing::debug!("Using {} for CouchDB service port", target_port);

    Ok(ServiceEndpoint {
        service_name,
        url,
        target_port,
    })
}
