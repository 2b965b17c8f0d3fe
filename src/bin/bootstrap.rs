//! Bootstrap sidecar binary

use couchdb_bootstrap::common::config::{environment, SERVICE_ACCOUNT_DIR};
use couchdb_bootstrap::common::{Config, EnvSettings};
use couchdb_bootstrap::coordinator::{build_client, CouchAdmin, StatefulSetClient};
use couchdb_bootstrap::{Bootstrap, Outcome};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let vars = environment();
    let settings = EnvSettings::from_vars(&vars)?;

    // RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(settings.log_filter().into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .init();

    tracing::info!("couchdb-bootstrap {}", couchdb_bootstrap::VERSION);

    let config = Config::resolve(&settings, &vars, Path::new(SERVICE_ACCOUNT_DIR))
        .inspect_err(|e| tracing::error!("{}: {}", e.category(), e))?;
    tracing::debug!("{:?}", config);

    let client = build_client(&config).inspect_err(|e| tracing::error!("{}: {}", e.category(), e))?;
    let admin = CouchAdmin::new(client.clone(), &config);
    let orchestrator = StatefulSetClient::new(client, &config);

    let bootstrap = Bootstrap::new(config, admin, orchestrator);
    match bootstrap.run_until(shutdown_signal()).await {
        Ok(Outcome::Interrupted) => tracing::warn!("Stopped before bootstrap completed"),
        Ok(outcome) => tracing::info!("Stopped after {:?}", outcome),
        Err(e) => {
            tracing::error!("{}: {}", e.category(), e);
            return Err(e.into());
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
