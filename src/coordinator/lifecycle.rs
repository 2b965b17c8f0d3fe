//! Bootstrap lifecycle
//!
//! ```text
//! Starting → WaitingForReady → CheckingIdempotence ─┬→ AlreadyConfigured
//!                                                   └→ ResolvingCardinality → Electing ─┬→ Forming  → Idle
//!                                                                                       └→ Enabling → Idle
//! ```
//!
//! `AlreadyConfigured` and `Idle` are terminal: the sidecar then parks until
//! shutdown instead of exiting, so Kubernetes does not restart it.

use crate::common::{Config, Result};
use crate::coordinator::admin::AdminApi;
use crate::coordinator::election::{elect, Cardinality, FormationRole};
use crate::coordinator::formation::{enable_local, FormationPlan};
use crate::coordinator::orchestrator::CardinalitySource;
use crate::coordinator::readiness::wait_until_ready;
use std::future::Future;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    WaitingForReady,
    CheckingIdempotence,
    AlreadyConfigured,
    ResolvingCardinality,
    Electing,
    /// Follower enabling its own cluster mode
    Enabling,
    /// Coordinator running the join protocol
    Forming,
    Idle,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::AlreadyConfigured | Phase::Idle)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::WaitingForReady => "waiting-for-ready",
            Phase::CheckingIdempotence => "checking-idempotence",
            Phase::AlreadyConfigured => "already-configured",
            Phase::ResolvingCardinality => "resolving-cardinality",
            Phase::Electing => "electing",
            Phase::Enabling => "enabling",
            Phase::Forming => "forming",
            Phase::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// What a completed run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `_users` existed, nothing was issued
    AlreadyConfigured,
    /// This member formed a cluster of `members`
    Formed { members: Cardinality },
    /// This member enabled itself and left formation to the coordinator
    Joined { members: Cardinality },
    /// Shutdown arrived before a terminal phase
    Interrupted,
}

pub struct Bootstrap<A, C> {
    config: Config,
    admin: A,
    orchestrator: C,
    phase: watch::Sender<Phase>,
}

impl<A, C> Bootstrap<A, C>
where
    A: AdminApi,
    C: CardinalitySource,
{
    pub fn new(config: Config, admin: A, orchestrator: C) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            config,
            admin,
            orchestrator,
            phase,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!("Entering phase {}", phase);
        self.phase.send_replace(phase);
    }

    /// Drive the bootstrap to a terminal phase.
    ///
    /// Any error is fatal for the process; nothing here retries except the
    /// readiness gate.
    pub async fn run(&self) -> Result<Outcome> {
        let identity = &self.config.identity;
        tracing::info!(
            "Bootstrapping {} (ordinal {} of StatefulSet {})",
            identity.hostname,
            identity.ordinal,
            identity.group
        );

        self.enter(Phase::WaitingForReady);
        wait_until_ready(&self.admin, self.config.readiness_interval).await;

        self.enter(Phase::CheckingIdempotence);
        if self.admin.is_configured().await? {
            tracing::info!("CouchDB appears to be configured. Sleeping.");
            self.enter(Phase::AlreadyConfigured);
            return Ok(Outcome::AlreadyConfigured);
        }

        self.enter(Phase::ResolvingCardinality);
        let members = self.orchestrator.cardinality().await?;
        tracing::info!("StatefulSet {} expects {} members", identity.group, members);

        self.enter(Phase::Electing);
        let role = elect(&identity.group, members, &identity.hostname);
        tracing::info!("{} is the {}", identity.hostname, role);

        let outcome = match role {
            FormationRole::Coordinator => {
                self.enter(Phase::Forming);
                let plan = FormationPlan::new(&self.config, members);
                let applied = plan.execute(&self.admin).await?;
                tracing::info!("Cluster formed with {} actions", applied);
                Outcome::Formed { members }
            }
            FormationRole::Follower => {
                self.enter(Phase::Enabling);
                self.admin
                    .apply(&enable_local(&self.config, members))
                    .await?;
                Outcome::Joined { members }
            }
        };

        tracing::info!("Configuration completed");
        self.enter(Phase::Idle);
        Ok(outcome)
    }

    /// Run to a terminal phase, then park until `shutdown` resolves.
    ///
    /// Shutdown during the run interrupts it; the remaining actions are
    /// simply re-issued by the next start.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<Outcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let outcome = tokio::select! {
            res = self.run() => res?,
            _ = &mut shutdown => {
                tracing::warn!("Shutdown requested while {}", self.phase());
                return Ok(Outcome::Interrupted);
            }
        };

        shutdown.await;
        tracing::info!("Shutdown requested, leaving {}", self.phase());
        Ok(outcome)
    }
}
