//! Remediation: escalate against a breaching actor, best effort throughout.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{ActionKind, GuildId, RemediationKind, RemediationOutcome, TargetId, UserId};
use crate::platform::{Moderation, RecreateSpec};

/// What the engine escalates with for one breach.
#[derive(Debug, Clone)]
pub struct Escalation {
    pub guild_id: GuildId,
    pub actor_id: UserId,
    pub timeout_seconds: u32,
    pub reason: String,
}

/// One remediation step in the chain.
#[async_trait]
pub trait RemediationStrategy: Send + Sync {
    fn kind(&self) -> RemediationKind;

    async fn apply(&self, escalation: &Escalation) -> anyhow::Result<()>;
}

/// Silence the actor for a bounded period.
pub struct TimeoutStrategy {
    moderation: Arc<dyn Moderation>,
}

impl TimeoutStrategy {
    pub fn new(moderation: Arc<dyn Moderation>) -> Self {
        TimeoutStrategy { moderation }
    }
}

#[async_trait]
impl RemediationStrategy for TimeoutStrategy {
    fn kind(&self) -> RemediationKind {
        RemediationKind::Timeout
    }

    async fn apply(&self, escalation: &Escalation) -> anyhow::Result<()> {
        self.moderation
            .timeout(
                &escalation.guild_id,
                &escalation.actor_id,
                escalation.timeout_seconds,
                &escalation.reason,
            )
            .await
    }
}

/// Remove the actor outright.
pub struct BanStrategy {
    moderation: Arc<dyn Moderation>,
}

impl BanStrategy {
    pub fn new(moderation: Arc<dyn Moderation>) -> Self {
        BanStrategy { moderation }
    }
}

#[async_trait]
impl RemediationStrategy for BanStrategy {
    fn kind(&self) -> RemediationKind {
        RemediationKind::Ban
    }

    async fn apply(&self, escalation: &Escalation) -> anyhow::Result<()> {
        self.moderation
            .ban(&escalation.guild_id, &escalation.actor_id, &escalation.reason)
            .await
    }
}

/// Runs the remediation chain for breaching actors.
///
/// Steps run in order; the first success ends the chain. Failures fall
/// through to the next step, and a fully failed chain is reported, never
/// raised: remediation must not take the dispatch pipeline down with it.
pub struct RemediationEngine {
    strategies: Vec<Arc<dyn RemediationStrategy>>,
    moderation: Arc<dyn Moderation>,
}

impl RemediationEngine {
    /// Default chain: timeout first, ban as the fallback.
    pub fn new(moderation: Arc<dyn Moderation>) -> Self {
        let strategies: Vec<Arc<dyn RemediationStrategy>> = vec![
            Arc::new(TimeoutStrategy::new(moderation.clone())),
            Arc::new(BanStrategy::new(moderation.clone())),
        ];

        RemediationEngine {
            strategies,
            moderation,
        }
    }

    /// Custom chain; must not be empty.
    pub fn with_strategies(
        moderation: Arc<dyn Moderation>,
        strategies: Vec<Arc<dyn RemediationStrategy>>,
    ) -> Self {
        RemediationEngine {
            strategies,
            moderation,
        }
    }

    pub async fn escalate(&self, escalation: &Escalation) -> RemediationOutcome {
        let mut last_attempt = None;

        for (idx, strategy) in self.strategies.iter().enumerate() {
            last_attempt = Some(strategy.kind());

            match strategy.apply(escalation).await {
                Ok(()) => {
                    info!(
                        guild_id = %escalation.guild_id,
                        actor = escalation.actor_id.as_str(),
                        step = %strategy.kind(),
                        reason = escalation.reason.as_str(),
                        "remediation applied"
                    );
                    return RemediationOutcome {
                        attempted: strategy.kind(),
                        succeeded: true,
                        fallback_used: idx > 0,
                    };
                }
                Err(e) => {
                    warn!(
                        guild_id = %escalation.guild_id,
                        actor = escalation.actor_id.as_str(),
                        step = %strategy.kind(),
                        error = %e,
                        "remediation step failed"
                    );
                }
            }
        }

        match last_attempt {
            Some(attempted) => RemediationOutcome {
                attempted,
                succeeded: false,
                fallback_used: self.strategies.len() > 1,
            },
            None => {
                error!("remediation chain is empty");
                RemediationOutcome {
                    attempted: RemediationKind::Timeout,
                    succeeded: false,
                    fallback_used: false,
                }
            }
        }
    }

    /// Best-effort rebuild of a destroyed resource. Returns the id of the
    /// replacement, or `None` for non-deletes and platform failures.
    pub async fn recreate(&self, guild_id: &GuildId, kind: &ActionKind) -> Option<TargetId> {
        let spec = RecreateSpec::from_action(kind)?;

        match self.moderation.recreate_resource(guild_id, &spec).await {
            Ok(target) => {
                info!(
                    guild_id = %guild_id,
                    subtype = kind.subtype(),
                    replacement = %target,
                    "recreated deleted resource"
                );
                Some(target)
            }
            Err(e) => {
                warn!(
                    guild_id = %guild_id,
                    subtype = kind.subtype(),
                    error = %e,
                    "recreate failed"
                );
                None
            }
        }
    }
}
