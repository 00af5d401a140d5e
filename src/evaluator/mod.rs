//! Rate evaluation: exemption short-circuit, then fixed-window counting.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::counter::{counter_key, RateWindowCounter};
use crate::domain::outcome::ExemptReason;
use crate::domain::{ActionEvent, ActorRecord, Evaluation, ProtectionPolicy};
use crate::platform::MemberDirectory;

/// Evaluates one attributed action against the policy snapshot.
///
/// Exempt actors are decided before any counter is touched, so their
/// actions leave no trace in the window state. Unattributed actions are
/// never exempt; they count under the shared unknown bucket.
pub struct PolicyEvaluator {
    counters: Arc<RateWindowCounter>,
    directory: Arc<dyn MemberDirectory>,
}

impl PolicyEvaluator {
    pub fn new(counters: Arc<RateWindowCounter>, directory: Arc<dyn MemberDirectory>) -> Self {
        PolicyEvaluator {
            counters,
            directory,
        }
    }

    pub async fn evaluate(
        &self,
        policy: &ProtectionPolicy,
        event: &ActionEvent,
        actor: &ActorRecord,
    ) -> Evaluation {
        let guard = event.kind.guard();
        let threshold = policy.threshold_for(guard, &event.kind);
        let window_ms = policy.window_ms_for(guard);

        if let Some(reason) = self.exemption(policy, event, actor).await {
            debug!(
                guild_id = %event.guild_id,
                actor = actor.counter_actor(),
                subtype = event.kind.subtype(),
                reason = ?reason,
                "actor exempt, skipping count"
            );
            return Evaluation::exempt(reason, threshold);
        }

        let key = counter_key(guard, event.kind.subtype(), actor.counter_actor());
        let count = self.counters.increment_at(&key, window_ms, event.observed_at);

        Evaluation::counted(count, threshold)
    }

    /// Check the bypass list first, then membership. A directory outage
    /// counts the action rather than waving it through.
    async fn exemption(
        &self,
        policy: &ProtectionPolicy,
        event: &ActionEvent,
        actor: &ActorRecord,
    ) -> Option<ExemptReason> {
        let actor_id = actor.actor_id.as_ref()?;

        if policy.is_bypassed(actor_id) {
            return Some(ExemptReason::Bypass);
        }

        let member = match self.directory.member(&event.guild_id, actor_id).await {
            Ok(member) => member?,
            Err(e) => {
                warn!(
                    guild_id = %event.guild_id,
                    actor = actor_id.as_str(),
                    error = %e,
                    "member lookup failed, counting the action"
                );
                return None;
            }
        };

        if member.is_owner || member.is_admin {
            return Some(ExemptReason::Privileged);
        }

        if member.role_ids.iter().any(|r| policy.is_moderator_role(r)) {
            return Some(ExemptReason::ModeratorRole);
        }

        None
    }
}
