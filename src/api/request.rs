use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::{ActionEvent, ActionKind, EventId, SCHEMA_VERSION};
use crate::domain::ids::{GuildId, TargetId};

/// Request body for submitting one observed action.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionRequest {
    pub guild_id: String,

    /// Id of the resource the action touched.
    pub subject_id: String,

    #[serde(flatten)]
    pub kind: ActionKind,

    /// When the gateway observed the action; defaults to receipt time.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl ActionRequest {
    /// Convert to an ActionEvent for dispatch.
    pub fn to_event(&self) -> ActionEvent {
        ActionEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: EventId::new(),
            guild_id: GuildId::new(&self.guild_id),
            subject_id: TargetId::new(&self.subject_id),
            kind: self.kind.clone(),
            observed_at: self.observed_at.unwrap_or_else(Utc::now),
        }
    }
}
