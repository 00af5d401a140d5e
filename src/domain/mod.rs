pub mod actor;
pub mod event;
pub mod ids;
pub mod notice;
pub mod outcome;
pub mod policy;

pub use actor::{ActorRecord, AuditEntry, Confidence};
pub use event::{ActionEvent, ActionKind, ChannelType, EventId};
pub use ids::{ChannelId, GuildId, RoleId, TargetId, UserId};
pub use notice::GuardNotice;
pub use outcome::{Evaluation, GuardReport, GuardStatus, RemediationKind, RemediationOutcome};
pub use policy::{GuardConfig, GuardKind, ProtectionPolicy, RateDefaults};
