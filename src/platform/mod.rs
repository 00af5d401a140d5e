//! Platform integration: trait seams plus the HTTP adapter and test mock.

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpPlatform;
pub use mock::MockPlatform;
pub use traits::{AuditLog, Member, MemberDirectory, Moderation, NotificationSink, RecreateSpec};
