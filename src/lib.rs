pub mod api;
pub mod attribution;
pub mod config;
pub mod counter;
pub mod dispatch;
pub mod domain;
pub mod evaluator;
pub mod observability;
pub mod platform;
pub mod remediation;
pub mod store;

pub use config::Config;
pub use dispatch::GuardDispatcher;
pub use domain::{ActionEvent, ActionKind, GuardReport, ProtectionPolicy};
