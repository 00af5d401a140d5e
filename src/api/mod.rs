pub mod request;
pub mod response;
pub mod routes;

pub use request::ActionRequest;
pub use routes::{create_router, AppState};
