//! HTTP API handlers
//!
//! Each submodule handles a specific domain of the REST API.

pub mod health;
pub mod insights;
pub mod router;
pub mod state;
pub mod students;

// Re-export commonly used items
pub use router::{build_protected_routes, build_public_routes, build_router, AppState};
pub use state::ServiceState;
