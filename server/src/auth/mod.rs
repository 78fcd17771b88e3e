//! Caller identity for the HTTP routes.

pub mod middleware;

pub use middleware::{AuthenticatedUser, RequireAdmin, RequireUser};
