//! Application layer: services behind the HTTP handlers.
//!
//! - [`EventService`]: event lifecycle and reads
//! - [`ApplicationService`]: apply, unapply and roster record administration
//! - [`RosterTracker`]: conditional roster writes
//! - [`Emitter`]: notification publishing

pub mod emitter;
pub mod roster;
mod services;

pub use emitter::{EmitError, Emitter};
pub use roster::RosterTracker;
pub use services::{ApplicationService, EventService, ServiceError};
