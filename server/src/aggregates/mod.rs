//! Reducers for the event service.

pub mod application;

pub use application::{
    RsvpAction, RsvpEnvironment, RsvpFailure, RsvpKind, RsvpOutcome, RsvpReducer, RsvpRejection,
    RsvpState,
};
