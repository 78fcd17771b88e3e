//! Event Hub services: event planning with RSVP and mail notifications.
//!
//! Two binaries share this crate:
//!
//! - **event-service**: event lifecycle, apply/unapply and roster records.
//!   Every mutation publishes a notification on the bus.
//! - **notification-service**: consumes the bus, resolves recipients and
//!   sends mail. Also owns the mailing-list subscriptions.
//!
//! # Architecture
//!
//! ```text
//!  HTTP ──▶ api ──▶ app services ──▶ EventStore (PostgreSQL)
//!                        │
//!                        ├─ RsvpReducer (apply / unapply)
//!                        │
//!                        └─ Emitter ──▶ EventBus (Redpanda)
//!                                            │
//!                                            ▼
//!                               EventConsumer ──▶ NotificationDispatcher ──▶ Mailer
//! ```
//!
//! Roster writes are conditional at the store, so a duplicate apply is
//! reported instead of stored twice. Publishing happens after the write;
//! a publish failure is reported as a 500 and logged as a partial failure.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregates;
pub mod api;
pub mod app;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod server;

pub use config::Config;
