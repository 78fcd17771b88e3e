//! HTTP handlers shared by the Event Hub services.

pub mod health;

pub use health::{ReadinessCheck, ReadinessReport, health_check, readiness};
