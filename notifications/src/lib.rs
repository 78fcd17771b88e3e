//! # Event Hub Notifications
//!
//! Consumes notification messages and turns them into mail.
//!
//! - [`templates`]: one subject/text/HTML rendering per topic
//! - [`mailer`]: the [`Mailer`] capability with SMTP, console and mock
//!   implementations
//! - [`dispatcher`]: [`NotificationDispatcher`], the bus [`MessageHandler`]
//!   that resolves recipients and schedules delivery
//!
//! ```ignore
//! let dispatcher = NotificationDispatcher::new(mailer, subscriptions);
//! let consumer = EventConsumer::builder()
//!     .event_bus(bus)
//!     .topics(Topic::ALL.to_vec())
//!     .handler(Arc::new(dispatcher))
//!     .build()?;
//! ```
//!
//! [`MessageHandler`]: event_hub_runtime::MessageHandler

pub mod dispatcher;
pub mod mailer;
pub mod templates;

pub use dispatcher::{Dispatch, DispatchError, NotificationDispatcher};
pub use mailer::{ConsoleMailer, Mail, MailError, Mailer, MockMailer, SmtpConfig, SmtpMailer};
pub use templates::Rendered;
