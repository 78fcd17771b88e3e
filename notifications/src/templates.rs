//! Mail templates, one per notification topic.
//!
//! Every template renders a subject plus plain-text and HTML bodies. Values
//! from payloads are escaped before they reach the HTML body.

use chrono::{DateTime, Utc};
use event_hub_core::notification::{
    ApplicationRegisteredPayload, EventAddedPayload, EventRemovedPayload, EventUpdatedPayload,
    UserRegisteredPayload,
};
use std::fmt::Write as _;

/// A rendered mail body, ready for any recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// HTML body
    pub html: String,
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%A, %B %-d, %Y at %H:%M UTC").to_string()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap `heading` and `(label, value)` rows in the shared HTML layout.
fn layout(heading: &str, intro: &str, rows: &[(&str, &str)], outro: &str) -> String {
    let mut table = String::new();
    for (label, value) in rows {
        // Multi-line values (addresses) keep their line breaks
        let value = escape(value).replace('\n', "<br>");
        let _ = write!(
            table,
            "<tr><td style=\"padding: 4px 12px 4px 0; color: #666;\">{label}</td><td>{value}</td></tr>"
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{heading}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2563eb;">{heading}</h2>
    <p>{intro}</p>
    <table>{table}</table>
    <p style="color: #666; font-size: 14px;">{outro}</p>
    <p style="color: #666; font-size: 12px; margin-top: 40px;">GIU Event Hub</p>
  </div>
</body>
</html>"#,
        heading = escape(heading),
        intro = escape(intro),
        outro = escape(outro),
    )
}

fn text_body(intro: &str, rows: &[(&str, &str)], outro: &str) -> String {
    let mut body = format!("{intro}\n\n");
    for (label, value) in rows {
        let _ = writeln!(body, "{label}: {value}");
    }
    let _ = write!(body, "\n{outro}\n\nGIU Event Hub\n");
    body
}

fn render(subject: String, heading: &str, intro: &str, rows: &[(&str, &str)], outro: &str) -> Rendered {
    Rendered {
        html: layout(heading, intro, rows, outro),
        text: text_body(intro, rows, outro),
        subject,
    }
}

/// Announcement of a new event to mailing-list subscribers.
#[must_use]
pub fn event_added(payload: &EventAddedPayload) -> Rendered {
    let date = format_date(payload.event_date);
    render(
        format!("New event: {}", payload.event_name),
        "A new event was just announced",
        &payload.event_description,
        &[
            ("Event", &payload.event_name),
            ("Type", payload.event_type.as_str()),
            ("Date", &date),
            ("Location", &payload.event_location),
        ],
        "You receive this mail because you subscribed to event announcements.",
    )
}

/// Change notice to the attendees of an event.
#[must_use]
pub fn event_updated(payload: &EventUpdatedPayload) -> Rendered {
    let date = format_date(payload.event_date);
    render(
        format!("Event updated: {}", payload.event_name),
        "An event you applied to has changed",
        "Here are the latest details.",
        &[
            ("Event", &payload.event_name),
            ("Date", &date),
            ("Description", &payload.event_description),
        ],
        "Your application is still registered.",
    )
}

/// Cancellation notice to the attendees of an upcoming event.
#[must_use]
pub fn event_removed(payload: &EventRemovedPayload) -> Rendered {
    let date = format_date(payload.event_date);
    render(
        format!("Event cancelled: {}", payload.event_name),
        "An event you applied to was cancelled",
        "We are sorry, the following event will not take place.",
        &[("Event", &payload.event_name), ("Date", &date)],
        "Your application has been removed.",
    )
}

/// Confirmation of an application.
#[must_use]
pub fn application_registered(payload: &ApplicationRegisteredPayload) -> Rendered {
    let date = format_date(payload.event_date);
    render(
        format!("You're registered: {}", payload.event_name),
        "Your application was registered",
        "See you there!",
        &[
            ("Event", &payload.event_name),
            ("Date", &date),
            ("Location", &payload.event_location),
        ],
        "If you can no longer attend, please withdraw your application.",
    )
}

/// Welcome mail for a new account.
#[must_use]
pub fn user_registered(payload: &UserRegisteredPayload) -> Rendered {
    let intro = match payload.name.as_deref() {
        Some(name) if !name.trim().is_empty() => format!("Hi {name}, your account is ready."),
        _ => "Your account is ready.".to_string(),
    };
    render(
        "Welcome to GIU Event Hub".to_string(),
        "Welcome to GIU Event Hub",
        &intro,
        &[],
        "Browse upcoming events and apply to the ones you like.",
    )
}
