//! HTTP API integration tests for the notification service.

#![allow(clippy::expect_used)] // Integration tests can use expect for setup

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use event_hub_auth::Identity;
use event_hub_auth::mocks::StaticTokenVerifier;
use event_hub_notifications::{MockMailer, NotificationDispatcher};
use event_hub_server::server::{NotificationState, RouterSettings, notification_router};
use event_hub_testing::mocks::InMemorySubscriptionStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const ADMIN: &str = "admin-token";
const USER: &str = "user-token";

struct TestApp {
    router: Router,
    mailer: MockMailer,
    subscriptions: InMemorySubscriptionStore,
}

impl TestApp {
    fn new() -> Self {
        let mailer = MockMailer::new();
        let subscriptions = InMemorySubscriptionStore::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(mailer.clone()), Arc::new(subscriptions.clone()));
        let verifier = StaticTokenVerifier::new()
            .with_token(ADMIN, Identity::admin("admin@giu.edu"))
            .with_token(USER, Identity::user("a@x.com"));

        let state = NotificationState::new(dispatcher, Arc::new(subscriptions.clone()), Arc::new(verifier));

        Self {
            router: notification_router(state, RouterSettings::default()),
            mailer,
            subscriptions,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    /// Wait for the background send to deliver `count` mails.
    async fn mails(&self, count: usize) -> Vec<String> {
        for _ in 0..100 {
            if self.mailer.sent().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.mailer.recipients()
    }
}

#[tokio::test]
async fn registration_is_accepted_and_mailed_per_recipient() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/v1/notify",
            None,
            Some(json!({
                "topic": "event_register",
                "data": {
                    "emails": ["a@x.com", "b@x.com", "a@x.com"],
                    "event_name": "Career Fair",
                    "event_date": "2025-03-01T10:00:00Z",
                    "event_location": "Main Hall,Cairo,Cairo,Egypt"
                }
            })),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "status": "accepted", "recipients": 2 }));
    assert_eq!(app.mails(2).await, vec!["a@x.com", "b@x.com"]);
}

#[tokio::test]
async fn announcement_reaches_general_and_category_subscribers() {
    let app = TestApp::new();
    app.send(Method::POST, "/v1/subscriptions/general", Some(USER), None)
        .await;
    app.send(Method::POST, "/v1/subscriptions/workshop", Some(ADMIN), None)
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/v1/notify",
            None,
            Some(json!({
                "topic": "event_add",
                "data": {
                    "event_type": "WORKSHOP",
                    "event_name": "Rust 101",
                    "event_date": "2025-03-01T10:00:00Z",
                    "event_description": "Ownership and borrowing",
                    "event_location": "Lab 3,\nCairo,\nCairo,\nEgypt"
                }
            })),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["recipients"], 2);
    assert_eq!(app.mails(2).await, vec!["a@x.com", "admin@giu.edu"]);
}

#[tokio::test]
async fn payload_missing_keys_is_a_bad_request() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/v1/notify",
            None,
            Some(json!({ "topic": "event_remove", "data": { "emails": ["a@x.com"] } })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn unknown_topic_is_a_bad_request() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            Method::POST,
            "/v1/notify",
            None,
            Some(json!({ "topic": "event_archive", "data": {} })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nobody_to_mail_is_still_accepted() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/v1/notify",
            None,
            Some(json!({ "topic": "user_registered", "data": { "emails": [] } })),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["recipients"], 0);
}

#[tokio::test]
async fn mailing_list_unavailable_is_a_server_error() {
    let app = TestApp::new();
    app.subscriptions.set_unavailable(true);

    let (status, _) = app
        .send(
            Method::POST,
            "/v1/notify",
            None,
            Some(json!({
                "topic": "event_add",
                "data": {
                    "event_type": "MEETUP",
                    "event_name": "Meetup",
                    "event_date": "2025-03-01T10:00:00Z",
                    "event_description": "",
                    "event_location": "x"
                }
            })),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn subscription_lifecycle() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, "/v1/subscriptions/career_fair", Some(USER), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Subscribed successfully");

    let (status, body) = app
        .send(Method::POST, "/v1/subscriptions/career_fair", Some(USER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Already subscribed");

    let (status, body) = app
        .send(Method::GET, "/v1/subscriptions/career_fair", Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "category": "career_fair", "subscribers": ["a@x.com"] }));

    let (status, _) = app
        .send(Method::DELETE, "/v1/subscriptions/career_fair", Some(USER), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::DELETE, "/v1/subscriptions/career_fair", Some(USER), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Subscription not found");
}

#[tokio::test]
async fn subscriptions_are_guarded() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, "/v1/subscriptions/chess", Some(USER), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown category: chess");

    let (status, _) = app
        .send(Method::POST, "/v1/subscriptions/general", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/v1/subscriptions/general", Some(USER), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
