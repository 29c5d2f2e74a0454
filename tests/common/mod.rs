//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{DateTime, Duration, Local, Utc};
use http_body_util::BodyExt;
use mockable::Clock;
use s2admin::config::Config;
use s2admin::domain::Otp;
use s2admin::services::{Notification, Notifier, NotifyError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@s2design.com";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Records every message instead of delivering it. Delivery can be made to
/// fail per message kind.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
    fail_codes: AtomicBool,
    fail_confirmations: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().expect("notifier mutex").clone()
    }

    pub fn codes(&self) -> Vec<Otp> {
        self.sent()
            .into_iter()
            .filter_map(|(_, n)| match n {
                Notification::ResetCode { otp, .. } => Some(otp),
                Notification::ResetConfirmation { .. } => None,
            })
            .collect()
    }

    pub fn last_code(&self) -> Otp {
        self.codes().pop().expect("no reset code was sent")
    }

    pub fn confirmations(&self) -> usize {
        self.sent()
            .iter()
            .filter(|(_, n)| matches!(n, Notification::ResetConfirmation { .. }))
            .count()
    }

    pub fn fail_codes(&self, fail: bool) {
        self.fail_codes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_confirmations(&self, fail: bool) {
        self.fail_confirmations.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let fail = match notification {
            Notification::ResetCode { .. } => self.fail_codes.load(Ordering::SeqCst),
            Notification::ResetConfirmation { .. } => {
                self.fail_confirmations.load(Ordering::SeqCst)
            }
        };
        if fail {
            return Err(NotifyError::Transport("smtp unreachable".to_string()));
        }

        self.sent
            .lock()
            .expect("notifier mutex")
            .push((recipient.to_string(), notification.clone()));
        Ok(())
    }
}

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn utc_now(&self) -> DateTime<Utc> {
        self.utc()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock mutex");
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.lock().expect("clock mutex") = to;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex")
    }
}

pub struct TestApp {
    pub state: Arc<s2admin::api::AppState>,
    pub router: Router,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<MutableClock>,
}

pub fn test_config() -> Config {
    let db_path =
        std::env::temp_dir().join(format!("s2admin-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.session.secret = "integration-test-secret-0123456789abcdef".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.security.rotated_time_cost = 2;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = test_config();
    customize(&mut config);

    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(MutableClock::new(Utc::now()));

    let shared = s2admin::state::SharedState::with_collaborators(
        config,
        notifier.clone(),
        clock.clone(),
    )
    .await
    .expect("failed to create shared state");

    let state = s2admin::api::create_app_state(Arc::new(shared), None);
    let router = s2admin::api::router(state.clone());

    TestApp {
        state,
        router,
        notifier,
        clock,
    }
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("response is not JSON ({e}): {}", self.body))
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}
