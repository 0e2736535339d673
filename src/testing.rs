//! Fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::clock;
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::db::{self, queries, DbPool};
use crate::media::{MediaStore, UploadedMedia};
use crate::models::device::Device;
use crate::models::subscription::{Plan, Subscription};
use crate::models::user::User;
use crate::push::{PushError, PushMessage, PushSender};
use crate::service::subscriptions;

/// Records every send. Tokens listed in `failures` are rejected with that code.
#[derive(Default)]
pub struct FakePush {
    pub sent: Mutex<Vec<(String, PushMessage)>>,
    pub failures: HashMap<String, String>,
}

impl FakePush {
    pub fn failing(failures: &[(&str, &str)]) -> Self {
        Self {
            sent: Mutex::default(),
            failures: failures
                .iter()
                .map(|(t, c)| (t.to_string(), c.to_string()))
                .collect(),
        }
    }

    pub fn sent_tokens(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl PushSender for FakePush {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        if let Some(code) = self.failures.get(token) {
            return Err(PushError::Rejected {
                code: code.clone(),
                message: format!("rejected with {}", code),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((token.to_string(), message.clone()));
        Ok(format!("projects/test/messages/{}", sent.len()))
    }
}

/// Hands back a fixed URL and remembers what it was given.
#[derive(Default)]
pub struct FakeMedia {
    pub uploads: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedMedia> {
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));
        Ok(UploadedMedia {
            url: format!("https://media.test/{}", file_name),
            id: "test-media-1".to_string(),
        })
    }
}

pub async fn context() -> AppContext {
    context_with_push(Arc::new(FakePush::default())).await
}

pub async fn context_with_push(push: Arc<dyn PushSender>) -> AppContext {
    let pool = db::test_pool().await;
    AppContext::new(AppConfig::for_tests(), pool, push, Arc::new(FakeMedia::default()))
}

pub async fn context_with_config(config: AppConfig) -> AppContext {
    let pool = db::test_pool().await;
    AppContext::new(
        config,
        pool,
        Arc::new(FakePush::default()),
        Arc::new(FakeMedia::default()),
    )
}

/// Long enough and clean enough to pass registration checks.
pub fn push_token(tag: &str) -> String {
    format!("{}:{}", tag, "A1b2_C3d4-".repeat(12))
}

pub async fn user(pool: &DbPool, email: &str) -> User {
    sqlx::query_as::<_, User>(queries::INSERT_USER)
        .bind(email)
        .bind("not-a-real-hash")
        .bind(clock::now())
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A usable subscription: PRO gets its payment confirmed.
pub async fn subscription(pool: &DbPool, user_id: i64, plan: Plan) -> Subscription {
    subscriptions::select(pool, user_id, Some(plan.as_str()))
        .await
        .unwrap();
    match plan {
        Plan::Free => subscriptions::current(pool, user_id).await.unwrap().unwrap(),
        Plan::Pro => subscriptions::confirm_payment(pool, user_id).await.unwrap(),
    }
}

/// Active device whose last check-in was `ago` before now.
pub async fn seen_device(
    pool: &DbPool,
    device_id: &str,
    room: &str,
    ago: chrono::Duration,
) -> Device {
    let device = sqlx::query_as::<_, Device>(queries::HEARTBEAT_UPSERT)
        .bind(device_id)
        .bind(None::<String>)
        .bind(room)
        .bind(clock::now())
        .fetch_one(pool)
        .await
        .unwrap();
    sqlx::query_as::<_, Device>("UPDATE devices SET last_seen_at = ?2 WHERE id = ?1 RETURNING *;")
        .bind(device.id)
        .bind(clock::now() - ago)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn device_by_external(pool: &DbPool, device_id: &str) -> Device {
    sqlx::query_as::<_, Device>(queries::SELECT_DEVICE_BY_EXTERNAL_ID)
        .bind(device_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
