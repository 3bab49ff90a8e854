//!
//! # Session Resolution
//!
//! The task service never verifies tokens. Identity is resolved by looking
//! up an opaque session id (presented as the `sid` cookie) in the shared
//! key-value store under the `sid:` namespace, where the user service's
//! login flow writes `session id -> user id` entries with their own TTL.
//!
//! This is a full trust delegation, made explicit by the
//! [`SessionResolver`] trait: anyone who can write into the shared store
//! under the `sid:` namespace can impersonate any user, which is accepted
//! because the store is not exposed outside the trusted network. The
//! production adapter is [`RedisSessionResolver`];
//! [`InMemorySessionResolver`] is a fake for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpRequest};
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use redis::{AsyncCommands, Client as RedisClient};

use crate::error::AppError;

/// Name of the cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "sid";

fn session_key(session_id: &str) -> String {
    format!("sid:{}", session_id)
}

/// Maps an opaque session id to a user id.
///
/// Absent, expired, and malformed entries all fail `Unauthorized` and are
/// indistinguishable to the client; only store reachability problems
/// surface differently (as 503).
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, session_id: &str) -> Result<i32, AppError>;
}

/// Production adapter reading session entries from the shared Redis store.
pub struct RedisSessionResolver {
    redis: Arc<RedisClient>,
}

impl RedisSessionResolver {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionResolver for RedisSessionResolver {
    async fn resolve(&self, session_id: &str) -> Result<i32, AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let value: Option<String> = conn.get(session_key(session_id)).await?;
        match value {
            Some(raw) => raw.parse::<i32>().map_err(|_| {
                // Fail closed: a session entry we cannot interpret must
                // never default to a guessable identity.
                log::warn!("malformed session entry under key {}", session_key(session_id));
                AppError::Unauthorized("malformed session entry".into())
            }),
            None => Err(AppError::Unauthorized("no session".into())),
        }
    }
}

/// In-memory fake for tests. Stores raw string values so malformed entries
/// can be exercised the same way the production store would surface them.
#[derive(Default)]
pub struct InMemorySessionResolver {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemorySessionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: &str, user_id: i32) {
        self.insert_raw(session_id, &user_id.to_string());
    }

    pub fn insert_raw(&self, session_id: &str, value: &str) {
        self.entries
            .write()
            .expect("session map poisoned")
            .insert(session_id.to_string(), value.to_string());
    }

    pub fn remove(&self, session_id: &str) {
        self.entries
            .write()
            .expect("session map poisoned")
            .remove(session_id);
    }
}

#[async_trait]
impl SessionResolver for InMemorySessionResolver {
    async fn resolve(&self, session_id: &str) -> Result<i32, AppError> {
        let value = self
            .entries
            .read()
            .expect("session map poisoned")
            .get(session_id)
            .cloned();
        match value {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| AppError::Unauthorized("malformed session entry".into())),
            None => Err(AppError::Unauthorized("no session".into())),
        }
    }
}

/// Extracts the session-authenticated user's ID for task-service routes.
///
/// Reads the `sid` cookie and resolves it through the registered
/// [`SessionResolver`]. A missing cookie is rejected the same way as an
/// unknown or expired session.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser(pub i32);

impl FromRequest for SessionUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let resolver = req.app_data::<web::Data<dyn SessionResolver>>().cloned();
        let session_id = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        Box::pin(async move {
            let resolver = resolver.ok_or_else(|| {
                AppError::InternalServerError("session resolver not configured".into())
            })?;
            let session_id =
                session_id.ok_or_else(|| AppError::Unauthorized("no session cookie".into()))?;
            let user_id = resolver.resolve(&session_id).await?;
            Ok(SessionUser(user_id))
        })
    }
}
