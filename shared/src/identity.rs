//! Caller identity resolution.
//!
//! Identity is advisory: an integer taken from request metadata and trusted
//! as-is. Resolution goes through [`IdentityResolver`] so a real auth layer
//! can replace the header lookup without touching handlers.

use async_trait::async_trait;
use lambda_http::http::header::COOKIE;
use lambda_http::http::HeaderMap;
use sqlx::PgPool;

use crate::http::header_str;
use crate::Result;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ID_COOKIE: &str = "user_id";

/// Maps request headers to an optional caller id.
pub trait IdentityResolver: Send + Sync {
    fn caller_id(&self, headers: &HeaderMap) -> Option<i64>;
}

/// Reads `X-User-Id`, optionally falling back to the `user_id` cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentity {
    cookie_fallback: bool,
}

impl HeaderIdentity {
    /// Header only.
    pub fn header() -> Self {
        Self {
            cookie_fallback: false,
        }
    }

    /// Header first, then cookie.
    pub fn header_or_cookie() -> Self {
        Self {
            cookie_fallback: true,
        }
    }
}

impl IdentityResolver for HeaderIdentity {
    fn caller_id(&self, headers: &HeaderMap) -> Option<i64> {
        if let Some(value) = header_str(headers, USER_ID_HEADER) {
            // A malformed header means "no identity", not a cookie lookup.
            return value.parse().ok();
        }

        if !self.cookie_fallback {
            return None;
        }

        cookie_value(headers, USER_ID_COOKIE).and_then(|v| v.parse().ok())
    }
}

/// Find a cookie by name in the `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_str = headers.get(COOKIE)?.to_str().ok()?;

    cookie_str.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// A user as seen by this service.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub google_access_token: Option<String>,
}

impl User {
    /// The stored Google token, if present and not blank.
    pub fn access_token(&self) -> Option<&str> {
        self.google_access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>>;
}

/// Reads the auth subsystem's `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, google_access_token FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
