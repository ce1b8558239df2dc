//! Bearer token authentication middleware.
//!
//! Protected requests carry `Authorization: Bearer <token>`. The token is
//! hashed with SHA-256 and looked up in `access_tokens`; the resolved
//! [`AuthContext`] is inserted into the request extensions for handlers.
//!
//! - [`require_user`] admits any active token bound to a user.
//! - [`require_admin`] admits only active tokens with the `admin` role.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::access_token::{AccessToken, TokenRole},
};

/// Authentication context attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the access token used
    pub token_id: Uuid,

    /// Present for user tokens; admin tokens may have none
    pub user_id: Option<Uuid>,

    pub role: TokenRole,
}

impl AuthContext {
    /// The calling user's ID.
    pub fn user(&self) -> Result<Uuid, AppError> {
        self.user_id.ok_or(AppError::Unauthorized)
    }
}

/// SHA-256 hex digest of a secret.
///
/// Tokens are stored this way, and the cron key is compared through it.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(pool: &DbPool, headers: &HeaderMap) -> Result<AuthContext, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;

    let record = sqlx::query_as::<_, AccessToken>(
        "SELECT id, user_id, key_hash, role, created_at, is_active
         FROM access_tokens
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(hash_secret(token))
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    Ok(AuthContext {
        token_id: record.id,
        user_id: record.user_id,
        role: record.role,
    })
}

/// Admit requests from tokens bound to a user.
pub async fn require_user(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = authenticate(&pool, request.headers()).await?;
    context.user()?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Admit requests from admin tokens only.
pub async fn require_admin(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = authenticate(&pool, request.headers()).await?;
    if context.role != TokenRole::Admin {
        tracing::warn!(token_id = %context.token_id, "non-admin token on admin route");
        return Err(AppError::Unauthorized);
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
