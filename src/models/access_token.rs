//! Bearer token model for authentication.
//!
//! Tokens are issued outside this service (login is not handled here) and
//! stored in the database as SHA-256 hashes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Who a token speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "token_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    User,
    Admin,
}

/// Represents an access token record from the database.
///
/// # Database Table
///
/// Maps to the `access_tokens` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `user_id`: Owner for user tokens, NULL for admin tokens
/// - `key_hash`: SHA-256 hash of the actual token
/// - `role`: `user` or `admin`
/// - `is_active`: Whether the token is currently valid
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub id: Uuid,

    pub user_id: Option<Uuid>,

    /// SHA-256 hash of the actual token (64 hex characters)
    ///
    /// When a request comes in with "Bearer abc123", we:
    /// 1. Hash "abc123" with SHA-256
    /// 2. Look up this hash in the database
    /// 3. If found and active, authenticate the request
    pub key_hash: String,

    pub role: TokenRole,

    pub created_at: DateTime<Utc>,

    /// Inactive tokens are rejected during authentication.
    pub is_active: bool,
}
