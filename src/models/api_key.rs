//! API Key model for authentication.
//!
//! API keys authenticate callers of the wallet API. They are stored in the
//! database as SHA-256 hashes for security.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a key is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "api_key_role", rename_all = "snake_case")]
pub enum ApiKeyRole {
    /// Approve/reject/finalize workflows, manual adjustments, refunds
    Admin,
    /// Submit deposit and withdrawal requests, read own data
    User,
    /// Machine callers (the bookings/shop layer registering payment intents)
    Service,
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. When a request comes in with
/// "Bearer abc123", we hash "abc123" with SHA-256, look the hash up, and if
/// found and active, authenticate the request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    /// Human-readable label for this key
    pub label: String,

    pub role: ApiKeyRole,

    /// Identity the key acts as. Free-form text: the actor resolver
    /// validates the shape at read time and degrades to NULL attribution
    /// when malformed.
    pub actor_id: Option<String>,

    /// Whether this API key is currently active.
    ///
    /// Inactive keys are rejected during authentication. This provides a way
    /// to revoke access without deleting the record.
    pub is_active: bool,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,
}
