//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401
//!
//! Gateway webhook routes do not pass through here; they are authenticated
//! by HMAC signature over the raw body instead.

use crate::{
    AppState,
    error::AppError,
    models::api_key::{ApiKey, ApiKeyRole},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request. The identity
/// candidate fields are raw strings; the actor resolver validates them and
/// degrades to `None` attribution rather than failing the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    /// Role attached to the key; admin-only operations check this
    pub role: ApiKeyRole,

    /// Label of the key, for log lines
    pub label: String,

    /// Identity bound to the key (raw, unvalidated)
    pub actor_id: Option<String>,

    /// Per-request identity override from the `X-Acting-User` header
    /// (raw, unvalidated; admins acting on behalf of a user)
    pub acting_user: Option<String>,
}

/// Require the admin role.
pub fn require_admin(auth: &AuthContext) -> Result<(), AppError> {
    if auth.role == ApiKeyRole::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    // Expected format: "Bearer <api_key>"
    let api_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    // Hash the API key using SHA-256
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let key_hash = hex::encode(hasher.finalize());

    // Lookup hashed key in database
    let api_key_record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, label, role, actor_id, is_active, created_at
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    // Capture the per-request acting-user override, if any. Left raw here;
    // the actor resolver decides whether it is usable.
    let acting_user = request
        .headers()
        .get("X-Acting-User")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let auth_context = AuthContext {
        api_key_id: api_key_record.id,
        role: api_key_record.role,
        label: api_key_record.label,
        actor_id: api_key_record.actor_id,
        acting_user,
    };

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}
