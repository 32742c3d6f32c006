//! Actor resolution - best-effort attribution of ledger writes.
//!
//! Every ledger write records who initiated it. Attribution must never block
//! a write: a candidate identity that is present but malformed is logged at
//! warning level and resolved to `None` instead of raising.

use crate::{config::Config, middleware::auth::AuthContext};
use uuid::Uuid;

/// Resolve the initiating actor from an authentication context.
///
/// Candidate fields are tried in order of specificity: the per-request
/// `X-Acting-User` override first, then the identity bound to the API key.
/// The first *present* candidate wins; if it does not parse as a UUID,
/// resolution fails safe to `None` rather than falling through to a less
/// specific claim.
pub fn resolve_actor_id(auth: &AuthContext) -> Option<Uuid> {
    let (source, candidate) = if let Some(acting) = auth.acting_user.as_deref() {
        ("acting-user header", acting)
    } else if let Some(bound) = auth.actor_id.as_deref() {
        ("api key binding", bound)
    } else {
        return None;
    };

    validate_candidate(source, candidate)
}

/// Resolve the configured system actor (for unattended webhook-originated
/// writes). Same validate-or-none policy as [`resolve_actor_id`].
pub fn resolve_system_actor_id(config: &Config) -> Option<Uuid> {
    let raw = config.system_actor_id.as_deref()?;
    validate_candidate("system actor config", raw)
}

fn validate_candidate(source: &str, raw: &str) -> Option<Uuid> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!("Ignoring malformed actor id from {}: {:?}", source, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::ApiKeyRole;

    fn context(actor_id: Option<&str>, acting_user: Option<&str>) -> AuthContext {
        AuthContext {
            api_key_id: Uuid::new_v4(),
            role: ApiKeyRole::User,
            label: "test-key".to_string(),
            actor_id: actor_id.map(str::to_string),
            acting_user: acting_user.map(str::to_string),
        }
    }

    #[test]
    fn resolves_key_bound_actor() {
        let id = Uuid::new_v4();
        let auth = context(Some(&id.to_string()), None);
        assert_eq!(resolve_actor_id(&auth), Some(id));
    }

    #[test]
    fn header_override_takes_precedence() {
        let bound = Uuid::new_v4();
        let acting = Uuid::new_v4();
        let auth = context(Some(&bound.to_string()), Some(&acting.to_string()));
        assert_eq!(resolve_actor_id(&auth), Some(acting));
    }

    #[test]
    fn malformed_candidate_fails_safe_to_none() {
        // The malformed header must not fall through to the valid binding.
        let bound = Uuid::new_v4();
        let auth = context(Some(&bound.to_string()), Some("not-a-uuid"));
        assert_eq!(resolve_actor_id(&auth), None);
    }

    #[test]
    fn missing_candidates_resolve_to_none() {
        assert_eq!(resolve_actor_id(&context(None, None)), None);
    }

    #[test]
    fn system_actor_follows_same_policy() {
        let mut config = test_config();
        assert_eq!(resolve_system_actor_id(&config), None);

        config.system_actor_id = Some("garbage".to_string());
        assert_eq!(resolve_system_actor_id(&config), None);

        let id = Uuid::new_v4();
        config.system_actor_id = Some(id.to_string());
        assert_eq!(resolve_system_actor_id(&config), Some(id));
    }

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            server_port: 0,
            max_db_connections: 1,
            system_actor_id: None,
            stripe_webhook_secret: None,
            iyzico_webhook_secret: None,
            binance_pay_webhook_secret: None,
            binance_pay_api_base: "https://bpay.binanceapi.com".to_string(),
            binance_pay_key: None,
            binance_pay_secret: None,
        }
    }
}
