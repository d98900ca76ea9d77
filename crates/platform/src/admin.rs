//! Operator access gate.
//!
//! The operator account comes from configuration, never from source. A
//! successful match issues an [`AdminGrant`]: a bearer token that expires,
//! can be revoked on sign-out, and is kept apart from identity-provider
//! sessions so a restored provider session never carries operator rights.

use crate::auth::generate_token;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use lines_core::config::AdminConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

const ADMIN_TOKEN_PREFIX: &str = "adm_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminGrant {
    pub token: String,
    /// Identifier the operator logged in with (email or username).
    pub identifier: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct AdminGate {
    email: Option<String>,
    username: Option<String>,
    password_digest: Option<[u8; 32]>,
    grant_ttl: Duration,
    grants: DashMap<String, AdminGrant>,
}

impl AdminGate {
    pub fn from_config(config: &AdminConfig) -> Self {
        if !config.is_configured() {
            info!("Admin gate disabled (no operator credentials configured)");
            return Self::disabled();
        }
        info!("Admin gate enabled");
        Self {
            email: config.email.clone().filter(|s| !s.is_empty()),
            username: config.username.clone().filter(|s| !s.is_empty()),
            password_digest: config.password.as_deref().map(digest),
            grant_ttl: Duration::hours(config.grant_ttl_hours),
            grants: DashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            email: None,
            username: None,
            password_digest: None,
            grant_ttl: Duration::zero(),
            grants: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.password_digest.is_some()
    }

    /// True iff `identifier` is the operator email or username and the
    /// password matches.
    pub fn matches(&self, identifier: &str, password: &str) -> bool {
        let Some(expected) = self.password_digest.as_ref() else {
            return false;
        };
        let known = self.email.as_deref() == Some(identifier) || self.username.as_deref() == Some(identifier);
        // Always hash so a wrong identifier costs the same as a wrong password.
        let password_ok = constant_time_eq(expected, &digest(password));
        known && password_ok
    }

    /// Issue a grant when the credentials match.
    pub fn try_grant(&self, identifier: &str, password: &str) -> Option<AdminGrant> {
        if !self.matches(identifier, password) {
            return None;
        }
        self.purge_expired();
        let now = Utc::now();
        let grant = AdminGrant {
            token: generate_token(ADMIN_TOKEN_PREFIX),
            identifier: identifier.to_string(),
            issued_at: now,
            expires_at: now + self.grant_ttl,
        };
        self.grants.insert(grant.token.clone(), grant.clone());
        warn!(identifier = %identifier, "Operator access granted");
        Some(grant)
    }

    /// Look up a live grant. Expired grants are dropped.
    pub fn validate(&self, token: &str) -> Option<AdminGrant> {
        let grant = self.grants.get(token).map(|g| g.value().clone())?;
        if Utc::now() >= grant.expires_at {
            self.grants.remove(token);
            return None;
        }
        Some(grant)
    }

    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.grants.remove(token).is_some();
        if removed {
            info!("Operator grant revoked");
        }
        removed
    }

    /// Drop expired grants. Runs whenever a new grant is issued.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.grants.len();
        self.grants.retain(|_, g| now < g.expires_at);
        before.saturating_sub(self.grants.len())
    }

    pub fn active_grants(&self) -> usize {
        let now = Utc::now();
        self.grants.iter().filter(|g| now < g.value().expires_at).count()
    }

    pub fn is_admin_token(token: &str) -> bool {
        token.starts_with(ADMIN_TOKEN_PREFIX)
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gate() -> AdminGate {
        AdminGate::from_config(&AdminConfig {
            email: Some("owner@lines.example".into()),
            username: Some("palestine71023".into()),
            password: Some("correct horse".into()),
            grant_ttl_hours: 8,
        })
    }

    #[test]
    fn test_matches_email_or_username_with_password() {
        let gate = gate();
        assert!(gate.matches("palestine71023", "correct horse"));
        assert!(gate.matches("owner@lines.example", "correct horse"));
        assert!(!gate.matches("palestine71023", "wrong"));
        assert!(!gate.matches("someone-else", "correct horse"));
        assert!(!gate.matches("", ""));
    }

    #[test]
    fn test_disabled_gate_never_matches() {
        let gate = AdminGate::from_config(&AdminConfig::default());
        assert!(!gate.is_enabled());
        assert!(!gate.matches("", ""));
        assert!(gate.try_grant("admin", "admin").is_none());
    }

    #[test]
    fn test_grant_validate_revoke() {
        let gate = gate();
        let grant = gate.try_grant("palestine71023", "correct horse").unwrap();
        assert!(AdminGate::is_admin_token(&grant.token));
        assert_eq!(gate.validate(&grant.token).unwrap().identifier, "palestine71023");
        assert_eq!(gate.active_grants(), 1);

        assert!(gate.revoke(&grant.token));
        assert!(gate.validate(&grant.token).is_none());
        assert!(!gate.revoke(&grant.token));
    }

    #[test]
    fn test_expired_grant_is_rejected() {
        let gate = AdminGate::from_config(&AdminConfig {
            username: Some("op".into()),
            password: Some("pw".into()),
            grant_ttl_hours: 0,
            ..Default::default()
        });
        let grant = gate.try_grant("op", "pw").unwrap();
        assert!(gate.validate(&grant.token).is_none());
        assert_eq!(gate.active_grants(), 0);
    }

    #[test]
    fn test_expired_grants_swept_on_issue() {
        let gate = AdminGate::from_config(&AdminConfig {
            username: Some("op".into()),
            password: Some("pw".into()),
            grant_ttl_hours: 0,
            ..Default::default()
        });
        for _ in 0..3 {
            gate.try_grant("op", "pw").unwrap();
        }
        // Each issue swept the previous, never-validated grant.
        assert_eq!(gate.grants.len(), 1);
        assert_eq!(gate.purge_expired(), 1);
        assert!(gate.grants.is_empty());
    }
}
