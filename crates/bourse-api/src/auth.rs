//! Request authentication.
//!
//! Trade and leaderboard routes resolve a session bearer token to an account
//! through a [`SessionVerifier`]. Cron routes compare the bearer token
//! against a shared secret.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use bourse_core::AccountId;
use tracing::warn;
use zeroize::Zeroizing;

use crate::config::StaticSession;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: AccountId,
    pub display_name: String,
}

/// Resolves session tokens to accounts.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// `None` if the token is unknown or expired.
    async fn verify(&self, token: &str) -> Option<Session>;
}

/// Fixed token table loaded from configuration.
#[derive(Default)]
pub struct StaticSessions {
    tokens: HashMap<String, Session>,
}

impl StaticSessions {
    #[must_use]
    pub fn new(sessions: &[StaticSession]) -> Self {
        let tokens = sessions
            .iter()
            .filter(|s| !s.token.is_empty())
            .map(|s| {
                let session = Session {
                    account_id: AccountId::new(s.account_id.clone()),
                    display_name: s.display_name.clone().unwrap_or_else(|| s.account_id.clone()),
                };
                (s.token.clone(), session)
            })
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl SessionVerifier for StaticSessions {
    async fn verify(&self, token: &str) -> Option<Session> {
        self.tokens.get(token).cloned()
    }
}

/// Shared-secret check for scheduler-facing routes.
pub struct CronAuth {
    secret: Option<Zeroizing<String>>,
}

impl CronAuth {
    /// With no secret every cron request is rejected.
    #[must_use]
    pub fn new(secret: Option<Zeroizing<String>>) -> Self {
        let secret = secret.filter(|s| !s.is_empty());
        if secret.is_none() {
            warn!("No cron secret configured, cron routes will reject all requests");
        }
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, headers: &HeaderMap) -> bool {
        match (&self.secret, bearer_token(headers)) {
            (Some(secret), Some(token)) => constant_time_eq(secret.as_bytes(), token.as_bytes()),
            _ => false,
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cron_auth() {
        let auth = CronAuth::new(Some(Zeroizing::new("tick".to_string())));
        assert!(auth.verify(&headers("Bearer tick")));
        assert!(!auth.verify(&headers("Bearer tock")));
        assert!(!auth.verify(&headers("Bearer tic")));

        let open = CronAuth::new(None);
        assert!(!open.is_configured());
        assert!(!open.verify(&headers("Bearer tick")));
    }

    #[tokio::test]
    async fn test_static_sessions() {
        let sessions = StaticSessions::new(&[
            StaticSession {
                token: "t-alice".to_string(),
                account_id: "alice".to_string(),
                display_name: Some("Alice".to_string()),
            },
            StaticSession {
                token: String::new(),
                account_id: "ignored".to_string(),
                display_name: None,
            },
        ]);
        assert_eq!(sessions.len(), 1);

        let session = sessions.verify("t-alice").await.unwrap();
        assert_eq!(session.account_id, AccountId::new("alice"));
        assert_eq!(session.display_name, "Alice");
        assert!(sessions.verify("nope").await.is_none());
    }
}
