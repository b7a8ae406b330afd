//! Cart ownership: an authenticated user or an anonymous guest session.
//!
//! Exactly one identity owns a cart at any time. Guests are keyed by an
//! opaque client-supplied session token; logging in merges the guest cart
//! into the user cart (see the reservation service).

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Upper bound on client-supplied session tokens.
pub const MAX_SESSION_TOKEN_LEN: usize = 128;

/// Opaque anonymous-session token (non-empty, bounded length).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> DomainResult<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("session token cannot be empty"));
        }
        if trimmed.len() > MAX_SESSION_TOKEN_LEN {
            return Err(DomainError::validation(format!(
                "session token exceeds {MAX_SESSION_TOKEN_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity that owns a cart: a user id XOR a guest session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    User(UserId),
    Guest(SessionToken),
}

impl Owner {
    pub fn is_guest(&self) -> bool {
        matches!(self, Owner::Guest(_))
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Guest(_) => None,
        }
    }

    pub fn session_token(&self) -> Option<&SessionToken> {
        match self {
            Owner::User(_) => None,
            Owner::Guest(token) => Some(token),
        }
    }
}

impl core::fmt::Display for Owner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Owner::User(id) => write!(f, "user:{id}"),
            Owner::Guest(token) => write!(f, "guest:{token}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_rejects_empty_and_whitespace() {
        assert!(SessionToken::new("").is_err());
        assert!(SessionToken::new("   ").is_err());
    }

    #[test]
    fn session_token_rejects_oversized() {
        let long = "x".repeat(MAX_SESSION_TOKEN_LEN + 1);
        assert!(SessionToken::new(long).is_err());
    }

    #[test]
    fn session_token_trims_surrounding_whitespace() {
        let token = SessionToken::new("  sess-abc  ").unwrap();
        assert_eq!(token.as_str(), "sess-abc");
    }

    #[test]
    fn owner_exposes_exactly_one_identity() {
        let user = Owner::User(UserId::new());
        assert!(user.user_id().is_some());
        assert!(user.session_token().is_none());
        assert!(!user.is_guest());

        let guest = Owner::Guest(SessionToken::new("sess-1").unwrap());
        assert!(guest.user_id().is_none());
        assert!(guest.session_token().is_some());
        assert!(guest.is_guest());
    }
}
