//! Caller credentials and per-team authorization
//!
//! The relay only asks one question of access control: may this caller read
//! pipes belonging to this team? How the answer is reached is up to the
//! implementation behind [`AccessControl`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use parking_lot::RwLock;

use crate::config::AuthSettings;

/// Credential presented by the caller of a read request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    bearer: Option<String>,
}

impl Credential {
    /// Credential carrying a bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    /// No credential at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Extract the bearer token from an `Authorization` header, if any
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.trim().split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
            })
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Self { bearer }
    }

    /// The raw bearer token
    pub fn token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Value for an outgoing `Authorization` header
    pub fn authorization_header(&self) -> Option<String> {
        self.bearer.as_ref().map(|token| format!("Bearer {}", token))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.bearer.is_some() { "Bearer <redacted>" } else { "anonymous" };
        f.debug_tuple("Credential").field(&shown).finish()
    }
}

/// Capability check keyed by team name
pub trait AccessControl: Send + Sync {
    /// Whether `credential` may read pipes of `team_name`
    fn is_authorized(&self, credential: &Credential, team_name: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
struct Grant {
    teams: HashSet<String>,
    admin: bool,
}

/// Static bearer-token grants
///
/// A token authorizes the teams it was granted, or every team when it is an
/// admin token. Unknown and missing tokens are refused.
#[derive(Default)]
pub struct TokenAccessControl {
    grants: RwLock<HashMap<String, Grant>>,
}

impl TokenAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[auth]` configuration section
    pub fn from_settings(settings: &AuthSettings) -> Self {
        let access = Self::new();
        for entry in &settings.tokens {
            if entry.admin {
                access.grant_admin(&entry.token);
            }
            for team in &entry.teams {
                access.grant(&entry.token, team);
            }
        }
        access
    }

    /// Allow `token` to read pipes of `team`
    pub fn grant(&self, token: &str, team: &str) {
        self.grants
            .write()
            .entry(token.to_string())
            .or_default()
            .teams
            .insert(team.to_string());
    }

    /// Allow `token` to read pipes of every team
    pub fn grant_admin(&self, token: &str) {
        self.grants.write().entry(token.to_string()).or_default().admin = true;
    }

    /// Number of known tokens
    pub fn len(&self) -> usize {
        self.grants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.read().is_empty()
    }
}

impl AccessControl for TokenAccessControl {
    fn is_authorized(&self, credential: &Credential, team_name: &str) -> bool {
        let Some(token) = credential.token() else {
            return false;
        };
        self.grants
            .read()
            .get(token)
            .map(|grant| grant.admin || grant.teams.contains(team_name))
            .unwrap_or(false)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
