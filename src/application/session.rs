//! Server-side session table.
//!
//! Tokens are opaque and only ever stored hashed: the table is keyed by the
//! SHA-256 digest of the token, so a leaked table snapshot cannot be replayed
//! as cookies. Expiry is evaluated lazily on lookup. Expired entries are also
//! reclaimed opportunistically every [`SWEEP_EVERY`] issuances.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use metrics::counter;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::types::{Capability, Role};

/// Issuances between opportunistic sweeps of expired entries.
pub const SWEEP_EVERY: u64 = 64;

/// Longest session lifetime the authority will grant.
pub const MAX_SESSION_TTL: Duration = Duration::days(365);

/// Longest cookie value worth hashing; real tokens are 43 characters.
const MAX_TOKEN_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    pub role: Role,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// A freshly issued session. `token` is handed to the client once.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

pub struct SessionAuthority {
    sessions: DashMap<String, Session>,
    ttl: Duration,
    issued: AtomicU64,
}

impl SessionAuthority {
    /// `ttl` is clamped to [`MAX_SESSION_TTL`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: ttl.min(MAX_SESSION_TTL),
            issued: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &str, role: Role) -> IssuedSession {
        self.issue_at(user, role, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user: &str, role: Role, now: OffsetDateTime) -> IssuedSession {
        let token = generate_token();
        let session = Session {
            user: user.to_string(),
            role,
            issued_at: now,
            expires_at: now.saturating_add(self.ttl),
        };
        self.sessions.insert(token_key(&token), session.clone());
        counter!("quillpress_sessions_issued_total").increment(1);
        info!(
            target = "quillpress::session",
            user,
            role = %role,
            "session issued"
        );

        let issued = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        if issued % SWEEP_EVERY == 0 {
            self.sweep_expired(now);
        }

        IssuedSession { token, session }
    }

    pub fn lookup(&self, token: &str) -> Option<Session> {
        self.lookup_at(token, OffsetDateTime::now_utc())
    }

    pub fn lookup_at(&self, token: &str, now: OffsetDateTime) -> Option<Session> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return None;
        }
        let key = token_key(token);
        let session = self.sessions.get(&key).map(|entry| entry.value().clone())?;
        if session.is_expired_at(now) {
            if self
                .sessions
                .remove_if(&key, |_, stored| stored.is_expired_at(now))
                .is_some()
            {
                counter!("quillpress_sessions_expired_total").increment(1);
            }
            return None;
        }
        Some(session)
    }

    /// Capability of a request presenting `token`. Unknown, expired and absent
    /// tokens are all anonymous.
    pub fn classify(&self, token: Option<&str>) -> Capability {
        self.classify_at(token, OffsetDateTime::now_utc())
    }

    pub fn classify_at(&self, token: Option<&str>, now: OffsetDateTime) -> Capability {
        token
            .and_then(|token| self.lookup_at(token, now))
            .map_or(Capability::Anonymous, |session| {
                Capability::from(session.role)
            })
    }

    /// Remove the session for `token`. Returns whether one existed.
    pub fn revoke(&self, token: &str) -> bool {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return false;
        }
        let removed = self.sessions.remove(&token_key(token));
        if let Some((_, session)) = &removed {
            counter!("quillpress_sessions_revoked_total").increment(1);
            info!(
                target = "quillpress::session",
                user = %session.user,
                "session revoked"
            );
        }
        removed.is_some()
    }

    pub fn sweep_expired(&self, now: OffsetDateTime) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        let swept = before.saturating_sub(self.sessions.len());
        if swept > 0 {
            counter!("quillpress_sessions_expired_total").increment(swept as u64);
            debug!(
                target = "quillpress::session",
                swept, "expired sessions reclaimed"
            );
        }
        swept
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn generate_token() -> String {
    let mut raw = [0u8; 32];
    raw[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    raw[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(raw)
}

fn token_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()).as_slice())
}
