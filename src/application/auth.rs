//! Credential verification and the login/logout transitions of the session
//! authority.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::repos::{RepoError, UsersRepo, with_deadline};
use crate::application::session::{IssuedSession, SessionAuthority};
use crate::domain::entities::UserRecord;

/// Verified against when the username is unknown so both paths cost the same.
const DUMMY_PASSWORD: &str = "quillpress-unknown-account";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password and unknown user are deliberately the same variant.
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Produce an Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|err| AuthError::Hashing(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

/// Whether `hash` parses as a PHC string.
pub fn is_valid_hash(hash: &str) -> bool {
    PasswordHash::new(hash).is_ok()
}

pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<SessionAuthority>,
    storage_timeout: Duration,
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<SessionAuthority>,
        storage_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hash_password(DUMMY_PASSWORD)?;
        Ok(Self {
            users,
            sessions,
            storage_timeout,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionAuthority> {
        &self.sessions
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let username = username.trim();
        let account = if username.is_empty() {
            None
        } else {
            with_deadline(self.storage_timeout, self.users.find_user(username)).await?
        };

        let hash = match &account {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let matched = verify_password(hash, password.to_string()).await?;

        match account {
            Some(user) if matched => Ok(self.sessions.issue(&user.name, user.role)),
            _ => {
                counter!("quillpress_login_failures_total").increment(1);
                warn!(target = "quillpress::auth", "login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token)
    }
}

async fn verify_password(hash: String, password: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            error!(
                target = "quillpress::auth",
                error = %err,
                "stored password hash is malformed"
            );
            false
        }
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))
}

/// Accounts declared in configuration, consulted before the storage-backed
/// directory (if any).
pub struct AccountDirectory {
    configured: HashMap<String, UserRecord>,
    fallback: Option<Arc<dyn UsersRepo>>,
}

impl AccountDirectory {
    pub fn new(accounts: Vec<UserRecord>, fallback: Option<Arc<dyn UsersRepo>>) -> Self {
        let configured = accounts
            .into_iter()
            .map(|account| (account.name.clone(), account))
            .collect::<HashMap<_, _>>();
        info!(
            target = "quillpress::auth",
            configured = configured.len(),
            storage_backed = fallback.is_some(),
            "account directory ready"
        );
        Self {
            configured,
            fallback,
        }
    }
}

#[async_trait]
impl UsersRepo for AccountDirectory {
    async fn find_user(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        if let Some(account) = self.configured.get(name) {
            return Ok(Some(account.clone()));
        }
        match &self.fallback {
            Some(repo) => repo.find_user(name).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Capability, Role};
    use crate::infra::memory::MemoryRepositories;

    fn service(accounts: Vec<UserRecord>) -> AuthService {
        let directory = Arc::new(AccountDirectory::new(accounts, None));
        let sessions = Arc::new(SessionAuthority::new(time::Duration::hours(1)));
        AuthService::new(directory, sessions, Duration::from_secs(5)).expect("service")
    }

    fn account(name: &str, password: &str, role: Role) -> UserRecord {
        UserRecord {
            name: name.to_string(),
            password_hash: hash_password(password).expect("hash"),
            role,
        }
    }

    #[test]
    fn hashes_are_salted_phc_strings() {
        let first = hash_password("secret").expect("hash");
        let second = hash_password("secret").expect("hash");
        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(is_valid_hash(&first));
        assert!(!is_valid_hash("plaintext"));
    }

    #[tokio::test]
    async fn correct_credentials_issue_role_bearing_session() {
        let service = service(vec![account("admin", "hunter2", Role::Admin)]);
        let issued = service.login("admin", "hunter2").await.expect("login");

        assert_eq!(issued.session.role, Role::Admin);
        assert_eq!(
            service.sessions().classify(Some(&issued.token)),
            Capability::Admin
        );
        assert!(service.logout(&issued.token));
        assert_eq!(
            service.sessions().classify(Some(&issued.token)),
            Capability::Anonymous
        );
    }

    #[tokio::test]
    async fn failures_do_not_reveal_whether_user_exists() {
        let service = service(vec![account("admin", "hunter2", Role::Admin)]);

        let wrong_password = service.login("admin", "nope").await.expect_err("reject");
        let unknown_user = service.login("ghost", "nope").await.expect_err("reject");
        let blank = service.login("", "").await.expect_err("reject");

        for err in [&wrong_password, &unknown_user, &blank] {
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(service.sessions().is_empty());
    }

    #[tokio::test]
    async fn configured_accounts_shadow_storage() {
        let storage: Arc<dyn UsersRepo> = Arc::new(AccountDirectory::new(
            vec![account("writer", "from-db", Role::User)],
            None,
        ));
        let directory = AccountDirectory::new(
            vec![account("writer", "from-config", Role::Admin)],
            Some(storage),
        );

        let found = directory
            .find_user("writer")
            .await
            .expect("lookup")
            .expect("user");
        assert_eq!(found.role, Role::Admin);
        assert!(directory.find_user("nobody").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn storage_accounts_sign_in_when_config_has_none() {
        let storage = Arc::new(MemoryRepositories::new());
        storage
            .insert_user(account("editor", "quill", Role::User))
            .await;
        let directory = Arc::new(AccountDirectory::new(Vec::new(), Some(storage)));
        let sessions = Arc::new(SessionAuthority::new(time::Duration::hours(1)));
        let service =
            AuthService::new(directory, sessions, Duration::from_secs(5)).expect("service");

        let issued = service.login("editor", "quill").await.expect("login");
        assert_eq!(issued.session.role, Role::User);
        assert!(matches!(
            service.login("editor", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
