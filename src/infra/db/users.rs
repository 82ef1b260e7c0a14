use async_trait::async_trait;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::Role;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct UserRow {
    name: String,
    password_hash: String,
    role: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|err| RepoError::Integrity {
                message: format!("user `{}`: {err}", row.name),
            })?;
        Ok(Self {
            name: row.name,
            password_hash: row.password_hash,
            role,
        })
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_user(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT name, password_hash, role FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(UserRecord::try_from).transpose()
    }
}
