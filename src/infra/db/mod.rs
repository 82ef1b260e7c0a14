//! Postgres-backed repository implementations.

mod comments;
mod posts;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
    query,
};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a pool whose sessions cancel any statement running longer than
    /// `statement_timeout`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        statement_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        let timeout_ms = statement_timeout.as_millis().to_string();
        let options = url
            .parse::<PgConnectOptions>()?
            .options([("statement_timeout", timeout_ms.as_str())]);

        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(statement_timeout)
            .connect_with(options)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}
