use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::slug::in_family;

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str =
    "id, slug, title, body, meta_description, keywords, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    slug: String,
    title: String,
    body: String,
    meta_description: Option<String>,
    keywords: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            body: row.body,
            meta_description: row.meta_description,
            keywords: row.keywords,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let sql =
            format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }

    async fn list_live(&self) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_page(&self, offset: u64, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(offset).map_err(|_| RepoError::InvalidInput {
            message: format!("offset {offset} out of range"),
        })?;
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn count_live(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn slugs_in_family(
        &self,
        base: &str,
        exclude_id: i64,
    ) -> Result<Vec<String>, RepoError> {
        let prefix = format!("{base}-");
        let slugs: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM posts \
             WHERE deleted_at IS NULL AND id <> $3 \
               AND (slug = $1 OR left(slug, char_length($2)) = $2)",
        )
        .bind(base)
        .bind(&prefix)
        .bind(exclude_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(slugs
            .into_iter()
            .filter(|slug| in_family(base, slug))
            .collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            slug,
            title,
            body,
            meta_description,
            keywords,
        } = params;

        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO posts (slug, title, body, meta_description, keywords, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .bind(title)
            .bind(body)
            .bind(meta_description)
            .bind(keywords)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            slug,
            title,
            body,
            meta_description,
            keywords,
        } = params;

        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "UPDATE posts SET slug = $2, title = $3, body = $4, meta_description = $5, \
             keywords = $6, updated_at = $7 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(slug)
            .bind(title)
            .bind(body)
            .bind(meta_description)
            .bind(keywords)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "UPDATE posts SET deleted_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
