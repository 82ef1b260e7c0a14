//! Repository traits describing persistence adapters.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::files::FileAsset;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("storage call timed out")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Name of the constraint that keeps live slugs unique.
pub const LIVE_SLUG_CONSTRAINT: &str = "posts_live_slug_key";

/// Await a storage call, failing with [`RepoError::Timeout`] once `limit` elapses.
pub async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RepoError::Timeout),
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub meta_description: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub meta_description: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author: String,
    pub body: String,
}

/// Read access to live (not soft-deleted) posts.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    /// Every live post in one read, newest first.
    async fn list_live(&self) -> Result<Vec<PostRecord>, RepoError>;

    /// One page of live posts, newest first.
    async fn list_page(&self, offset: u64, limit: u32) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_live(&self) -> Result<u64, RepoError>;

    /// Live slugs equal to `base` or of the form `base-<digits>`, excluding
    /// the post identified by `exclude_id`.
    async fn slugs_in_family(&self, base: &str, exclude_id: i64)
    -> Result<Vec<String>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Insert a post. A live slug collision fails with
    /// [`RepoError::Duplicate`] naming [`LIVE_SLUG_CONSTRAINT`].
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Soft delete; the post stops being live and its slug becomes reusable.
    async fn delete_post(&self, id: i64) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError>;

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, name: &str) -> Result<Option<UserRecord>, RepoError>;
}

/// Resolves inline `{{file:NAME}}` references to served assets.
#[async_trait]
pub trait FileCatalog: Send + Sync {
    async fn lookup(&self, reference: &str) -> Result<Option<FileAsset>, RepoError>;
}
