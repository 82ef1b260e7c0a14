use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, PostsRepo, RepoError, with_deadline,
};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::ensure_non_empty;

/// Longest accepted comment body, in characters.
pub const MAX_COMMENT_CHARS: usize = 4_000;

#[derive(Debug, Error)]
pub enum CommentServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    storage_timeout: Duration,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            posts,
            comments,
            storage_timeout,
        }
    }

    pub async fn for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, CommentServiceError> {
        Ok(with_deadline(self.storage_timeout, self.comments.list_for_post(post_id)).await?)
    }

    pub async fn create(
        &self,
        post_id: i64,
        author: &str,
        body: &str,
    ) -> Result<CommentRecord, CommentServiceError> {
        ensure_non_empty(body, "comment")?;
        if body.chars().count() > MAX_COMMENT_CHARS {
            return Err(DomainError::validation(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            ))
            .into());
        }

        with_deadline(self.storage_timeout, self.posts.find_by_id(post_id))
            .await?
            .ok_or(CommentServiceError::PostNotFound)?;

        let comment = with_deadline(
            self.storage_timeout,
            self.comments.create_comment(CreateCommentParams {
                post_id,
                author: author.to_string(),
                body: body.trim().to_string(),
            }),
        )
        .await?;

        info!(
            target = "quillpress::comments",
            author,
            post_id,
            comment_id = comment.id,
            "comment created"
        );
        Ok(comment)
    }

    /// Remove a comment, returning it so callers can redirect to its post.
    pub async fn delete(
        &self,
        actor: &str,
        comment_id: i64,
    ) -> Result<CommentRecord, CommentServiceError> {
        let comment = with_deadline(self.storage_timeout, self.comments.find_comment(comment_id))
            .await?
            .ok_or(CommentServiceError::NotFound)?;

        match with_deadline(self.storage_timeout, self.comments.delete_comment(comment_id)).await {
            Ok(()) => {}
            Err(RepoError::NotFound) => return Err(CommentServiceError::NotFound),
            Err(err) => return Err(err.into()),
        }

        info!(
            target = "quillpress::comments",
            actor,
            comment_id,
            post_id = comment.post_id,
            "comment deleted"
        );
        Ok(comment)
    }
}
