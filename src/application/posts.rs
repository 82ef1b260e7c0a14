//! Post authoring and listing.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::application::content::ContentResolver;
use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, with_deadline,
};
use crate::application::slugs::{SlugResolveError, SlugResolver};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::{ensure_non_empty, normalize_optional};
use crate::domain::slug::{derive_slug, in_family};

pub const POSTS_PER_PAGE: u32 = 10;

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Slug(#[from] SlugResolveError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub body: String,
    pub meta_description: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub meta_description: Option<String>,
    pub keywords: Option<String>,
}

/// One page of the public index.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostRecord>,
    pub page: u32,
    pub total: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    slugs: Arc<SlugResolver>,
    content: Arc<ContentResolver>,
    storage_timeout: Duration,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        slugs: Arc<SlugResolver>,
        content: Arc<ContentResolver>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            writer,
            slugs,
            content,
            storage_timeout,
        }
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreatePostCommand,
    ) -> Result<PostRecord, PostServiceError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.body, "body")?;

        let title = command.title.trim().to_string();
        let meta_description = normalize_optional(command.meta_description);
        let keywords = normalize_optional(command.keywords);
        let candidate = derive_slug(&title);

        let writer = self.writer.clone();
        let timeout = self.storage_timeout;
        let post = self
            .slugs
            .reserve(&candidate, 0, |slug| {
                let writer = writer.clone();
                let params = CreatePostParams {
                    slug,
                    title: title.clone(),
                    body: command.body.clone(),
                    meta_description: meta_description.clone(),
                    keywords: keywords.clone(),
                };
                async move { with_deadline(timeout, writer.create_post(params)).await }
            })
            .await?;

        self.content.invalidate();
        info!(
            target = "quillpress::posts",
            actor,
            post_id = post.id,
            slug = %post.slug,
            "post created"
        );
        Ok(post)
    }

    /// Apply new content. The slug is regenerated only when the title
    /// derives to a different slug family than the current one.
    pub async fn update(
        &self,
        actor: &str,
        command: UpdatePostCommand,
    ) -> Result<PostRecord, PostServiceError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.body, "body")?;

        let existing = self.find(command.id).await?;
        let title = command.title.trim().to_string();
        let meta_description = normalize_optional(command.meta_description);
        let keywords = normalize_optional(command.keywords);

        let params = |slug: String| UpdatePostParams {
            id: existing.id,
            slug,
            title: title.clone(),
            body: command.body.clone(),
            meta_description: meta_description.clone(),
            keywords: keywords.clone(),
        };

        let candidate = derive_slug(&title);
        let post = if title == existing.title || in_family(&candidate, &existing.slug) {
            with_deadline(
                self.storage_timeout,
                self.writer.update_post(params(existing.slug.clone())),
            )
            .await?
        } else {
            let writer = self.writer.clone();
            let timeout = self.storage_timeout;
            self.slugs
                .reserve(&candidate, existing.id, |slug| {
                    let writer = writer.clone();
                    let params = params(slug);
                    async move { with_deadline(timeout, writer.update_post(params)).await }
                })
                .await?
        };

        self.content.invalidate();
        info!(
            target = "quillpress::posts",
            actor,
            post_id = post.id,
            slug = %post.slug,
            previous_slug = %existing.slug,
            "post updated"
        );
        Ok(post)
    }

    /// Soft delete. The slug becomes free for reuse.
    pub async fn delete(&self, actor: &str, id: i64) -> Result<PostRecord, PostServiceError> {
        let post = match with_deadline(self.storage_timeout, self.writer.delete_post(id)).await {
            Ok(post) => post,
            Err(RepoError::NotFound) => return Err(PostServiceError::NotFound),
            Err(err) => return Err(err.into()),
        };

        self.content.invalidate();
        info!(
            target = "quillpress::posts",
            actor,
            post_id = post.id,
            slug = %post.slug,
            "post deleted"
        );
        Ok(post)
    }

    pub async fn find(&self, id: i64) -> Result<PostRecord, PostServiceError> {
        with_deadline(self.storage_timeout, self.reader.find_by_id(id))
            .await?
            .ok_or(PostServiceError::NotFound)
    }

    /// 1-based page of live posts, newest first. Pages past the end are empty.
    pub async fn list_page(&self, page: u32) -> Result<PostPage, PostServiceError> {
        let page = page.max(1);
        let total = with_deadline(self.storage_timeout, self.reader.count_live()).await?;
        let offset = u64::from(page - 1) * u64::from(POSTS_PER_PAGE);

        let posts = if offset >= total {
            Vec::new()
        } else {
            with_deadline(
                self.storage_timeout,
                self.reader.list_page(offset, POSTS_PER_PAGE),
            )
            .await?
        };

        Ok(PostPage {
            has_previous: page > 1,
            has_next: offset + u64::from(POSTS_PER_PAGE) < total,
            posts,
            page,
            total,
        })
    }
}
