//! Resolution of inbound slugs and legacy numeric ids to canonical posts.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::application::repos::{PostsRepo, RepoError, with_deadline};
use crate::application::site::SiteIdentity;
use crate::domain::entities::PostRecord;
use crate::infra::cache::PostCache;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("slug segment is empty")]
    EmptySlug,
    #[error("post id `{raw}` is not numeric")]
    InvalidId { raw: String },
    #[error("no live post matches the request")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub post: PostRecord,
    pub canonical_url: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedById {
    pub post: PostRecord,
    pub canonical_url: String,
    /// Whether the id-based address may serve content directly. Every
    /// persisted post has a slug, so this is false in practice and callers
    /// answer with a permanent redirect.
    pub is_canonical: bool,
}

pub struct ContentResolver {
    posts: Arc<dyn PostsRepo>,
    cache: Option<Arc<PostCache>>,
    site: Arc<SiteIdentity>,
    storage_timeout: Duration,
}

impl ContentResolver {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        cache: Option<Arc<PostCache>>,
        site: Arc<SiteIdentity>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            posts,
            cache,
            site,
            storage_timeout,
        }
    }

    pub async fn resolve_by_slug(&self, slug: &str) -> Result<Resolved, ContentError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(ContentError::EmptySlug);
        }

        let post = match self.cache.as_ref().and_then(|cache| cache.get_by_slug(slug)) {
            Some(post) => post,
            None => {
                let observed = self.cache.as_ref().map(|cache| cache.generation());
                let post = with_deadline(self.storage_timeout, self.posts.find_by_slug(slug))
                    .await?
                    .ok_or(ContentError::NotFound)?;
                self.remember(observed, &post);
                post
            }
        };

        Ok(Resolved {
            canonical_url: self.site.post_url(&post.slug),
            post,
        })
    }

    /// Resolve the raw `id` query value of a legacy address.
    pub async fn resolve_by_id_param(&self, raw: &str) -> Result<ResolvedById, ContentError> {
        let id = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ContentError::InvalidId {
                raw: raw.to_string(),
            })?;
        self.resolve_by_id(id).await
    }

    pub async fn resolve_by_id(&self, id: i64) -> Result<ResolvedById, ContentError> {
        let post = match self.cache.as_ref().and_then(|cache| cache.get_by_id(id)) {
            Some(post) => post,
            None => {
                let observed = self.cache.as_ref().map(|cache| cache.generation());
                let post = with_deadline(self.storage_timeout, self.posts.find_by_id(id))
                    .await?
                    .ok_or(ContentError::NotFound)?;
                self.remember(observed, &post);
                post
            }
        };

        Ok(ResolvedById {
            canonical_url: self.site.post_url(&post.slug),
            is_canonical: post.slug.is_empty(),
            post,
        })
    }

    /// Drop every cached resolution. Writers call this before acknowledging.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    fn remember(&self, observed: Option<u64>, post: &PostRecord) {
        if let (Some(cache), Some(observed)) = (&self.cache, observed) {
            cache.fill(observed, post.clone());
        }
    }
}
