//! Slug uniqueness among live posts.
//!
//! Checking for a free slug and persisting the row that claims it happen
//! inside one single-writer section. Storage keeps its own unique index on
//! live slugs; a violation reported by it (another process, a manual edit)
//! marks that slug taken and the next suffix is tried.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::repos::{LIVE_SLUG_CONSTRAINT, PostsRepo, RepoError, with_deadline};
use crate::domain::slug::{SlugError, first_free};

/// Storage-reported collisions tolerated before giving up on one write.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum SlugResolveError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("slug `{base}` kept colliding after {attempts} storage attempts")]
    Contention { base: String, attempts: usize },
}

pub struct SlugResolver {
    posts: Arc<dyn PostsRepo>,
    storage_timeout: Duration,
    write_gate: Mutex<()>,
}

impl SlugResolver {
    pub fn new(posts: Arc<dyn PostsRepo>, storage_timeout: Duration) -> Self {
        Self {
            posts,
            storage_timeout,
            write_gate: Mutex::new(()),
        }
    }

    /// Return `candidate`, or `candidate-N` for the smallest free `N >= 2`,
    /// ignoring the row of `owner_id` (0 for a post not yet stored).
    ///
    /// The answer is only a snapshot; use [`SlugResolver::reserve`] to claim it.
    pub async fn ensure_unique(
        &self,
        candidate: &str,
        owner_id: i64,
    ) -> Result<String, SlugResolveError> {
        self.ensure_unique_avoiding(candidate, owner_id, &HashSet::new())
            .await
    }

    /// Pick a unique slug and hand it to `write`, which must persist the row
    /// claiming it. Runs under the write gate, so concurrent callers never
    /// observe the same free slug.
    pub async fn reserve<T, F, Fut>(
        &self,
        candidate: &str,
        owner_id: i64,
        mut write: F,
    ) -> Result<T, SlugResolveError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        let _gate = self.write_gate.lock().await;
        let mut rejected = HashSet::new();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let slug = self
                .ensure_unique_avoiding(candidate, owner_id, &rejected)
                .await?;

            match write(slug.clone()).await {
                Ok(value) => return Ok(value),
                Err(RepoError::Duplicate { constraint }) if constraint == LIVE_SLUG_CONSTRAINT => {
                    counter!("quillpress_slug_collisions_total").increment(1);
                    warn!(
                        target = "quillpress::slugs",
                        slug = %slug,
                        attempt,
                        "storage rejected slug as duplicate; retrying with next suffix"
                    );
                    rejected.insert(slug);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SlugResolveError::Contention {
            base: candidate.to_string(),
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn ensure_unique_avoiding(
        &self,
        candidate: &str,
        owner_id: i64,
        rejected: &HashSet<String>,
    ) -> Result<String, SlugResolveError> {
        let existing = with_deadline(
            self.storage_timeout,
            self.posts.slugs_in_family(candidate, owner_id),
        )
        .await?;

        let mut taken: HashSet<String> = existing.into_iter().collect();
        taken.extend(rejected.iter().cloned());

        let slug = first_free(candidate, &taken)?;
        if slug != candidate {
            counter!("quillpress_slug_collisions_total").increment(1);
            debug!(
                target = "quillpress::slugs",
                candidate,
                resolved = %slug,
                "slug collision resolved with suffix"
            );
        }
        Ok(slug)
    }
}
