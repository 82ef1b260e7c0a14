//! In-process repositories used when no database is configured and by tests.
//!
//! Enforces the same live-slug uniqueness as the Postgres index, reporting
//! violations as [`RepoError::Duplicate`] on [`LIVE_SLUG_CONSTRAINT`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, LIVE_SLUG_CONSTRAINT, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::slug::in_family;

#[derive(Debug, Clone)]
struct StoredPost {
    record: PostRecord,
    deleted_at: Option<OffsetDateTime>,
}

impl StoredPost {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Default)]
struct State {
    posts: BTreeMap<i64, StoredPost>,
    comments: BTreeMap<i64, CommentRecord>,
    next_post_id: i64,
    next_comment_id: i64,
}

impl State {
    fn live(&self) -> impl Iterator<Item = &PostRecord> {
        self.posts
            .values()
            .filter(|stored| stored.is_live())
            .map(|stored| &stored.record)
    }

    fn ensure_slug_free(&self, slug: &str, owner: i64) -> Result<(), RepoError> {
        if self
            .live()
            .any(|post| post.slug == slug && post.id != owner)
        {
            return Err(RepoError::Duplicate {
                constraint: LIVE_SLUG_CONSTRAINT.to_string(),
            });
        }
        Ok(())
    }

    fn newest_first(&self) -> Vec<PostRecord> {
        let mut posts: Vec<_> = self.live().cloned().collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        posts
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepositories {
    state: RwLock<State>,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.name.clone(), user);
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .get(&id)
            .filter(|stored| stored.is_live())
            .map(|stored| stored.record.clone()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.live().find(|post| post.slug == slug).cloned())
    }

    async fn list_live(&self) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self.state.read().await.newest_first())
    }

    async fn list_page(&self, offset: u64, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(self
            .state
            .read()
            .await
            .newest_first()
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    async fn count_live(&self) -> Result<u64, RepoError> {
        Ok(self.state.read().await.live().count() as u64)
    }

    async fn slugs_in_family(
        &self,
        base: &str,
        exclude_id: i64,
    ) -> Result<Vec<String>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .live()
            .filter(|post| post.id != exclude_id && in_family(base, &post.slug))
            .map(|post| post.slug.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        if params.slug.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "slug must not be empty".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.ensure_slug_free(&params.slug, 0)?;

        state.next_post_id += 1;
        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: state.next_post_id,
            slug: params.slug,
            title: params.title,
            body: params.body,
            meta_description: params.meta_description,
            keywords: params.keywords,
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(
            record.id,
            StoredPost {
                record: record.clone(),
                deleted_at: None,
            },
        );
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        if params.slug.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "slug must not be empty".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.ensure_slug_free(&params.slug, params.id)?;

        let stored = state
            .posts
            .get_mut(&params.id)
            .filter(|stored| stored.is_live())
            .ok_or(RepoError::NotFound)?;
        let record = &mut stored.record;
        record.slug = params.slug;
        record.title = params.title;
        record.body = params.body;
        record.meta_description = params.meta_description;
        record.keywords = params.keywords;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        let stored = state
            .posts
            .get_mut(&id)
            .filter(|stored| stored.is_live())
            .ok_or(RepoError::NotFound)?;
        stored.deleted_at = Some(OffsetDateTime::now_utc());
        Ok(stored.record.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.state.read().await.comments.get(&id).cloned())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("post {} does not exist", params.post_id),
            });
        }

        state.next_comment_id += 1;
        let comment = CommentRecord {
            id: state.next_comment_id,
            post_id: params.post_id,
            author: params.author,
            body: params.body,
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError> {
        self.state
            .write()
            .await
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn find_user(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.read().await.get(name).cloned())
    }
}
