//! In-process post cache backing the content resolver.
//!
//! Two LRU maps (id → post, slug → id) sit behind std `RwLock`s. Every
//! invalidation bumps a generation counter; fills carry the generation they
//! observed before reading storage and are dropped if it moved, so a read
//! that raced a write can never repopulate pre-write data.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;
use metrics::counter;
use tracing::warn;

use crate::domain::entities::PostRecord;

const SOURCE: &str = "infra::cache";

pub struct PostCache {
    by_id: RwLock<LruCache<i64, PostRecord>>,
    slug_to_id: RwLock<LruCache<String, i64>>,
    generation: AtomicU64,
}

impl PostCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            by_id: RwLock::new(LruCache::new(capacity)),
            slug_to_id: RwLock::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
        }
    }

    /// Generation to pass to [`PostCache::fill`] after the storage read.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get_by_id(&self, id: i64) -> Option<PostRecord> {
        let hit = rw_write(&self.by_id, "get_by_id").get(&id).cloned();
        record_lookup(hit.is_some());
        hit
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<PostRecord> {
        let id = rw_write(&self.slug_to_id, "get_by_slug.index")
            .get(slug)
            .copied();
        let hit = id
            .and_then(|id| rw_write(&self.by_id, "get_by_slug.post").get(&id).cloned())
            .filter(|post| post.slug == slug);
        record_lookup(hit.is_some());
        hit
    }

    /// Store `post` unless an invalidation happened since `observed`.
    pub fn fill(&self, observed: u64, post: PostRecord) -> bool {
        let mut by_id = rw_write(&self.by_id, "fill.by_id");
        if self.generation.load(Ordering::Acquire) != observed {
            return false;
        }
        let mut slug_to_id = rw_write(&self.slug_to_id, "fill.slug_to_id");
        slug_to_id.put(post.slug.clone(), post.id);
        by_id.put(post.id, post);
        true
    }

    pub fn invalidate_all(&self) {
        let mut by_id = rw_write(&self.by_id, "invalidate_all.by_id");
        let mut slug_to_id = rw_write(&self.slug_to_id, "invalidate_all.slug_to_id");
        self.generation.fetch_add(1, Ordering::AcqRel);
        by_id.clear();
        slug_to_id.clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.by_id, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_lookup(hit: bool) {
    if hit {
        counter!("quillpress_post_cache_hit_total").increment(1);
    } else {
        counter!("quillpress_post_cache_miss_total").increment(1);
    }
}

fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn post(id: i64, slug: &str) -> PostRecord {
        PostRecord {
            id,
            slug: slug.to_string(),
            title: format!("Post {id}"),
            body: "body".to_string(),
            meta_description: None,
            keywords: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-02 0:00 UTC),
        }
    }

    fn cache(capacity: usize) -> PostCache {
        PostCache::new(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    #[test]
    fn fill_then_lookup_by_either_key() {
        let cache = cache(4);
        assert!(cache.fill(cache.generation(), post(1, "hello")));
        assert_eq!(cache.get_by_id(1).map(|p| p.slug), Some("hello".into()));
        assert_eq!(cache.get_by_slug("hello").map(|p| p.id), Some(1));
        assert!(cache.get_by_slug("other").is_none());
    }

    #[test]
    fn stale_fill_after_invalidation_is_dropped() {
        let cache = cache(4);
        let observed = cache.generation();
        cache.invalidate_all();
        assert!(!cache.fill(observed, post(1, "old-slug")));
        assert!(cache.is_empty());
        assert!(cache.get_by_slug("old-slug").is_none());
    }

    #[test]
    fn renamed_post_does_not_answer_for_old_slug() {
        let cache = cache(4);
        cache.fill(cache.generation(), post(1, "before"));
        cache.fill(cache.generation(), post(1, "after"));
        assert!(cache.get_by_slug("before").is_none());
        assert_eq!(cache.get_by_slug("after").map(|p| p.id), Some(1));
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = cache(2);
        for id in 1..=3 {
            cache.fill(cache.generation(), post(id, &format!("p{id}")));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get_by_id(1).is_none());
    }
}
