//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::Role;

/// A blog post as persisted by the storage collaborator.
///
/// `id` is assigned by storage and never changes. `slug` is unique among live
/// posts and never empty once persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub meta_description: Option<String>,
    pub keywords: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

/// Account known to the credential collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}
