use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier partitioning all session and catalog data per requester.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub i64);

/// Opaque handle into the external media storage (photo, map bitmap, voice clip).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef(pub String);

pub const UNNAMED_ITEM: &str = "Без названия";

/// A cataloged household item.
///
/// `tags` is always a deduplicated subset of the noun lemmas of `description`,
/// capped at [`crate::tags::MAX_TAGS`] in order of first appearance.
/// `last_used` equals `created_at` at insert and is never refreshed by reads
/// or search matches in the current design.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner_id: OwnerId,
    pub name: String,
    pub description: String,
    pub photo_ref: MediaRef,
    pub tags: Vec<String>,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Insert payload; the store assigns `id` and stamps `created_at`/`last_used`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewItem {
    pub owner_id: OwnerId,
    pub name: Option<String>,
    pub description: String,
    pub photo_ref: MediaRef,
    pub tags: Vec<String>,
    pub location: String,
}

impl NewItem {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_ITEM)
    }
}
