use serde::{Deserialize, Serialize};

use crate::domain::item::{MediaRef, OwnerId};

/// One floor plan per owner. `width`/`height` are the stored image's true
/// pixel dimensions read at save time; a later save replaces all three
/// payload fields atomically (insert-or-replace, one row per owner).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorMap {
    pub owner_id: OwnerId,
    pub image_ref: MediaRef,
    pub width: u32,
    pub height: u32,
}
