use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use homestash_core::domain::item::MediaRef;

/// Marker drawn by [`MediaStore::annotate`]: a ring of this radius, this many
/// pixels thick, centered on the requested point.
pub const MARKER_RADIUS: u32 = 10;
pub const MARKER_WIDTH: u32 = 3;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("media store failed: {0}")]
    Store(String),
    #[error("media fetch failed for `{reference}`: {detail}")]
    Fetch { reference: String, detail: String },
    #[error("media decode failed for `{reference}`: {detail}")]
    Decode { reference: String, detail: String },
}

/// External photo/bitmap storage. The engine never touches raw bytes; it only
/// moves opaque refs between the transport, this store, and the catalog.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist an inbound attachment and return a durable ref for it.
    async fn store_photo(&self, source: &MediaRef) -> Result<MediaRef, MediaError>;

    /// Pixel dimensions of a stored image, read from the actual bytes.
    async fn image_dimensions(&self, image: &MediaRef) -> Result<(u32, u32), MediaError>;

    /// Draw the fixed marker at `(x, y)` on a copy of the image and return
    /// the copy's ref. The original is left untouched.
    async fn annotate(&self, image: &MediaRef, x: i64, y: i64) -> Result<MediaRef, MediaError>;
}

/// Media store backed by process memory. Dimensions are registered per ref up
/// front; unknown refs fall back to `default_dimensions`. Annotation mints a
/// fresh ref without touching any bytes.
pub struct InMemoryMediaStore {
    dimensions: RwLock<HashMap<String, (u32, u32)>>,
    default_dimensions: (u32, u32),
    annotation_seq: AtomicU64,
}

impl InMemoryMediaStore {
    pub fn new(default_dimensions: (u32, u32)) -> Self {
        Self {
            dimensions: RwLock::new(HashMap::new()),
            default_dimensions,
            annotation_seq: AtomicU64::new(0),
        }
    }

    pub async fn register_dimensions(&self, image: &MediaRef, width: u32, height: u32) {
        self.dimensions.write().await.insert(image.0.clone(), (width, height));
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new((640, 480))
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn store_photo(&self, source: &MediaRef) -> Result<MediaRef, MediaError> {
        Ok(MediaRef(format!("stored:{}", source.0)))
    }

    async fn image_dimensions(&self, image: &MediaRef) -> Result<(u32, u32), MediaError> {
        let dimensions = self.dimensions.read().await;
        Ok(dimensions.get(&image.0).copied().unwrap_or(self.default_dimensions))
    }

    async fn annotate(&self, image: &MediaRef, x: i64, y: i64) -> Result<MediaRef, MediaError> {
        let seq = self.annotation_seq.fetch_add(1, Ordering::SeqCst);
        Ok(MediaRef(format!("{}:marked-{x}x{y}-{seq}", image.0)))
    }
}
