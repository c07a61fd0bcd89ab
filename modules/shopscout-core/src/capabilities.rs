// Capability traits for the external collaborators of the pipeline.
//
// PostSource     - scraped posts for a profile (Apify in production)
// MediaProcessor - downloads a post's media and returns stored rows
// EmbeddingService / VectorSearch - semantic category lookup
// SearchIndexer  - eventually-consistent search index writes
//
// Mocks for all of them live in shopscout_domains::testing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::MediaRole;

// ---------------------------------------------------------------------------
// Scraping
// ---------------------------------------------------------------------------

/// A media URL attached to a scraped post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMedia {
    pub url: String,
    pub is_video: bool,
    /// Carousel index; a video and its poster share one.
    pub ordinal: i32,
}

/// One scraped post, independent of the source platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    /// Stable unique id (shortcode) used for idempotent ingestion.
    pub external_id: String,
    pub caption: Option<String>,
    pub permalink: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub media: Vec<RawMedia>,
}

#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<PostData>,
    pub end_cursor: Option<String>,
    pub has_more: bool,
}

#[async_trait]
pub trait PostSource: Send + Sync {
    async fn get_posts(&self, identifier: &str, limit: u32) -> Result<PostPage>;
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// A media asset after download, ready to be recorded against its post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub role: MediaRole,
    pub path: String,
    pub ordinal: i32,
    pub source_url: Option<String>,
}

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn process_post_media(&self, post_id: Uuid, post: &PostData) -> Result<Vec<StoredMedia>>;
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Dyn-compatible embedding trait (wraps ai_client::EmbedAgent).
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub document_id: String,
    pub distance: f32,
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Nearest documents in `collection`, closest first.
    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<VectorHit>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDocument {
    pub collection: String,
    pub id: String,
    pub body: serde_json::Value,
}

#[async_trait]
pub trait SearchIndexer: Send + Sync {
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<()>;
}
