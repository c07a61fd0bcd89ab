// Test mocks for the extraction pipeline.
//
// One mock per capability boundary:
// - MockLlm (StructuredCompletion) - scripted answers plus caption rules
// - MockPostSource (PostSource) - identifier to scraped posts
// - MockMediaProcessor (MediaProcessor) - fake stored paths, no downloads
// - FixedEmbedder (EmbeddingService) - deterministic hash-based vectors
// - MockVectorSearch (VectorSearch) - query text to a fixed hit
// - RecordingIndexer (SearchIndexer) - keeps every upserted document
//
// Plus helpers for building PostData.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ai_client::{AiError, JsonSchemaSpec, Message, StructuredCompletion};
use shopscout_core::{
    EmbeddingService, MediaProcessor, MediaRole, PostData, PostPage, PostSource, RawMedia,
    SearchDocument, SearchIndexer, StoredMedia, VectorHit, VectorSearch,
};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Embedding dimension for test vectors.
pub const TEST_EMBEDDING_DIM: usize = 8;

// ---------------------------------------------------------------------------
// MockLlm
// ---------------------------------------------------------------------------

enum Step {
    Respond(String),
    Transient,
    Permanent,
}

/// Scripted structured-completion backend.
///
/// Scripted steps are consumed first, in order. After that, the first rule
/// whose fragment appears in any message answers, then the `always` answer.
/// With nothing left the call fails with an empty-response error.
pub struct MockLlm {
    script: Mutex<VecDeque<Step>>,
    rules: Vec<(String, String)>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_images: AtomicUsize,
    schemas: Mutex<Vec<JsonSchemaSpec>>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
            last_images: AtomicUsize::new(0),
            schemas: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, answer: &str) -> Self {
        lock(&self.script).push_back(Step::Respond(answer.to_string()));
        self
    }

    /// A 503 from the provider.
    pub fn fail_transient(self) -> Self {
        lock(&self.script).push_back(Step::Transient);
        self
    }

    /// A 400 from the provider.
    pub fn fail_permanent(self) -> Self {
        lock(&self.script).push_back(Step::Permanent);
        self
    }

    /// Answer with `answer` whenever a message contains `fragment`.
    pub fn when(mut self, fragment: &str, answer: &str) -> Self {
        self.rules.push((fragment.to_string(), answer.to_string()));
        self
    }

    pub fn always(mut self, answer: &str) -> Self {
        self.fallback = Some(answer.to_string());
        self
    }

    /// Sleep before answering, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Images attached to the most recent request.
    pub fn last_image_count(&self) -> usize {
        self.last_images.load(Ordering::SeqCst)
    }

    pub fn schemas(&self) -> Vec<JsonSchemaSpec> {
        lock(&self.schemas).clone()
    }
}

#[async_trait]
impl StructuredCompletion for MockLlm {
    async fn complete(&self, messages: &[Message], schema: &JsonSchemaSpec) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_images.store(
            messages.iter().map(|m| m.images.len()).sum(),
            Ordering::SeqCst,
        );
        lock(&self.schemas).push(schema.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = lock(&self.script).pop_front();
        match step {
            Some(Step::Respond(answer)) => return Ok(answer),
            Some(Step::Transient) => {
                return Err(AiError::Api {
                    status: 503,
                    message: "overloaded".to_string(),
                })
            }
            Some(Step::Permanent) => {
                return Err(AiError::Api {
                    status: 400,
                    message: "bad request".to_string(),
                })
            }
            None => {}
        }

        for (fragment, answer) in &self.rules {
            if messages.iter().any(|m| m.content.contains(fragment.as_str())) {
                return Ok(answer.clone());
            }
        }

        self.fallback
            .clone()
            .ok_or(AiError::EmptyResponse("MockLlm"))
    }

    fn model(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockPostSource
// ---------------------------------------------------------------------------

/// Identifier to post list. Unregistered identifiers are an error.
#[derive(Default)]
pub struct MockPostSource {
    posts: HashMap<String, Vec<PostData>>,
    calls: AtomicUsize,
}

impl MockPostSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_posts(mut self, identifier: &str, posts: Vec<PostData>) -> Self {
        self.posts.insert(identifier.to_string(), posts);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostSource for MockPostSource {
    async fn get_posts(&self, identifier: &str, limit: u32) -> Result<PostPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(posts) = self.posts.get(identifier) else {
            bail!("MockPostSource: no posts registered for {identifier}");
        };
        let posts: Vec<PostData> = posts.iter().take(limit as usize).cloned().collect();
        Ok(PostPage {
            has_more: posts.len() >= limit as usize,
            end_cursor: None,
            posts,
        })
    }
}

/// A post with a caption and `images` image URLs.
pub fn post_data(external_id: &str, caption: Option<&str>, images: usize) -> PostData {
    PostData {
        external_id: external_id.to_string(),
        caption: caption.map(str::to_string),
        permalink: Some(format!("https://www.instagram.com/p/{external_id}/")),
        posted_at: Some(Utc::now()),
        media: (0..images)
            .map(|i| RawMedia {
                url: format!("https://cdn.example.com/{external_id}/{i}.jpg"),
                is_video: false,
                ordinal: i as i32,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// MockMediaProcessor
// ---------------------------------------------------------------------------

/// Maps every raw media ref to a stored row without touching the network.
#[derive(Default)]
pub struct MockMediaProcessor {
    failing: bool,
}

impl MockMediaProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { failing: true }
    }
}

#[async_trait]
impl MediaProcessor for MockMediaProcessor {
    async fn process_post_media(&self, post_id: Uuid, post: &PostData) -> Result<Vec<StoredMedia>> {
        if self.failing {
            bail!("MockMediaProcessor: download failed");
        }
        Ok(post
            .media
            .iter()
            .map(|m| StoredMedia {
                role: if m.is_video {
                    MediaRole::Video
                } else {
                    MediaRole::HighRes
                },
                path: format!("mock/{post_id}/{}.{}", m.ordinal, if m.is_video { "mp4" } else { "jpg" }),
                ordinal: m.ordinal,
                source_url: Some(m.url.clone()),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic hash-based unit vector for `text`.
pub fn text_vector(text: &str, dimension: usize) -> Vec<f32> {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    let mut state = hasher.finish();

    let mut vec = vec![0.0f32; dimension];
    for v in vec.iter_mut() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
    }
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
    vec
}

pub struct FixedEmbedder {
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingService for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(text_vector(text, self.dimension))
    }
}

// ---------------------------------------------------------------------------
// MockVectorSearch
// ---------------------------------------------------------------------------

/// Returns a registered hit when the query vector is the embedding of a
/// registered text (see [`text_vector`]); no hits otherwise.
#[derive(Default)]
pub struct MockVectorSearch {
    hits: Vec<(String, VectorHit)>,
    failing: bool,
}

impl MockVectorSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            hits: Vec::new(),
            failing: true,
        }
    }

    pub fn on_query(mut self, text: &str, document_id: &str, distance: f32) -> Self {
        self.hits.push((
            text.to_string(),
            VectorHit {
                document_id: document_id.to_string(),
                distance,
            },
        ));
        self
    }
}

#[async_trait]
impl VectorSearch for MockVectorSearch {
    async fn search(&self, _collection: &str, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if self.failing {
            bail!("MockVectorSearch: index unavailable");
        }
        Ok(self
            .hits
            .iter()
            .filter(|(text, _)| text_vector(text, vector.len()) == vector)
            .map(|(_, hit)| hit.clone())
            .take(k)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// RecordingIndexer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingIndexer {
    documents: Mutex<Vec<SearchDocument>>,
    batches: AtomicUsize,
    failing: bool,
}

impl RecordingIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn documents(&self) -> Vec<SearchDocument> {
        lock(&self.documents).clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndexer for RecordingIndexer {
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<()> {
        if self.failing {
            bail!("RecordingIndexer: index unavailable");
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        lock(&self.documents).extend(documents);
        Ok(())
    }
}
