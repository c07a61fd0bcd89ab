// Persistence boundaries.
//
// CatalogStore  - profiles, posts, media, products
// TaxonomyStore - structure outputs, attribute values, categories, associations
// RunStore      - run bookkeeping and completion detection
//
// PgStore implements all three against Postgres. MemoryStore (test-support)
// implements the same contracts in memory for deterministic tests.

pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shopscout_core::{DomainGroup, RunKind, StoredMedia};

use crate::catalog::models::{AppliedReconcile, Media, NewPost, Post, Profile, ReconcileWrite};
use crate::pipeline::run::{NewRun, PostTally, Run, ScrapeCounts};
use crate::taxonomy::models::{AttributeValue, Category, DomainGroupRow, StructureOutput};

pub use postgres::PgStore;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>>;

    /// Insert unless a post with the same external id exists. `None` means duplicate.
    async fn insert_post_if_new(&self, post: NewPost) -> Result<Option<Post>>;

    async fn insert_media(&self, post_id: Uuid, media: &[StoredMedia]) -> Result<Vec<Media>>;

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>>;

    async fn find_post_by_external_id(&self, external_id: &str) -> Result<Option<Post>>;

    /// Posts of the profile with no group label yet.
    async fn posts_needing_label(&self, profile_id: Uuid) -> Result<Vec<Post>>;

    /// Posts of the profile not yet processed into products.
    async fn posts_to_process(&self, profile_id: Uuid) -> Result<Vec<Post>>;

    async fn set_post_group(&self, post_id: Uuid, group: DomainGroup) -> Result<()>;

    /// Media of a post ordered by ordinal.
    async fn media_for_post(&self, post_id: Uuid) -> Result<Vec<Media>>;

    /// Replace the post's products in one transaction: drop the previous
    /// extraction, bump value and category scores with promotion, create
    /// products with their links, and mark the post processed. Nothing is
    /// written when any step fails.
    async fn apply_reconciliation(&self, write: ReconcileWrite) -> Result<AppliedReconcile>;
}

// ---------------------------------------------------------------------------
// TaxonomyStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn domain_groups(&self) -> Result<Vec<DomainGroupRow>>;

    /// All rows ordered by parent key, sort order, then key.
    async fn structure_outputs(&self) -> Result<Vec<StructureOutput>>;

    /// Case-insensitive, trimmed exact match.
    async fn find_value_by_normalized_text(
        &self,
        attribute_id: Uuid,
        text: &str,
    ) -> Result<Option<AttributeValue>>;

    /// Reuse the matching value and bump its score, or create it with
    /// `score = 1, is_temp = true`. One atomic statement.
    async fn create_or_reuse_value(&self, attribute_id: Uuid, text: &str) -> Result<AttributeValue>;

    /// Clear `is_temp` once `score > threshold`. Never sets it back.
    async fn promote_value_if_eligible(&self, value_id: Uuid, threshold: i32) -> Result<AttributeValue>;

    async fn all_categories(&self) -> Result<Vec<Category>>;

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>>;

    /// Case-insensitive exact name match.
    async fn find_category_by_exact_name(&self, name: &str) -> Result<Option<Category>>;

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a run already `running` with `started_at = now`.
    async fn create_run(&self, run: NewRun) -> Result<Run>;

    async fn find_run(&self, id: Uuid) -> Result<Option<Run>>;

    /// Latest non-terminal run of `kind` for the profile.
    async fn active_run(&self, profile_id: Uuid, kind: RunKind) -> Result<Option<Run>>;

    async fn set_status_message(&self, id: Uuid, message: Option<&str>) -> Result<()>;

    /// Back to `running` for a retried attempt; clears error and completion.
    async fn mark_running(&self, id: Uuid) -> Result<()>;

    /// `running` to `completed`, clearing the step message. False if the run was not running.
    async fn mark_completed(&self, id: Uuid) -> Result<bool>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;

    async fn mark_cancelled(&self, id: Uuid) -> Result<()>;

    /// Raise the cancel flag; processing runs become `cancelled` at once.
    async fn request_cancel(&self, id: Uuid) -> Result<Option<Run>>;

    async fn record_scrape_counts(&self, id: Uuid, counts: ScrapeCounts) -> Result<()>;

    async fn set_posts_to_process(&self, id: Uuid, posts: i32) -> Result<()>;

    /// Apply counter deltas atomically and return the updated run.
    async fn record_post_result(&self, id: Uuid, tally: PostTally) -> Result<Run>;

    /// Complete a running run whose counters show it is done.
    /// Returns true for exactly one caller.
    async fn complete_if_done(&self, id: Uuid) -> Result<bool>;

    /// Complete every running processing run that is already done.
    async fn complete_finished_runs(&self) -> Result<Vec<Uuid>>;

    /// Fail every run still running that started before `cutoff`.
    async fn fail_stale_runs(&self, cutoff: DateTime<Utc>, error: &str) -> Result<Vec<Uuid>>;
}
