// In-memory store with the same contracts as PgStore.
//
// One mutex per concern; every trait method takes its lock once, so each
// call is atomic the way the single SQL statement behind it is.
// apply_reconciliation holds the catalog and taxonomy locks together,
// validating before it mutates so a failure leaves nothing behind.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shopscout_core::{DomainGroup, RunKind, RunStatus, StoredMedia};

use super::{CatalogStore, RunStore, TaxonomyStore};
use crate::catalog::models::{
    AppliedProduct, AppliedReconcile, CategoryRef, Media, NewPost, NewProduct, Post, Product,
    Profile, ReconcileWrite,
};
use crate::catalog::validate::normalize_whitespace;
use crate::pipeline::run::{NewRun, PostTally, Run, ScrapeCounts};
use crate::taxonomy::models::{
    Attribute, AttributeValue, AttributeValueAssociation, Category, DomainGroupRow,
    StructureOutput,
};
use crate::taxonomy::normalize::{ai_value, slugify};

#[derive(Default)]
struct CatalogState {
    profiles: HashMap<Uuid, Profile>,
    posts: Vec<Post>,
    media: Vec<Media>,
    products: Vec<Product>,
    product_media: Vec<(Uuid, Uuid, i32)>,
}

#[derive(Default)]
struct TaxonomyState {
    groups: Vec<DomainGroupRow>,
    attributes: Vec<Attribute>,
    values: Vec<AttributeValue>,
    structure_outputs: Vec<StructureOutput>,
    categories: Vec<Category>,
    product_categories: Vec<(Uuid, Uuid)>,
    associations: Vec<AttributeValueAssociation>,
}

impl CatalogState {
    /// Drop the post's products with their media links; returns their ids.
    fn remove_products_for_post(&mut self, post_id: Uuid) -> Vec<Uuid> {
        let removed: Vec<Uuid> = self
            .products
            .iter()
            .filter(|p| p.post_id == post_id)
            .map(|p| p.id)
            .collect();
        self.products.retain(|p| p.post_id != post_id);
        self.product_media
            .retain(|(product_id, _, _)| !removed.contains(product_id));
        removed
    }

    fn insert_product(&mut self, product: &NewProduct, primary_category_id: Option<Uuid>) -> Product {
        let row = Product {
            id: Uuid::new_v4(),
            post_id: product.post_id,
            profile_id: product.profile_id,
            group_label: product.group_label.clone(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            product_type: product.product_type.clone(),
            price: product.price,
            discount_price: product.discount_price,
            has_discount: product.has_discount(),
            currency: product.currency.clone(),
            condition: product.condition.clone(),
            description: product.description.clone(),
            confidence: product.confidence.clone(),
            seller_username: product.seller_username.clone(),
            primary_category_id,
            posted_at: product.posted_at,
            created_at: Utc::now(),
        };
        for (position, media_id) in product.media_ids.iter().enumerate() {
            if !self
                .product_media
                .iter()
                .any(|(p, m, _)| *p == row.id && m == media_id)
            {
                self.product_media.push((row.id, *media_id, position as i32));
            }
        }
        self.products.push(row.clone());
        row
    }
}

impl TaxonomyState {
    fn bump_value(&mut self, attribute_id: Uuid, text: &str) -> AttributeValue {
        let value = normalize_whitespace(text);
        let key = ai_value(&value);
        if let Some(existing) = self
            .values
            .iter_mut()
            .find(|v| v.attribute_id == attribute_id && v.ai_value == key)
        {
            existing.score += 1;
            return existing.clone();
        }
        let created = AttributeValue {
            id: Uuid::new_v4(),
            attribute_id,
            value,
            ai_value: key,
            score: 1,
            is_temp: true,
            created_at: Utc::now(),
        };
        self.values.push(created.clone());
        created
    }

    /// Category with the name's slug, created temporary with no score when missing.
    fn category_for_name(&mut self, name: &str) -> Option<Uuid> {
        let slug = slugify(name);
        if slug.is_empty() {
            return None;
        }
        if let Some(existing) = self.categories.iter().find(|c| c.slug == slug) {
            return Some(existing.id);
        }
        let category = Category {
            id: Uuid::new_v4(),
            parent_id: None,
            name: name.to_string(),
            slug,
            score: 0,
            is_temp: true,
            created_at: Utc::now(),
        };
        let id = category.id;
        self.categories.push(category);
        Some(id)
    }
}

/// One-way: clears `is_temp` past the threshold, never sets it.
fn promote(is_temp: &mut bool, score: i32, threshold: i32) {
    if *is_temp && score > threshold {
        *is_temp = false;
    }
}

#[derive(Default)]
pub struct MemoryStore {
    catalog: Mutex<CatalogState>,
    taxonomy: Mutex<TaxonomyState>,
    runs: Mutex<HashMap<Uuid, Run>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding -----------------------------------------------------------

    pub fn add_profile(&self, username: &str) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: None,
            created_at: Utc::now(),
        };
        lock(&self.catalog)
            .profiles
            .insert(profile.id, profile.clone());
        profile
    }

    pub fn add_domain_group(&self, key: &str, description: &str) {
        lock(&self.taxonomy).groups.push(DomainGroupRow {
            key: key.to_string(),
            description: description.to_string(),
        });
    }

    pub fn add_attribute(&self, name: &str) -> Uuid {
        let attribute = Attribute {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let id = attribute.id;
        lock(&self.taxonomy).attributes.push(attribute);
        id
    }

    /// Add a structure output row, creating a linked attribute named after the key.
    pub fn add_structure_output(
        &self,
        parent_key: &str,
        key: &str,
        description: &str,
        required: bool,
        used_for: Option<&str>,
    ) -> Uuid {
        let attribute_id = self.add_attribute(key);
        let mut state = lock(&self.taxonomy);
        let sort_order = state.structure_outputs.len() as i32;
        state.structure_outputs.push(StructureOutput {
            id: Uuid::new_v4(),
            key: key.to_string(),
            value_type: "string".to_string(),
            description: description.to_string(),
            parent_key: parent_key.to_string(),
            used_for: used_for.map(str::to_string),
            required,
            attribute_id: Some(attribute_id),
            sort_order,
        });
        attribute_id
    }

    pub fn add_category(&self, name: &str, parent_id: Option<Uuid>) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
            slug: slugify(name),
            score: 1,
            is_temp: true,
            created_at: Utc::now(),
        };
        lock(&self.taxonomy).categories.push(category.clone());
        category
    }

    pub fn add_post(&self, profile_id: Uuid, external_id: &str, caption: Option<&str>) -> Post {
        let post = new_post_row(NewPost {
            profile_id,
            external_id: external_id.to_string(),
            caption: caption.map(str::to_string),
            permalink: None,
            posted_at: None,
        });
        lock(&self.catalog).posts.push(post.clone());
        post
    }

    pub fn add_media(&self, post_id: Uuid, role: &str, path: &str, ordinal: i32) -> Media {
        let media = Media {
            id: Uuid::new_v4(),
            post_id,
            role: role.to_string(),
            path: path.to_string(),
            ordinal,
            source_url: None,
        };
        lock(&self.catalog).media.push(media.clone());
        media
    }

    // --- inspection --------------------------------------------------------

    pub fn posts(&self) -> Vec<Post> {
        lock(&self.catalog).posts.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        lock(&self.catalog).products.clone()
    }

    pub fn product_media(&self, product_id: Uuid) -> Vec<Uuid> {
        let state = lock(&self.catalog);
        let mut rows: Vec<_> = state
            .product_media
            .iter()
            .filter(|(p, _, _)| *p == product_id)
            .collect();
        rows.sort_by_key(|(_, _, position)| *position);
        rows.into_iter().map(|(_, m, _)| *m).collect()
    }

    pub fn values(&self) -> Vec<AttributeValue> {
        lock(&self.taxonomy).values.clone()
    }

    pub fn value_named(&self, text: &str) -> Option<AttributeValue> {
        let key = ai_value(text);
        lock(&self.taxonomy)
            .values
            .iter()
            .find(|v| v.ai_value == key)
            .cloned()
    }

    pub fn associations(&self) -> Vec<AttributeValueAssociation> {
        lock(&self.taxonomy).associations.clone()
    }

    pub fn category(&self, id: Uuid) -> Option<Category> {
        lock(&self.taxonomy)
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn product_categories(&self, product_id: Uuid) -> Vec<Uuid> {
        lock(&self.taxonomy)
            .product_categories
            .iter()
            .filter(|(p, _)| *p == product_id)
            .map(|(_, c)| *c)
            .collect()
    }

    pub fn runs(&self) -> Vec<Run> {
        lock(&self.runs).values().cloned().collect()
    }

    /// Move a run's start time, for staleness tests.
    pub fn backdate_run(&self, id: Uuid, started_at: DateTime<Utc>) {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            run.started_at = Some(started_at);
        }
    }
}

fn new_post_row(post: NewPost) -> Post {
    Post {
        id: Uuid::new_v4(),
        profile_id: post.profile_id,
        external_id: post.external_id,
        caption: post.caption,
        permalink: post.permalink,
        group_label: None,
        processed_structure: false,
        categories: Vec::new(),
        posted_at: post.posted_at,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(lock(&self.catalog).profiles.get(&id).cloned())
    }

    async fn insert_post_if_new(&self, post: NewPost) -> Result<Option<Post>> {
        let mut state = lock(&self.catalog);
        if state.posts.iter().any(|p| p.external_id == post.external_id) {
            return Ok(None);
        }
        let row = new_post_row(post);
        state.posts.push(row.clone());
        Ok(Some(row))
    }

    async fn insert_media(&self, post_id: Uuid, media: &[StoredMedia]) -> Result<Vec<Media>> {
        let mut state = lock(&self.catalog);
        let rows: Vec<Media> = media
            .iter()
            .map(|m| Media {
                id: Uuid::new_v4(),
                post_id,
                role: m.role.as_str().to_string(),
                path: m.path.clone(),
                ordinal: m.ordinal,
                source_url: m.source_url.clone(),
            })
            .collect();
        state.media.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(lock(&self.catalog).posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_post_by_external_id(&self, external_id: &str) -> Result<Option<Post>> {
        Ok(lock(&self.catalog)
            .posts
            .iter()
            .find(|p| p.external_id == external_id)
            .cloned())
    }

    async fn posts_needing_label(&self, profile_id: Uuid) -> Result<Vec<Post>> {
        Ok(lock(&self.catalog)
            .posts
            .iter()
            .filter(|p| p.profile_id == profile_id && p.group_label.is_none())
            .cloned()
            .collect())
    }

    async fn posts_to_process(&self, profile_id: Uuid) -> Result<Vec<Post>> {
        Ok(lock(&self.catalog)
            .posts
            .iter()
            .filter(|p| p.profile_id == profile_id && !p.processed_structure)
            .cloned()
            .collect())
    }

    async fn set_post_group(&self, post_id: Uuid, group: DomainGroup) -> Result<()> {
        let mut state = lock(&self.catalog);
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| anyhow!("post {post_id} not found"))?;
        post.group_label = Some(group.as_str().to_string());
        Ok(())
    }

    async fn media_for_post(&self, post_id: Uuid) -> Result<Vec<Media>> {
        let mut media: Vec<Media> = lock(&self.catalog)
            .media
            .iter()
            .filter(|m| m.post_id == post_id)
            .cloned()
            .collect();
        media.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.role.cmp(&b.role)));
        Ok(media)
    }

    async fn apply_reconciliation(&self, write: ReconcileWrite) -> Result<AppliedReconcile> {
        let mut catalog = lock(&self.catalog);
        let mut taxonomy = lock(&self.taxonomy);
        if !catalog.posts.iter().any(|p| p.id == write.post_id) {
            return Err(anyhow!("post {} not found", write.post_id));
        }
        for planned in &write.products {
            for category in &planned.categories {
                if let CategoryRef::Existing(id) = category {
                    if !taxonomy.categories.iter().any(|c| c.id == *id) {
                        return Err(anyhow!("category {id} not found"));
                    }
                }
            }
        }

        let removed = catalog.remove_products_for_post(write.post_id);
        taxonomy
            .product_categories
            .retain(|(product_id, _)| !removed.contains(product_id));
        taxonomy
            .associations
            .retain(|a| !removed.contains(&a.product_id));

        let mut applied = AppliedReconcile {
            removed: removed.len() as u64,
            products: Vec::with_capacity(write.products.len()),
        };
        let mut planned_values: Vec<Vec<Uuid>> = Vec::with_capacity(write.products.len());
        let mut planned_categories: Vec<Vec<Uuid>> = Vec::with_capacity(write.products.len());
        for planned in &write.products {
            let mut value_ids = Vec::new();
            for (attribute_id, text) in &planned.values {
                let value = taxonomy.bump_value(*attribute_id, text);
                if !value_ids.contains(&value.id) {
                    value_ids.push(value.id);
                }
            }
            planned_values.push(value_ids);

            let mut category_ids = Vec::new();
            for category in &planned.categories {
                let id = match category {
                    CategoryRef::Existing(id) => Some(*id),
                    CategoryRef::New(name) => taxonomy.category_for_name(name),
                };
                if let Some(id) = id.filter(|id| !category_ids.contains(id)) {
                    category_ids.push(id);
                }
            }
            for id in &category_ids {
                if let Some(category) = taxonomy.categories.iter_mut().find(|c| c.id == *id) {
                    category.score += 1;
                }
            }
            planned_categories.push(category_ids);
        }

        let threshold = write.promotion_threshold;
        for value in taxonomy.values.iter_mut() {
            if planned_values.iter().flatten().any(|id| *id == value.id) {
                promote(&mut value.is_temp, value.score, threshold);
            }
        }
        for category in taxonomy.categories.iter_mut() {
            if planned_categories.iter().flatten().any(|id| *id == category.id) {
                promote(&mut category.is_temp, category.score, threshold);
            }
        }

        for ((planned, value_ids), category_ids) in write
            .products
            .iter()
            .zip(planned_values)
            .zip(planned_categories)
        {
            let product = catalog.insert_product(&planned.product, category_ids.first().copied());
            let values: Vec<AttributeValue> = value_ids
                .iter()
                .filter_map(|id| taxonomy.values.iter().find(|v| v.id == *id).cloned())
                .collect();
            for value in &values {
                taxonomy.associations.push(AttributeValueAssociation {
                    id: Uuid::new_v4(),
                    attribute_value_id: value.id,
                    post_id: write.post_id,
                    product_id: product.id,
                    is_temp: value.is_temp,
                });
            }
            for id in &category_ids {
                taxonomy.product_categories.push((product.id, *id));
            }
            let categories = category_ids
                .iter()
                .filter_map(|id| taxonomy.categories.iter().find(|c| c.id == *id).cloned())
                .collect();
            applied.products.push(AppliedProduct {
                product,
                values,
                categories,
            });
        }

        if let Some(post) = catalog.posts.iter_mut().find(|p| p.id == write.post_id) {
            post.processed_structure = true;
            post.categories = write.post_categories.clone();
        }
        Ok(applied)
    }
}

// ---------------------------------------------------------------------------
// TaxonomyStore
// ---------------------------------------------------------------------------

#[async_trait]
impl TaxonomyStore for MemoryStore {
    async fn domain_groups(&self) -> Result<Vec<DomainGroupRow>> {
        let mut groups = lock(&self.taxonomy).groups.clone();
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(groups)
    }

    async fn structure_outputs(&self) -> Result<Vec<StructureOutput>> {
        let mut rows = lock(&self.taxonomy).structure_outputs.clone();
        rows.sort_by(|a, b| {
            (&a.parent_key, a.sort_order, &a.key).cmp(&(&b.parent_key, b.sort_order, &b.key))
        });
        Ok(rows)
    }

    async fn find_value_by_normalized_text(
        &self,
        attribute_id: Uuid,
        text: &str,
    ) -> Result<Option<AttributeValue>> {
        let key = ai_value(text);
        Ok(lock(&self.taxonomy)
            .values
            .iter()
            .find(|v| v.attribute_id == attribute_id && v.ai_value == key)
            .cloned())
    }

    async fn create_or_reuse_value(&self, attribute_id: Uuid, text: &str) -> Result<AttributeValue> {
        Ok(lock(&self.taxonomy).bump_value(attribute_id, text))
    }

    async fn promote_value_if_eligible(&self, value_id: Uuid, threshold: i32) -> Result<AttributeValue> {
        let mut state = lock(&self.taxonomy);
        let value = state
            .values
            .iter_mut()
            .find(|v| v.id == value_id)
            .ok_or_else(|| anyhow!("attribute value {value_id} not found"))?;
        promote(&mut value.is_temp, value.score, threshold);
        Ok(value.clone())
    }

    async fn all_categories(&self) -> Result<Vec<Category>> {
        let mut categories = lock(&self.taxonomy).categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.category(id))
    }

    async fn find_category_by_exact_name(&self, name: &str) -> Result<Option<Category>> {
        let wanted = name.trim().to_lowercase();
        Ok(lock(&self.taxonomy)
            .categories
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(lock(&self.taxonomy)
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

fn is_active(run: &Run) -> bool {
    matches!(run.status, RunStatus::Pending | RunStatus::Running)
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(&self, run: NewRun) -> Result<Run> {
        let now = Utc::now();
        let row = Run {
            id: Uuid::new_v4(),
            kind: run.kind,
            profile_id: run.profile_id,
            parent_id: run.parent_id,
            status: RunStatus::Running,
            status_message: run.status_message,
            error_message: None,
            posts_fetched: 0,
            posts_new: 0,
            posts_to_process: run.posts_to_process,
            posts_processed: 0,
            posts_skipped: 0,
            posts_failed: 0,
            products_created: 0,
            low_confidence_skipped: 0,
            cancel_requested: false,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
        };
        lock(&self.runs).insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<Run>> {
        Ok(lock(&self.runs).get(&id).cloned())
    }

    async fn active_run(&self, profile_id: Uuid, kind: RunKind) -> Result<Option<Run>> {
        Ok(lock(&self.runs)
            .values()
            .filter(|r| r.profile_id == profile_id && r.kind == kind && is_active(r))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn set_status_message(&self, id: Uuid, message: Option<&str>) -> Result<()> {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            run.status_message = message.map(str::to_string);
        }
        Ok(())
    }

    async fn mark_running(&self, id: Uuid) -> Result<()> {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            if matches!(
                run.status,
                RunStatus::Pending | RunStatus::Running | RunStatus::Failed
            ) {
                run.status = RunStatus::Running;
                run.error_message = None;
                run.completed_at = None;
                run.started_at.get_or_insert_with(Utc::now);
            }
        }
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<bool> {
        let mut runs = lock(&self.runs);
        match runs.get_mut(&id) {
            Some(run) if run.status == RunStatus::Running => {
                run.status = RunStatus::Completed;
                run.status_message = None;
                run.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            if is_active(run) {
                run.status = RunStatus::Failed;
                run.error_message = Some(error.to_string());
                run.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<()> {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            if is_active(run) {
                run.status = RunStatus::Cancelled;
                run.cancel_requested = true;
                run.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn request_cancel(&self, id: Uuid) -> Result<Option<Run>> {
        let mut runs = lock(&self.runs);
        match runs.get_mut(&id) {
            Some(run) if is_active(run) => {
                run.cancel_requested = true;
                if run.kind == RunKind::Processing {
                    run.status = RunStatus::Cancelled;
                    run.completed_at = Some(Utc::now());
                }
                Ok(Some(run.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_scrape_counts(&self, id: Uuid, counts: ScrapeCounts) -> Result<()> {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            run.posts_fetched = counts.fetched;
            run.posts_new = counts.new;
            run.posts_skipped = counts.skipped;
        }
        Ok(())
    }

    async fn set_posts_to_process(&self, id: Uuid, posts: i32) -> Result<()> {
        if let Some(run) = lock(&self.runs).get_mut(&id) {
            run.posts_to_process = posts;
        }
        Ok(())
    }

    async fn record_post_result(&self, id: Uuid, tally: PostTally) -> Result<Run> {
        let mut runs = lock(&self.runs);
        let run = runs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("run {id} not found"))?;
        run.posts_processed += tally.processed;
        run.posts_skipped += tally.skipped;
        run.posts_failed += tally.failed;
        run.products_created += tally.products_created;
        run.low_confidence_skipped += tally.low_confidence_skipped;
        Ok(run.clone())
    }

    async fn complete_if_done(&self, id: Uuid) -> Result<bool> {
        let mut runs = lock(&self.runs);
        match runs.get_mut(&id) {
            Some(run) if run.status == RunStatus::Running && run.is_done() => {
                run.status = RunStatus::Completed;
                run.status_message = None;
                run.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_finished_runs(&self) -> Result<Vec<Uuid>> {
        let mut completed = Vec::new();
        for run in lock(&self.runs).values_mut() {
            if run.kind == RunKind::Processing && run.status == RunStatus::Running && run.is_done() {
                run.status = RunStatus::Completed;
                run.status_message = None;
                run.completed_at = Some(Utc::now());
                completed.push(run.id);
            }
        }
        Ok(completed)
    }

    async fn fail_stale_runs(&self, cutoff: DateTime<Utc>, error: &str) -> Result<Vec<Uuid>> {
        let mut failed = Vec::new();
        for run in lock(&self.runs).values_mut() {
            let stale = run.started_at.map(|s| s < cutoff).unwrap_or(false);
            if run.status == RunStatus::Running && stale {
                run.status = RunStatus::Failed;
                run.error_message = Some(error.to_string());
                run.completed_at = Some(Utc::now());
                failed.push(run.id);
            }
        }
        Ok(failed)
    }
}
