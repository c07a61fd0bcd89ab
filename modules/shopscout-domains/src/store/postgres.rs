use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shopscout_core::{DomainGroup, RunKind, RunStatus, StoredMedia};

use super::{CatalogStore, RunStore, TaxonomyStore};
use crate::catalog::models::{
    AppliedProduct, AppliedReconcile, CategoryRef, Media, NewPost, NewProduct, Post, Product,
    Profile, ReconcileWrite,
};
use crate::catalog::validate::normalize_whitespace;
use crate::pipeline::run::{NewRun, PostTally, Run, ScrapeCounts};
use crate::taxonomy::models::{AttributeValue, Category, DomainGroupRow, StructureOutput};
use crate::taxonomy::normalize::{ai_value, slugify};

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn insert_post_if_new(&self, post: NewPost) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (profile_id, external_id, caption, permalink, posted_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(post.profile_id)
        .bind(&post.external_id)
        .bind(&post.caption)
        .bind(&post.permalink)
        .bind(post.posted_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_media(&self, post_id: Uuid, media: &[StoredMedia]) -> Result<Vec<Media>> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(media.len());
        for item in media {
            let row = sqlx::query_as::<_, Media>(
                r#"
                INSERT INTO media (post_id, role, path, ordinal, source_url)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(post_id)
            .bind(item.role.as_str())
            .bind(&item.path)
            .bind(item.ordinal)
            .bind(&item.source_url)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_post_by_external_id(&self, external_id: &str) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn posts_needing_label(&self, profile_id: Uuid) -> Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE profile_id = $1 AND group_label IS NULL ORDER BY created_at, id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn posts_to_process(&self, profile_id: Uuid) -> Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE profile_id = $1 AND NOT processed_structure ORDER BY created_at, id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn set_post_group(&self, post_id: Uuid, group: DomainGroup) -> Result<()> {
        sqlx::query("UPDATE posts SET group_label = $2 WHERE id = $1")
            .bind(post_id)
            .bind(group.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn media_for_post(&self, post_id: Uuid) -> Result<Vec<Media>> {
        sqlx::query_as::<_, Media>("SELECT * FROM media WHERE post_id = $1 ORDER BY ordinal, role, id")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn apply_reconciliation(&self, write: ReconcileWrite) -> Result<AppliedReconcile> {
        let mut tx = self.pool.begin().await?;

        // Reconciliations of the same post queue up behind this lock.
        sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(write.post_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| anyhow!("post {} not found", write.post_id))?;

        // product_media, product_categories and associations cascade.
        let removed = sqlx::query("DELETE FROM products WHERE post_id = $1")
            .bind(write.post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Taxonomy rows are locked in key order, values before categories,
        // so posts sharing values cannot deadlock each other.
        let mut sightings: Vec<(Uuid, String, String, usize)> = write
            .products
            .iter()
            .enumerate()
            .flat_map(|(index, planned)| {
                planned
                    .values
                    .iter()
                    .map(move |(attribute_id, text)| (*attribute_id, ai_value(text), text.clone(), index))
            })
            .collect();
        sightings.sort();

        let mut value_ids: Vec<Vec<Uuid>> = vec![Vec::new(); write.products.len()];
        let mut values: BTreeMap<Uuid, AttributeValue> = BTreeMap::new();
        for (attribute_id, _, text, index) in &sightings {
            let value = bump_value(&mut tx, *attribute_id, text).await?;
            if !value_ids[*index].contains(&value.id) {
                value_ids[*index].push(value.id);
            }
            values.insert(value.id, value);
        }
        for value in values.values_mut() {
            *value = promote_value(&mut tx, value.id, write.promotion_threshold).await?;
        }

        let mut new_slugs: Vec<(String, String)> = write
            .products
            .iter()
            .flat_map(|planned| planned.categories.iter())
            .filter_map(|category| match category {
                CategoryRef::New(name) => Some((slugify(name), name.clone())),
                CategoryRef::Existing(_) => None,
            })
            .filter(|(slug, _)| !slug.is_empty())
            .collect();
        new_slugs.sort();
        new_slugs.dedup_by(|a, b| a.0 == b.0);

        let mut created: HashMap<String, Uuid> = HashMap::new();
        for (slug, name) in &new_slugs {
            sqlx::query(
                r#"
                INSERT INTO categories (name, slug, score, is_temp)
                VALUES ($1, $2, 0, true)
                ON CONFLICT (slug) DO NOTHING
                "#,
            )
            .bind(name)
            .bind(slug)
            .execute(&mut *tx)
            .await?;
            let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE slug = $1")
                .bind(slug)
                .fetch_one(&mut *tx)
                .await?;
            created.insert(slug.clone(), id);
        }

        let category_ids: Vec<Vec<Uuid>> = write
            .products
            .iter()
            .map(|planned| {
                let mut ids: Vec<Uuid> = Vec::new();
                for category in &planned.categories {
                    let id = match category {
                        CategoryRef::Existing(id) => Some(*id),
                        CategoryRef::New(name) => created.get(&slugify(name)).copied(),
                    };
                    if let Some(id) = id.filter(|id| !ids.contains(id)) {
                        ids.push(id);
                    }
                }
                ids
            })
            .collect();

        let mut links: Vec<Uuid> = category_ids.iter().flatten().copied().collect();
        links.sort();
        let mut categories: BTreeMap<Uuid, Category> = BTreeMap::new();
        for id in links {
            let category = sqlx::query_as::<_, Category>(
                "UPDATE categories SET score = score + 1 WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| anyhow!("category {id} not found"))?;
            categories.insert(id, category);
        }
        for category in categories.values_mut() {
            *category = sqlx::query_as::<_, Category>(
                r#"
                UPDATE categories
                SET is_temp = CASE WHEN is_temp AND score > $2 THEN false ELSE is_temp END
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(category.id)
            .bind(write.promotion_threshold)
            .fetch_one(&mut *tx)
            .await?;
        }

        let mut applied = AppliedReconcile {
            removed,
            products: Vec::with_capacity(write.products.len()),
        };
        for ((planned, value_ids), category_ids) in write.products.iter().zip(value_ids).zip(category_ids) {
            let product = insert_product(&mut tx, &planned.product, category_ids.first().copied()).await?;

            for category_id in &category_ids {
                sqlx::query(
                    r#"
                    INSERT INTO product_categories (product_id, category_id)
                    VALUES ($1, $2)
                    ON CONFLICT (product_id, category_id) DO NOTHING
                    "#,
                )
                .bind(product.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            }

            let linked: Vec<AttributeValue> = value_ids
                .iter()
                .filter_map(|id| values.get(id).cloned())
                .collect();
            for value in &linked {
                sqlx::query(
                    r#"
                    INSERT INTO attribute_value_associations (attribute_value_id, post_id, product_id, is_temp)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (attribute_value_id, post_id, product_id)
                    DO UPDATE SET is_temp = EXCLUDED.is_temp
                    "#,
                )
                .bind(value.id)
                .bind(write.post_id)
                .bind(product.id)
                .bind(value.is_temp)
                .execute(&mut *tx)
                .await?;
            }

            applied.products.push(AppliedProduct {
                product,
                values: linked,
                categories: category_ids
                    .iter()
                    .filter_map(|id| categories.get(id).cloned())
                    .collect(),
            });
        }

        sqlx::query("UPDATE posts SET processed_structure = true, categories = $2 WHERE id = $1")
            .bind(write.post_id)
            .bind(&write.post_categories)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(applied)
    }
}

async fn insert_product(
    conn: &mut PgConnection,
    product: &NewProduct,
    primary_category_id: Option<Uuid>,
) -> Result<Product> {
    let row = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (
            post_id, profile_id, group_label, name, brand, product_type,
            price, discount_price, has_discount, currency, condition,
            description, confidence, seller_username, primary_category_id, posted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(product.post_id)
    .bind(product.profile_id)
    .bind(&product.group_label)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(&product.product_type)
    .bind(product.price)
    .bind(product.discount_price)
    .bind(product.has_discount())
    .bind(&product.currency)
    .bind(&product.condition)
    .bind(&product.description)
    .bind(&product.confidence)
    .bind(&product.seller_username)
    .bind(primary_category_id)
    .bind(product.posted_at)
    .fetch_one(&mut *conn)
    .await?;

    for (position, media_id) in product.media_ids.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO product_media (product_id, media_id, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, media_id) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(media_id)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(row)
}

/// Reuse or create a value, bumping its score. The unique
/// (attribute_id, ai_value) index serialises concurrent reuse: the
/// increment happens under the row lock taken by ON CONFLICT.
async fn bump_value(conn: &mut PgConnection, attribute_id: Uuid, text: &str) -> Result<AttributeValue> {
    let value = normalize_whitespace(text);
    sqlx::query_as::<_, AttributeValue>(
        r#"
        INSERT INTO attribute_values (attribute_id, value, ai_value, score, is_temp)
        VALUES ($1, $2, $3, 1, true)
        ON CONFLICT (attribute_id, ai_value)
        DO UPDATE SET score = attribute_values.score + 1
        RETURNING *
        "#,
    )
    .bind(attribute_id)
    .bind(&value)
    .bind(ai_value(&value))
    .fetch_one(&mut *conn)
    .await
    .map_err(Into::into)
}

async fn promote_value(conn: &mut PgConnection, value_id: Uuid, threshold: i32) -> Result<AttributeValue> {
    sqlx::query_as::<_, AttributeValue>(
        r#"
        UPDATE attribute_values
        SET is_temp = CASE WHEN is_temp AND score > $2 THEN false ELSE is_temp END
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(value_id)
    .bind(threshold)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| anyhow!("attribute value {value_id} not found"))
}

// ---------------------------------------------------------------------------
// TaxonomyStore
// ---------------------------------------------------------------------------

#[async_trait]
impl TaxonomyStore for PgStore {
    async fn domain_groups(&self) -> Result<Vec<DomainGroupRow>> {
        sqlx::query_as::<_, DomainGroupRow>("SELECT key, description FROM domain_groups ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn structure_outputs(&self) -> Result<Vec<StructureOutput>> {
        sqlx::query_as::<_, StructureOutput>(
            "SELECT * FROM structure_outputs ORDER BY parent_key, sort_order, key, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_value_by_normalized_text(
        &self,
        attribute_id: Uuid,
        text: &str,
    ) -> Result<Option<AttributeValue>> {
        sqlx::query_as::<_, AttributeValue>(
            "SELECT * FROM attribute_values WHERE attribute_id = $1 AND ai_value = $2",
        )
        .bind(attribute_id)
        .bind(ai_value(text))
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn create_or_reuse_value(&self, attribute_id: Uuid, text: &str) -> Result<AttributeValue> {
        let mut conn = self.pool.acquire().await?;
        bump_value(&mut conn, attribute_id, text).await
    }

    async fn promote_value_if_eligible(&self, value_id: Uuid, threshold: i32) -> Result<AttributeValue> {
        let mut conn = self.pool.acquire().await?;
        promote_value(&mut conn, value_id, threshold).await
    }

    async fn all_categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_category_by_exact_name(&self, name: &str) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE lower(name) = lower($1) ORDER BY score DESC, id LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    kind: String,
    profile_id: Uuid,
    parent_id: Option<Uuid>,
    status: String,
    status_message: Option<String>,
    error_message: Option<String>,
    posts_fetched: i32,
    posts_new: i32,
    posts_to_process: i32,
    posts_processed: i32,
    posts_skipped: i32,
    posts_failed: i32,
    products_created: i32,
    low_confidence_skipped: i32,
    cancel_requested: bool,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RunRow> for Run {
    type Error = anyhow::Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(Run {
            id: row.id,
            kind: row.kind.parse::<RunKind>().map_err(|e| anyhow!(e))?,
            profile_id: row.profile_id,
            parent_id: row.parent_id,
            status: row.status.parse::<RunStatus>().map_err(|e| anyhow!(e))?,
            status_message: row.status_message,
            error_message: row.error_message,
            posts_fetched: row.posts_fetched,
            posts_new: row.posts_new,
            posts_to_process: row.posts_to_process,
            posts_processed: row.posts_processed,
            posts_skipped: row.posts_skipped,
            posts_failed: row.posts_failed,
            products_created: row.products_created,
            low_confidence_skipped: row.low_confidence_skipped,
            cancel_requested: row.cancel_requested,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn create_run(&self, run: NewRun) -> Result<Run> {
        sqlx::query_as::<_, RunRow>(
            r#"
            INSERT INTO runs (kind, profile_id, parent_id, status, status_message, posts_to_process, started_at)
            VALUES ($1, $2, $3, 'running', $4, $5, now())
            RETURNING *
            "#,
        )
        .bind(run.kind.as_str())
        .bind(run.profile_id)
        .bind(run.parent_id)
        .bind(&run.status_message)
        .bind(run.posts_to_process)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<Run>> {
        sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Run::try_from)
            .transpose()
    }

    async fn active_run(&self, profile_id: Uuid, kind: RunKind) -> Result<Option<Run>> {
        sqlx::query_as::<_, RunRow>(
            r#"
            SELECT * FROM runs
            WHERE profile_id = $1 AND kind = $2 AND status IN ('pending', 'running')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(profile_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Run::try_from)
        .transpose()
    }

    async fn set_status_message(&self, id: Uuid, message: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE runs SET status_message = $2 WHERE id = $1")
            .bind(id)
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_running(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE runs
            SET status = 'running', error_message = NULL, completed_at = NULL,
                started_at = COALESCE(started_at, now())
            WHERE id = $1 AND status IN ('pending', 'running', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE runs
            SET status = 'completed', status_message = NULL, completed_at = now()
            WHERE id = $1 AND status = 'running'
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE runs
            SET status = 'failed', error_message = $2, completed_at = now()
            WHERE id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE runs
            SET status = 'cancelled', cancel_requested = true, completed_at = now()
            WHERE id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn request_cancel(&self, id: Uuid) -> Result<Option<Run>> {
        sqlx::query_as::<_, RunRow>(
            r#"
            UPDATE runs
            SET cancel_requested = true,
                status = CASE WHEN kind = 'processing' THEN 'cancelled' ELSE status END,
                completed_at = CASE WHEN kind = 'processing' THEN now() ELSE completed_at END
            WHERE id = $1 AND status IN ('pending', 'running')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Run::try_from)
        .transpose()
    }

    async fn record_scrape_counts(&self, id: Uuid, counts: ScrapeCounts) -> Result<()> {
        sqlx::query(
            "UPDATE runs SET posts_fetched = $2, posts_new = $3, posts_skipped = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(counts.fetched)
        .bind(counts.new)
        .bind(counts.skipped)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_posts_to_process(&self, id: Uuid, posts: i32) -> Result<()> {
        sqlx::query("UPDATE runs SET posts_to_process = $2 WHERE id = $1")
            .bind(id)
            .bind(posts)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_post_result(&self, id: Uuid, tally: PostTally) -> Result<Run> {
        sqlx::query_as::<_, RunRow>(
            r#"
            UPDATE runs
            SET posts_processed = posts_processed + $2,
                posts_skipped = posts_skipped + $3,
                posts_failed = posts_failed + $4,
                products_created = products_created + $5,
                low_confidence_skipped = low_confidence_skipped + $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tally.processed)
        .bind(tally.skipped)
        .bind(tally.failed)
        .bind(tally.products_created)
        .bind(tally.low_confidence_skipped)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("run {id} not found"))?
        .try_into()
    }

    async fn complete_if_done(&self, id: Uuid) -> Result<bool> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE runs
            SET status = 'completed', status_message = NULL, completed_at = now()
            WHERE id = $1
              AND status = 'running'
              AND posts_processed + posts_skipped + posts_failed >= posts_to_process
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn complete_finished_runs(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE runs
            SET status = 'completed', status_message = NULL, completed_at = now()
            WHERE kind = 'processing'
              AND status = 'running'
              AND posts_processed + posts_skipped + posts_failed >= posts_to_process
            RETURNING id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn fail_stale_runs(&self, cutoff: DateTime<Utc>, error: &str) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE runs
            SET status = 'failed', error_message = $2, completed_at = now()
            WHERE status = 'running' AND started_at < $1
            RETURNING id
            "#,
        )
        .bind(cutoff)
        .bind(error)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
