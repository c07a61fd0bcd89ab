use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shopscout_core::DomainGroup;

use super::models::{CategoryRef, NewProduct, Post, ProductWrite, ReconcileWrite};
use super::validate::clean_attribute_value;
use crate::extraction::{ExtractedProduct, Extraction, SchemaCatalog};
use crate::search::documents::{category_document, product_document};
use crate::search::SearchSync;
use crate::store::{CatalogStore, TaxonomyStore};
use crate::taxonomy::{CategoryResolver, CategoryTree};

pub const NO_PRODUCTS_REASON: &str = "No products detected";
pub const LOW_CONFIDENCE_REASON: &str = "All products below confidence threshold";
pub const ALREADY_PROCESSED_REASON: &str = "Post already processed";

/// Product-level fields labelled against the taxonomy before the free-form attributes.
const LABELLED_FIELDS: [&str; 4] = ["brand", "name", "condition", "currency"];

/// At most this many categories are linked per product.
const MAX_CATEGORIES: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub product_id: Uuid,
    pub name: String,
    pub confidence: String,
    pub values_linked: usize,
    pub categories_linked: usize,
    pub primary_category_id: Option<Uuid>,
}

/// Result of reconciling one post. Skips are outcomes, not errors.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub success: bool,
    pub reason: Option<String>,
    pub products_created: i32,
    pub low_confidence_skipped: i32,
    pub invalid_skipped: i32,
    pub products: Vec<ProductSummary>,
}

impl ProcessingOutcome {
    pub fn skipped(reason: &str) -> Self {
        Self {
            success: false,
            reason: Some(reason.to_string()),
            products_created: 0,
            low_confidence_skipped: 0,
            invalid_skipped: 0,
            products: Vec::new(),
        }
    }
}

/// Maps an extraction onto products, attribute values and categories.
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<dyn CatalogStore>,
    taxonomy: Arc<dyn TaxonomyStore>,
    resolver: CategoryResolver,
    search: SearchSync,
    promotion_threshold: i32,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        taxonomy: Arc<dyn TaxonomyStore>,
        resolver: CategoryResolver,
        search: SearchSync,
        promotion_threshold: i32,
    ) -> Self {
        Self {
            catalog,
            taxonomy,
            resolver,
            search,
            promotion_threshold,
        }
    }

    /// Replace everything previously extracted from `post` with `extraction`.
    ///
    /// Lookups run first; every write then goes to the store as one
    /// reconciliation unit, so a failure leaves the previous extraction and
    /// all scores untouched. Search documents are buffered for the whole
    /// call and flushed at the end.
    pub async fn reconcile(
        &self,
        post: &Post,
        group: DomainGroup,
        extraction: &Extraction,
        schema: &SchemaCatalog,
    ) -> Result<ProcessingOutcome> {
        let guard = self.search.suppress();

        let mut outcome = ProcessingOutcome::skipped(NO_PRODUCTS_REASON);
        let mut write = ReconcileWrite {
            post_id: post.id,
            post_categories: Vec::new(),
            products: Vec::new(),
            promotion_threshold: self.promotion_threshold,
        };

        if extraction.output.is_empty() {
            info!(post_id = %post.id, "No products detected");
        } else {
            let seller = self
                .catalog
                .find_profile(post.profile_id)
                .await?
                .map(|p| p.username);

            for candidate in &extraction.output.products {
                if !candidate.confidence.is_accepted() {
                    debug!(
                        post_id = %post.id,
                        product = %candidate.name,
                        confidence = candidate.confidence.as_str(),
                        "Skipping low-confidence product"
                    );
                    outcome.low_confidence_skipped += 1;
                    continue;
                }

                let Some(name) = clean_attribute_value("name", &candidate.name) else {
                    warn!(post_id = %post.id, name = %candidate.name, "Skipping product without a usable name");
                    outcome.invalid_skipped += 1;
                    continue;
                };

                let mut categories: Vec<CategoryRef> = Vec::new();
                for raw in candidate.categories.iter().take(MAX_CATEGORIES) {
                    let raw = raw.trim();
                    if raw.is_empty() {
                        continue;
                    }
                    if !write.post_categories.iter().any(|c| c.eq_ignore_ascii_case(raw)) {
                        write.post_categories.push(raw.to_string());
                    }
                    if let Some(category) = self.plan_category(raw).await? {
                        if !categories.contains(&category) {
                            categories.push(category);
                        }
                    }
                }

                write.products.push(ProductWrite {
                    product: new_product(post, group, seller.clone(), name, candidate, extraction),
                    values: attribute_values(group, candidate, schema),
                    categories,
                });
            }
        }

        let applied = self.catalog.apply_reconciliation(write).await?;
        if applied.removed > 0 {
            debug!(post_id = %post.id, removed = applied.removed, "Replaced previous extraction");
        }

        let mut touched_categories: Vec<Uuid> = Vec::new();
        for item in &applied.products {
            let names: Vec<String> = item.categories.iter().map(|c| c.name.clone()).collect();
            self.search.record(product_document(&item.product, &names)).await;
            for category in &item.categories {
                if !touched_categories.contains(&category.id) {
                    touched_categories.push(category.id);
                }
            }
            outcome.products.push(ProductSummary {
                product_id: item.product.id,
                name: item.product.name.clone(),
                confidence: item.product.confidence.clone(),
                values_linked: item.values.len(),
                categories_linked: item.categories.len(),
                primary_category_id: item.product.primary_category_id,
            });
        }
        if !touched_categories.is_empty() {
            self.record_categories(&touched_categories).await?;
        }

        outcome.products_created = outcome.products.len() as i32;
        outcome.success = outcome.products_created > 0;
        outcome.reason = if outcome.success {
            None
        } else if outcome.low_confidence_skipped > 0 {
            Some(LOW_CONFIDENCE_REASON.to_string())
        } else {
            Some(NO_PRODUCTS_REASON.to_string())
        };

        if !extraction.output.is_empty() {
            info!(
                post_id = %post.id,
                group = %group,
                products_created = outcome.products_created,
                low_confidence_skipped = outcome.low_confidence_skipped,
                invalid_skipped = outcome.invalid_skipped,
                "Post reconciled"
            );
        }

        guard.flush().await;
        Ok(outcome)
    }

    /// Match a category name, or plan a temporary category for it.
    async fn plan_category(&self, name: &str) -> Result<Option<CategoryRef>> {
        if let Some((category, how)) = self.resolver.find_category_by_name(name).await? {
            debug!(category = name, matched = %category.name, how = ?how, "Category resolved");
            return Ok(Some(CategoryRef::Existing(category.id)));
        }
        match clean_attribute_value("category", name) {
            Some(cleaned) => {
                debug!(category = %cleaned, "Category not found, adding as temporary");
                Ok(Some(CategoryRef::New(cleaned)))
            }
            None => {
                debug!(category = name, "Rejected category name");
                Ok(None)
            }
        }
    }

    async fn record_categories(&self, ids: &[Uuid]) -> Result<()> {
        let tree = CategoryTree::build(self.taxonomy.all_categories().await?);
        for id in ids {
            if let Some(category) = tree.get(*id) {
                let path = tree.full_path(*id);
                self.search.record(category_document(category, &path)).await;
            }
        }
        Ok(())
    }
}

/// Validated `(attribute_id, value)` pairs for the labelled fields and
/// attributes that map to a taxonomy attribute in `group`.
fn attribute_values(
    group: DomainGroup,
    product: &ExtractedProduct,
    schema: &SchemaCatalog,
) -> Vec<(Uuid, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let fields = [
        product.brand.clone(),
        Some(product.name.clone()),
        product.condition.clone(),
        product.currency.clone(),
    ];
    for (key, value) in LABELLED_FIELDS.iter().zip(fields) {
        if let Some(value) = value {
            pairs.push((key.to_string(), value));
        }
    }
    for (key, value) in product.attribute_texts() {
        if !pairs.iter().any(|(k, _)| k == key) {
            pairs.push((key.to_string(), value));
        }
    }

    let mut values = Vec::new();
    for (key, raw) in pairs {
        let Some(value) = clean_attribute_value(&key, &raw) else {
            debug!(key = %key, value = %raw, "Rejected attribute value");
            continue;
        };
        let Some(attribute_id) = schema.attribute_id(group, &key) else {
            debug!(key = %key, group = %group, "No taxonomy attribute for key");
            continue;
        };
        values.push((attribute_id, value));
    }
    values
}

fn new_product(
    post: &Post,
    group: DomainGroup,
    seller: Option<String>,
    name: String,
    candidate: &ExtractedProduct,
    extraction: &Extraction,
) -> NewProduct {
    let mut media_ids = extraction.media_for(&candidate.source);
    if media_ids.is_empty() && extraction.image_map.len() == 1 {
        media_ids.extend(extraction.image_map.values().copied());
    }

    let clean = |key: &str, value: &Option<String>| {
        value.as_deref().and_then(|v| clean_attribute_value(key, v))
    };

    NewProduct {
        post_id: post.id,
        profile_id: post.profile_id,
        group_label: group.as_str().to_string(),
        name,
        brand: clean("brand", &candidate.brand),
        product_type: clean("type", &candidate.product_type),
        price: candidate.price,
        discount_price: candidate.discount_price,
        currency: clean("currency", &candidate.currency).map(|c| c.to_uppercase()),
        condition: clean("condition", &candidate.condition),
        description: clean("product_details", &candidate.product_details),
        confidence: candidate.confidence.as_str().to_string(),
        seller_username: seller,
        posted_at: post.posted_at,
        media_ids,
    }
}
