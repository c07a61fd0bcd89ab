use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopscout_core::MediaRole;

use crate::taxonomy::models::{AttributeValue, Category};

/// A scraped account. Seller fields on products are copied from it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub external_id: String,
    pub caption: Option<String>,
    pub permalink: Option<String>,
    pub group_label: Option<String>,
    pub processed_structure: bool,
    pub categories: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Caption with surrounding whitespace removed, `None` when blank.
    pub fn caption_text(&self) -> Option<&str> {
        self.caption.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub profile_id: Uuid,
    pub external_id: String,
    pub caption: Option<String>,
    pub permalink: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: Uuid,
    pub post_id: Uuid,
    pub role: String,
    pub path: String,
    pub ordinal: i32,
    pub source_url: Option<String>,
}

impl Media {
    pub fn role(&self) -> Option<MediaRole> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub post_id: Uuid,
    pub profile_id: Uuid,
    pub group_label: String,
    pub name: String,
    pub brand: Option<String>,
    pub product_type: Option<String>,
    pub price: f64,
    pub discount_price: f64,
    pub has_discount: bool,
    pub currency: Option<String>,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub confidence: String,
    pub seller_username: Option<String>,
    pub primary_category_id: Option<Uuid>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub post_id: Uuid,
    pub profile_id: Uuid,
    pub group_label: String,
    pub name: String,
    pub brand: Option<String>,
    pub product_type: Option<String>,
    pub price: f64,
    pub discount_price: f64,
    pub currency: Option<String>,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub confidence: String,
    pub seller_username: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Source media in the order the model cited them.
    pub media_ids: Vec<Uuid>,
}

impl NewProduct {
    pub fn has_discount(&self) -> bool {
        super::validate::has_discount(self.price, self.discount_price)
    }
}

/// Category link planned for a product.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryRef {
    Existing(Uuid),
    /// No match in the taxonomy; created as a temporary category.
    New(String),
}

#[derive(Debug, Clone)]
pub struct ProductWrite {
    pub product: NewProduct,
    /// `(attribute_id, value)` pairs that already passed validation.
    pub values: Vec<(Uuid, String)>,
    /// The first category that resolves becomes the primary one.
    pub categories: Vec<CategoryRef>,
}

/// Everything one reconciliation writes for a post, applied as one unit.
#[derive(Debug, Clone)]
pub struct ReconcileWrite {
    pub post_id: Uuid,
    /// Category names as the model gave them, stored on the post.
    pub post_categories: Vec<String>,
    pub products: Vec<ProductWrite>,
    pub promotion_threshold: i32,
}

#[derive(Debug, Clone)]
pub struct AppliedProduct {
    pub product: Product,
    /// Linked values as they stand after scoring and promotion.
    pub values: Vec<AttributeValue>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default)]
pub struct AppliedReconcile {
    /// Products of an earlier extraction that were replaced.
    pub removed: u64,
    pub products: Vec<AppliedProduct>,
}
