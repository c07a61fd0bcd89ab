use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate domain group offered to the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DomainGroupRow {
    pub key: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attribute {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttributeValue {
    pub id: Uuid,
    pub attribute_id: Uuid,
    pub value: String,
    /// Lower-cased, whitespace-collapsed form used for matching.
    pub ai_value: String,
    pub score: i32,
    pub is_temp: bool,
    pub created_at: DateTime<Utc>,
}

/// Schema-definition row driving the extraction schema for one domain group.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StructureOutput {
    pub id: Uuid,
    pub key: String,
    pub value_type: String,
    pub description: String,
    /// Domain group key, e.g. `tech`.
    pub parent_key: String,
    /// Product type this field is typical for.
    pub used_for: Option<String>,
    pub required: bool,
    pub attribute_id: Option<Uuid>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub score: i32,
    pub is_temp: bool,
    pub created_at: DateTime<Utc>,
}

/// Value to product link with the value's `is_temp` copied at assignment time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttributeValueAssociation {
    pub id: Uuid,
    pub attribute_value_id: Uuid,
    pub post_id: Uuid,
    pub product_id: Uuid,
    pub is_temp: bool,
}
