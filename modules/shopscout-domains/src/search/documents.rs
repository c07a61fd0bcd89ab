use serde_json::json;

use shopscout_core::SearchDocument;

use super::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};
use crate::catalog::models::Product;
use crate::taxonomy::models::Category;

pub fn product_document(product: &Product, categories: &[String]) -> SearchDocument {
    SearchDocument {
        collection: PRODUCTS_COLLECTION.to_string(),
        id: product.id.to_string(),
        body: json!({
            "id": product.id.to_string(),
            "post_id": product.post_id.to_string(),
            "name": product.name,
            "brand": product.brand,
            "type": product.product_type,
            "group": product.group_label,
            "price": product.price,
            "discount_price": product.discount_price,
            "has_discount": product.has_discount,
            "currency": product.currency,
            "condition": product.condition,
            "seller": product.seller_username,
            "categories": categories,
            "created_at": product.created_at.timestamp(),
        }),
    }
}

/// The document id is the category id, so vector hits map straight back.
pub fn category_document(category: &Category, full_path: &str) -> SearchDocument {
    SearchDocument {
        collection: CATEGORIES_COLLECTION.to_string(),
        id: category.id.to_string(),
        body: json!({
            "id": category.id.to_string(),
            "name": category.name,
            "slug": category.slug,
            "full_path": full_path,
            "score": category.score,
            "is_temp": category.is_temp,
        }),
    }
}
