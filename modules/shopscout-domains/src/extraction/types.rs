use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use shopscout_core::Confidence;

/// Parsed model answer for one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub has_products: bool,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub products: Vec<ExtractedProduct>,
}

impl ExtractionOutput {
    pub fn is_empty(&self) -> bool {
        !self.has_products || self.products.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    #[serde(default)]
    pub brand: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient_price")]
    pub discount_price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub product_details: Option<String>,
    /// Image labels (`image_1`, ...) showing this product.
    #[serde(default)]
    pub source: Vec<String>,
    pub confidence: Confidence,
}

impl ExtractedProduct {
    /// Attribute values rendered as text; nulls and nested values are skipped.
    pub fn attribute_texts(&self) -> impl Iterator<Item = (&str, String)> {
        self.attributes.iter().filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.as_str(), text))
        })
    }
}

/// Prices come back as numbers, numeric strings, or null. Anything
/// unusable or negative reads as 0, which means "no value".
fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let price = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => price_from_text(&s),
        _ => 0.0,
    };
    Ok(if price.is_finite() && price > 0.0 { price } else { 0.0 })
}

/// Read a price written as text, e.g. `"$42,500"` or `"799.99 USD"`.
///
/// Commas are thousands separators. A minus sign before the first digit
/// makes the price negative, and text mixing `,` and `.` is ambiguous
/// between locales; both read as 0.
fn price_from_text(text: &str) -> f64 {
    let Some(first_digit) = text.find(|c: char| c.is_ascii_digit()) else {
        return 0.0;
    };
    if text[..first_digit].contains('-') {
        return 0.0;
    }
    if text.contains(',') && text.contains('.') {
        return 0.0;
    }
    let digits: String = text[first_digit..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse().unwrap_or(0.0)
}
