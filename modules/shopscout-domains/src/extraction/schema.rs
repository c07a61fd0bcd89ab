use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{json, Value};
use uuid::Uuid;

use ai_client::JsonSchemaSpec;
use shopscout_core::{Confidence, DomainGroup};

use crate::store::TaxonomyStore;
use crate::taxonomy::models::StructureOutput;

pub const SCHEMA_NAME: &str = "product_extraction";

pub const CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "AED", "SAR", "QAR", "KWD", "BHD", "OMR", "EGP", "JOD", "LBP", "TRY",
    "INR",
];

const TECH_PRODUCT_TYPES: &[&str] = &[
    "phone",
    "laptop",
    "tablet",
    "smartwatch",
    "headphones",
    "camera",
    "console",
    "accessory",
    "other",
];

const CAR_PRODUCT_TYPES: &[&str] = &[
    "car",
    "motorcycle",
    "truck",
    "suv",
    "van",
    "part",
    "accessory",
    "other",
];

const TECH_CONDITIONS: &[&str] = &["new", "like-new", "used", "refurbished", "for-parts"];
const CAR_CONDITIONS: &[&str] = &["new", "used", "certified-pre-owned", "salvage"];

const MAX_CATEGORIES: u64 = 2;

/// One attribute the model may fill for a group.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    pub key: String,
    pub description: String,
    pub required: bool,
    pub attribute_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
struct GroupSchema {
    product_types: Vec<String>,
    attributes: Vec<AttributeDef>,
}

/// Attribute definitions per domain group, built from Structure Output rows.
///
/// Loaded per batch so admin edits to Structure Outputs show up in the next
/// extraction. The value is immutable once built; `build_schema` is pure.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    groups: BTreeMap<DomainGroup, GroupSchema>,
}

impl SchemaCatalog {
    pub async fn load(store: &dyn TaxonomyStore) -> Result<Self> {
        let rows = store.structure_outputs().await?;
        Ok(Self::from_rows(&rows))
    }

    /// Rows are expected in store order (parent key, sort order, key).
    /// The first row for a key wins; rows for unknown groups are ignored.
    pub fn from_rows(rows: &[StructureOutput]) -> Self {
        let mut groups: BTreeMap<DomainGroup, GroupSchema> = BTreeMap::new();

        for row in rows {
            let Ok(group) = row.parent_key.parse::<DomainGroup>() else {
                tracing::debug!(parent_key = %row.parent_key, key = %row.key, "Skipping structure output for unknown group");
                continue;
            };
            let entry = groups.entry(group).or_default();

            if let Some(used_for) = row.used_for.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
                let used_for = used_for.to_lowercase();
                if !entry.product_types.contains(&used_for) {
                    entry.product_types.push(used_for);
                }
            }

            if entry.attributes.iter().any(|a| a.key == row.key) {
                continue;
            }
            entry.attributes.push(AttributeDef {
                key: row.key.clone(),
                description: row.description.clone(),
                required: row.required,
                attribute_id: row.attribute_id,
            });
        }

        Self { groups }
    }

    pub fn attributes(&self, group: DomainGroup) -> &[AttributeDef] {
        self.groups
            .get(&group)
            .map(|g| g.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// The taxonomy attribute linked to `key` within the group.
    pub fn attribute_id(&self, group: DomainGroup, key: &str) -> Option<Uuid> {
        self.attributes(group)
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.attribute_id)
    }

    pub fn product_types(&self, group: DomainGroup) -> Vec<String> {
        match self.groups.get(&group) {
            Some(g) if !g.product_types.is_empty() => {
                let mut types = g.product_types.clone();
                if !types.iter().any(|t| t == "other") {
                    types.push("other".to_string());
                }
                types
            }
            _ => default_product_types(group)
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Build the strict output schema for `group` with one source label per image.
    /// An unrecognised group resolves to the fallback group with a warning.
    pub fn build_schema(&self, group: &str, labels: &[String]) -> ExtractionSchema {
        let group = DomainGroup::resolve(group);
        self.build_for(group, labels)
    }

    pub fn build_for(&self, group: DomainGroup, labels: &[String]) -> ExtractionSchema {
        let product_types = self.product_types(group);
        let conditions = conditions(group);

        let mut attribute_props = serde_json::Map::new();
        let mut required_keys: Vec<String> = Vec::new();
        for attr in self.attributes(group) {
            let ty = if attr.required {
                json!("string")
            } else {
                json!(["string", "null"])
            };
            attribute_props.insert(
                attr.key.clone(),
                json!({ "type": ty, "description": attr.description }),
            );
            if attr.required && !required_keys.contains(&attr.key) {
                required_keys.push(attr.key.clone());
            }
        }

        let product = json!({
            "type": "object",
            "properties": {
                "brand": { "type": ["string", "null"], "description": "Manufacturer or make" },
                "name": { "type": "string", "description": "Model name as sold, without the brand" },
                "type": { "type": "string", "enum": product_types },
                "categories": {
                    "type": "array",
                    "items": { "type": "string" },
                    "maxItems": MAX_CATEGORIES,
                    "description": "Up to two catalog categories, most specific first"
                },
                "price": { "type": ["number", "null"], "description": "Asking price, null if not stated" },
                "discount_price": { "type": ["number", "null"], "description": "Reduced price if a discount is advertised" },
                "currency": { "type": ["string", "null"], "enum": nullable_enum(CURRENCIES.iter().copied()) },
                "condition": { "type": ["string", "null"], "enum": nullable_enum(conditions.iter().copied()) },
                "attributes": {
                    "type": "object",
                    "properties": Value::Object(attribute_props),
                    "required": required_keys,
                },
                "product_details": { "type": ["string", "null"], "description": "Other details from the caption" },
                "source": {
                    "type": "array",
                    "items": { "type": "string", "enum": labels },
                    "description": "Labels of the images that show this product"
                },
                "confidence": {
                    "type": "string",
                    "enum": Confidence::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>()
                }
            },
            "required": [
                "brand", "name", "type", "categories", "price", "discount_price",
                "currency", "condition", "attributes", "product_details", "source", "confidence"
            ]
        });

        let schema = json!({
            "type": "object",
            "properties": {
                "has_products": { "type": "boolean" },
                "post_type": { "type": ["string", "null"], "enum": nullable_enum(product_types.iter().map(String::as_str)) },
                "products": { "type": "array", "items": product }
            },
            "required": ["has_products", "post_type", "products"]
        });

        ExtractionSchema {
            group,
            labels: labels.to_vec(),
            spec: JsonSchemaSpec::new(SCHEMA_NAME, schema),
        }
    }
}

fn nullable_enum<'a>(values: impl Iterator<Item = &'a str>) -> Value {
    let mut items: Vec<Value> = values.map(|v| json!(v)).collect();
    items.push(Value::Null);
    Value::Array(items)
}

fn default_product_types(group: DomainGroup) -> &'static [&'static str] {
    match group {
        DomainGroup::Tech => TECH_PRODUCT_TYPES,
        DomainGroup::Car => CAR_PRODUCT_TYPES,
    }
}

pub fn conditions(group: DomainGroup) -> &'static [&'static str] {
    match group {
        DomainGroup::Tech => TECH_CONDITIONS,
        DomainGroup::Car => CAR_CONDITIONS,
    }
}

/// A built schema plus the inputs it was built for.
#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    pub group: DomainGroup,
    pub labels: Vec<String>,
    pub spec: JsonSchemaSpec,
}

impl ExtractionSchema {
    fn attributes_node(&self) -> Option<&Value> {
        self.spec
            .schema
            .pointer("/properties/products/items/properties/attributes")
    }

    pub fn attribute_keys(&self) -> Vec<String> {
        self.attributes_node()
            .and_then(|n| n.get("properties"))
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn required_attribute_keys(&self) -> Vec<String> {
        self.attributes_node()
            .and_then(|n| n.get("required"))
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(parent: &str, key: &str, required: bool, used_for: Option<&str>, order: i32) -> StructureOutput {
        StructureOutput {
            id: Uuid::new_v4(),
            key: key.to_string(),
            value_type: "string".to_string(),
            description: format!("The {key}"),
            parent_key: parent.to_string(),
            used_for: used_for.map(str::to_string),
            required,
            attribute_id: Some(Uuid::new_v4()),
            sort_order: order,
        }
    }

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::from_rows(&[
            row("car", "mileage", true, Some("car"), 0),
            row("tech", "storage", true, Some("phone"), 0),
            row("tech", "color", false, Some("phone"), 1),
            row("tech", "storage", false, Some("laptop"), 2),
            row("tech", "ram", true, Some("laptop"), 3),
            row("boat", "hull", true, None, 0),
        ])
    }

    fn labels(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("image_{i}")).collect()
    }

    #[test]
    fn first_definition_of_a_key_wins() {
        let catalog = catalog();
        let attrs = catalog.attributes(DomainGroup::Tech);
        let keys: Vec<_> = attrs.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["storage", "color", "ram"]);
        assert!(attrs[0].required);
    }

    #[test]
    fn required_keys_are_listed_once_in_row_order() {
        let schema = catalog().build_schema("tech", &labels(2));
        assert_eq!(schema.required_attribute_keys(), vec!["storage", "ram"]);
    }

    #[test]
    fn building_twice_is_byte_identical() {
        let catalog = catalog();
        let a = catalog.build_schema("tech", &labels(2));
        let b = catalog.build_schema("tech", &labels(2));
        assert_eq!(a.attribute_keys(), b.attribute_keys());
        assert_eq!(
            serde_json::to_string(&a.spec.schema).unwrap(),
            serde_json::to_string(&b.spec.schema).unwrap()
        );
    }

    #[test]
    fn unknown_group_builds_the_tech_schema() {
        let catalog = catalog();
        let boat = catalog.build_schema("boat", &labels(1));
        let tech = catalog.build_schema("tech", &labels(1));
        assert_eq!(boat.group, DomainGroup::Tech);
        assert_eq!(boat.spec.schema, tech.spec.schema);
    }

    #[test]
    fn source_is_restricted_to_the_given_labels() {
        let schema = catalog().build_schema("car", &labels(3));
        let source_enum = schema
            .spec
            .schema
            .pointer("/properties/products/items/properties/source/items/enum")
            .cloned()
            .unwrap();
        assert_eq!(source_enum, json!(["image_1", "image_2", "image_3"]));
        assert_eq!(schema.attribute_keys(), vec!["mileage"]);
    }

    #[test]
    fn product_types_come_from_used_for_with_an_other_bucket() {
        let catalog = catalog();
        assert_eq!(
            catalog.product_types(DomainGroup::Tech),
            vec!["phone", "laptop", "other"]
        );
        let empty = SchemaCatalog::default();
        assert_eq!(empty.product_types(DomainGroup::Car).len(), CAR_PRODUCT_TYPES.len());
    }

    #[test]
    fn group_enums_differ_for_condition() {
        let catalog = catalog();
        let car = catalog.build_schema("car", &labels(1));
        let condition = car
            .spec
            .schema
            .pointer("/properties/products/items/properties/condition/enum")
            .cloned()
            .unwrap();
        assert!(condition.as_array().unwrap().contains(&json!("salvage")));
        assert!(condition.as_array().unwrap().contains(&Value::Null));
    }

    #[test]
    fn attribute_id_lookup_is_scoped_to_group() {
        let catalog = catalog();
        assert!(catalog.attribute_id(DomainGroup::Tech, "storage").is_some());
        assert!(catalog.attribute_id(DomainGroup::Car, "storage").is_none());
    }
}
