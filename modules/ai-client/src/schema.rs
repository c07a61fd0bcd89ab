use serde_json::{Map, Value};

/// Normalise a JSON schema for strict structured output.
///
/// Strict mode on both providers requires:
/// 1. `additionalProperties: false` on every object schema
/// 2. every property listed in `required`, nullable ones included
///
/// Existing `required` order is kept; missing keys are appended in property
/// order and duplicates are dropped, so the output is deterministic.
pub fn strict_schema(mut schema: Value) -> Value {
    fix_object_schemas(&mut schema);
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("definitions");
    }
    schema
}

fn fix_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                let property_keys: Vec<String> = match map.get("properties") {
                    Some(Value::Object(props)) => props.keys().cloned().collect(),
                    _ => Vec::new(),
                };

                let mut required: Vec<String> = Vec::new();
                if let Some(Value::Array(existing)) = map.get("required") {
                    for key in existing.iter().filter_map(Value::as_str) {
                        if !required.iter().any(|k| k == key) {
                            required.push(key.to_string());
                        }
                    }
                }
                for key in property_keys {
                    if !required.contains(&key) {
                        required.push(key);
                    }
                }
                map.insert(
                    "required".to_string(),
                    Value::Array(required.into_iter().map(Value::String).collect()),
                );
            }

            for (_, v) in map.iter_mut() {
                fix_object_schemas(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                fix_object_schemas(item);
            }
        }
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_objects_are_closed_and_fully_required() {
        let schema = strict_schema(json!({
            "type": "object",
            "properties": {
                "products": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "price": {"type": ["number", "null"]}
                        }
                    }
                }
            }
        }));

        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"], json!(["products"]));

        let item = &schema["properties"]["products"]["items"];
        assert_eq!(item["additionalProperties"], json!(false));
        assert_eq!(item["required"], json!(["name", "price"]));
    }

    #[test]
    fn existing_required_order_is_kept_and_deduplicated() {
        let schema = strict_schema(json!({
            "type": "object",
            "properties": {"a": {}, "b": {}, "c": {}},
            "required": ["c", "a", "c"]
        }));
        assert_eq!(schema["required"], json!(["c", "a", "b"]));
    }

    #[test]
    fn meta_keys_are_removed() {
        let schema = strict_schema(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {}
        }));
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["required"], json!([]));
    }
}
