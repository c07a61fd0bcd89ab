/// Placeholder answers models give instead of leaving a field empty.
const PLACEHOLDERS: &[&str] = &[
    "unknown",
    "n/a",
    "na",
    "none",
    "null",
    "nil",
    "undefined",
    "not specified",
    "unspecified",
    "not available",
    "not mentioned",
    "not provided",
    "not applicable",
    "tbd",
    "-",
    "--",
    "?",
];

/// Collapse internal whitespace and trim.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validate one extracted attribute value for `key`.
///
/// Returns the cleaned value, or `None` when it must not be persisted:
/// blank, a placeholder, or shorter than two characters (currency codes excepted).
pub fn clean_attribute_value(key: &str, value: &str) -> Option<String> {
    let cleaned = normalize_whitespace(value);
    if cleaned.is_empty() {
        return None;
    }
    let lowered = cleaned.to_lowercase();
    if PLACEHOLDERS.contains(&lowered.as_str()) {
        return None;
    }
    if key != "currency" && cleaned.chars().count() < 2 {
        return None;
    }
    Some(cleaned)
}

/// A discount exists only when `0 < discount_price < price`.
pub fn has_discount(price: f64, discount_price: f64) -> bool {
    discount_price > 0.0 && discount_price < price
}
