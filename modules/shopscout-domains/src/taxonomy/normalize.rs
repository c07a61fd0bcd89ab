use std::sync::OnceLock;

use regex::Regex;

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"))
}

/// Matching form of a taxonomy value: trimmed, lower-cased, single-spaced.
pub fn ai_value(text: &str) -> String {
    crate::catalog::validate::normalize_whitespace(text).to_lowercase()
}

/// URL slug: lower-case ASCII alphanumerics separated by single dashes.
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase().replace('&', " and ");
    non_alnum()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// The naive singular/plural counterpart of `name` (strip or append a trailing "s").
pub fn plural_variant(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(stem) = name.strip_suffix('s').or_else(|| name.strip_suffix('S')) {
        (!stem.is_empty()).then(|| stem.to_string())
    } else {
        Some(format!("{name}s"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_value_is_case_and_space_insensitive() {
        assert_eq!(ai_value("  Space  Gray "), "space gray");
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("Phones & Tablets"), "phones-and-tablets");
        assert_eq!(slugify("  Cars / SUVs!! "), "cars-suvs");
    }

    #[test]
    fn plural_variant_toggles_trailing_s() {
        assert_eq!(plural_variant("Phones").as_deref(), Some("Phone"));
        assert_eq!(plural_variant("Laptop").as_deref(), Some("Laptops"));
        assert_eq!(plural_variant("s"), None);
        assert_eq!(plural_variant("  "), None);
    }
}
