use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use shopscout_core::{EmbeddingService, VectorSearch};

use super::models::Category;
use super::normalize::{plural_variant, slugify};
use crate::search::CATEGORIES_COLLECTION;
use crate::store::TaxonomyStore;

/// Which lookup produced a category hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatch {
    Vector,
    ExactName,
    Slug,
    PluralVariant,
}

/// Maps a free-text category name from the model onto an existing category.
///
/// Semantic search runs first and is accepted only within the distance
/// threshold. The deterministic lookups after it keep resolution working when
/// the search index is empty, stale or unreachable.
#[derive(Clone)]
pub struct CategoryResolver {
    taxonomy: Arc<dyn TaxonomyStore>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    vector_search: Option<Arc<dyn VectorSearch>>,
    distance_threshold: f32,
}

impl CategoryResolver {
    pub fn new(
        taxonomy: Arc<dyn TaxonomyStore>,
        embedder: Option<Arc<dyn EmbeddingService>>,
        vector_search: Option<Arc<dyn VectorSearch>>,
        distance_threshold: f32,
    ) -> Self {
        Self {
            taxonomy,
            embedder,
            vector_search,
            distance_threshold,
        }
    }

    pub async fn find_category_by_name(&self, name: &str) -> Result<Option<(Category, CategoryMatch)>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        match self.vector_lookup(name).await {
            Ok(Some(category)) => return Ok(Some((category, CategoryMatch::Vector))),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(category = name, error = %e, "Vector category search unavailable, using fallbacks");
            }
        }

        if let Some(category) = self.taxonomy.find_category_by_exact_name(name).await? {
            return Ok(Some((category, CategoryMatch::ExactName)));
        }

        let slug = slugify(name);
        if !slug.is_empty() {
            if let Some(category) = self.taxonomy.find_category_by_slug(&slug).await? {
                return Ok(Some((category, CategoryMatch::Slug)));
            }
        }

        if let Some(variant) = plural_variant(name) {
            if let Some(category) = self.taxonomy.find_category_by_exact_name(&variant).await? {
                return Ok(Some((category, CategoryMatch::PluralVariant)));
            }
        }

        tracing::debug!(category = name, "No category matched");
        Ok(None)
    }

    async fn vector_lookup(&self, name: &str) -> Result<Option<Category>> {
        let (Some(embedder), Some(search)) = (&self.embedder, &self.vector_search) else {
            return Ok(None);
        };

        let vector = embedder.embed(name).await?;
        let hits = search.search(CATEGORIES_COLLECTION, &vector, 1).await?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        if hit.distance > self.distance_threshold {
            tracing::debug!(
                category = name,
                distance = hit.distance,
                threshold = self.distance_threshold,
                "Nearest category too far"
            );
            return Ok(None);
        }

        let Ok(id) = hit.document_id.parse::<Uuid>() else {
            tracing::warn!(document_id = %hit.document_id, "Search hit with non-uuid id");
            return Ok(None);
        };
        self.taxonomy.find_category(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FixedEmbedder, MockVectorSearch, TEST_EMBEDDING_DIM};

    fn resolver(store: Arc<MemoryStore>, search: Option<MockVectorSearch>) -> CategoryResolver {
        let embedder: Option<Arc<dyn EmbeddingService>> = search
            .as_ref()
            .map(|_| Arc::new(FixedEmbedder::new(TEST_EMBEDDING_DIM)) as Arc<dyn EmbeddingService>);
        CategoryResolver::new(
            store,
            embedder,
            search.map(|s| Arc::new(s) as Arc<dyn VectorSearch>),
            0.30,
        )
    }

    #[tokio::test]
    async fn vector_hit_within_threshold_wins() {
        let store = Arc::new(MemoryStore::new());
        let phones = store.add_category("Mobile Phones", None);
        let search = MockVectorSearch::new().on_query("Smartphones", &phones.id.to_string(), 0.12);

        let (found, how) = resolver(store, Some(search))
            .find_category_by_name("Smartphones")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, phones.id);
        assert_eq!(how, CategoryMatch::Vector);
    }

    #[tokio::test]
    async fn distant_vector_hit_falls_through_to_exact_name() {
        let store = Arc::new(MemoryStore::new());
        let laptops = store.add_category("Laptops", None);
        let tablets = store.add_category("Tablets", None);
        let search = MockVectorSearch::new().on_query("laptops", &tablets.id.to_string(), 0.45);

        let (found, how) = resolver(store, Some(search))
            .find_category_by_name("laptops")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, laptops.id);
        assert_eq!(how, CategoryMatch::ExactName);
    }

    #[tokio::test]
    async fn failing_search_degrades_to_fallbacks() {
        let store = Arc::new(MemoryStore::new());
        let parts = store.add_category("Car Parts", None);
        let search = MockVectorSearch::failing();

        let (found, how) = resolver(store, Some(search))
            .find_category_by_name("car-parts")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, parts.id);
        assert_eq!(how, CategoryMatch::Slug);
    }

    #[tokio::test]
    async fn singular_and_plural_forms_match() {
        let store = Arc::new(MemoryStore::new());
        let consoles = store.add_category("Consoles", None);
        let (found, how) = resolver(store, None)
            .find_category_by_name("Console")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, consoles.id);
        assert_eq!(how, CategoryMatch::PluralVariant);
    }

    #[tokio::test]
    async fn unknown_names_resolve_to_none() {
        let store = Arc::new(MemoryStore::new());
        store.add_category("Phones", None);
        assert!(resolver(store, None)
            .find_category_by_name("Garden Furniture")
            .await
            .unwrap()
            .is_none());
    }
}
