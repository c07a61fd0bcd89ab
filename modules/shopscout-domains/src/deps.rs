use std::sync::Arc;

use typed_builder::TypedBuilder;

use ai_client::StructuredCompletion;
use shopscout_core::{
    DomainGroup, EmbeddingService, MediaProcessor, PipelineConfig, PostSource, VectorSearch,
};

use crate::catalog::Reconciler;
use crate::search::SearchSync;
use crate::store::{CatalogStore, RunStore, TaxonomyStore};
use crate::taxonomy::CategoryResolver;

/// Shared dependency container for every pipeline job.
///
/// Holds long-lived, cloneable handles. Per-job helpers (resolver,
/// reconciler) are built from these at the start of each job.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub catalog: Arc<dyn CatalogStore>,
    pub taxonomy: Arc<dyn TaxonomyStore>,
    pub runs: Arc<dyn RunStore>,
    pub extraction_llm: Arc<dyn StructuredCompletion>,
    pub classification_llm: Arc<dyn StructuredCompletion>,
    #[builder(default)]
    pub post_source: Option<Arc<dyn PostSource>>,
    pub media: Arc<dyn MediaProcessor>,
    #[builder(default)]
    pub embedder: Option<Arc<dyn EmbeddingService>>,
    #[builder(default)]
    pub vector_search: Option<Arc<dyn VectorSearch>>,
    #[builder(default = SearchSync::disabled())]
    pub search_sync: SearchSync,
    #[builder(default)]
    pub config: PipelineConfig,
}

impl PipelineDeps {
    pub fn default_group(&self) -> DomainGroup {
        DomainGroup::resolve(&self.config.default_group)
    }

    pub fn category_resolver(&self) -> CategoryResolver {
        CategoryResolver::new(
            self.taxonomy.clone(),
            self.embedder.clone(),
            self.vector_search.clone(),
            self.config.vector_distance_threshold,
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.catalog.clone(),
            self.taxonomy.clone(),
            self.category_resolver(),
            self.search_sync.clone(),
            self.config.promotion_threshold,
        )
    }
}
