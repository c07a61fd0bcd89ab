pub mod catalog;
pub mod deps;
pub mod extraction;
pub mod pipeline;
pub mod scraping;
pub mod search;
pub mod store;
pub mod taxonomy;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use deps::PipelineDeps;
pub use pipeline::{Pipeline, TriggerOutcome};
pub use store::{CatalogStore, RunStore, TaxonomyStore};
