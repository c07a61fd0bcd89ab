pub mod documents;
pub mod embedder;
pub mod sync;
pub mod typesense;

pub use embedder::OpenAiEmbedder;
pub use sync::{SearchSync, SyncGuard};
pub use typesense::TypesenseClient;

pub const CATEGORIES_COLLECTION: &str = "categories";
pub const PRODUCTS_COLLECTION: &str = "products";
