pub mod classify;
pub mod extract;
pub mod schema;
pub mod types;

pub use classify::classify;
pub use extract::{extract, Extraction};
pub use schema::{AttributeDef, ExtractionSchema, SchemaCatalog};
pub use types::{ExtractedProduct, ExtractionOutput};
