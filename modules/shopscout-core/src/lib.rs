pub mod capabilities;
pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use capabilities::{
    EmbeddingService, MediaProcessor, PostData, PostPage, PostSource, RawMedia, SearchDocument,
    SearchIndexer, StoredMedia, VectorHit, VectorSearch,
};
pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult};
pub use file_config::{FileConfig, LlmConfig, PipelineConfig, ServerConfig};
pub use types::*;
