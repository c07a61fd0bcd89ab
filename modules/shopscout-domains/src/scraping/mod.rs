pub mod ingest;
pub mod media;
pub mod source;

pub use ingest::scrape_profile;
pub use media::StoredMediaProcessor;
pub use source::ApifyPostSource;
