pub mod models;
pub mod reconcile;
pub mod validate;

pub use models::{Media, NewPost, NewProduct, Post, Product, Profile};
pub use reconcile::{ProcessingOutcome, ProductSummary, Reconciler, ALREADY_PROCESSED_REASON};
