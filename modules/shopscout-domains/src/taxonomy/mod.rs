pub mod models;
pub mod normalize;
pub mod resolve;
pub mod tree;

pub use models::{
    Attribute, AttributeValue, AttributeValueAssociation, Category, DomainGroupRow,
    StructureOutput,
};
pub use resolve::{CategoryMatch, CategoryResolver};
pub use tree::{CategoryNode, CategoryTree};
