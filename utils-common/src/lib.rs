pub mod compression;
pub mod models;

pub use models::{ArticleMetadata, IndexMetadata};
