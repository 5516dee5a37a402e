//! Storage layer: bundle persistence (filesystem JSON) and the LanceDB
//! article vector store.

mod error;
pub use error::StoreError;

mod bundle;
pub use bundle::{BundleStore, FsBundleStore};

#[cfg(feature = "lancedb")]
mod lance;
#[cfg(feature = "lancedb")]
pub use lance::{ArticleRecord, ArticleStore, result_article_ids};
