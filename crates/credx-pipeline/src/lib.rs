//! Ingestion collaborators for credx: the work-queue client, the article
//! scraper/verifier, the summary client, and keyword tag extraction.
//!
//! Everything here is thin glue around HTTP and text; classification
//! itself lives in `credx-ai`.

mod error;
pub mod queue;
pub mod scraper;
pub mod summary;
pub mod tags;
#[cfg(test)]
mod testutil;

pub use error::PipelineError;
pub use queue::{ArticleJob, QueueClient};
pub use scraper::{Scraper, article_id, clean, verify};
pub use summary::SummaryClient;
pub use tags::extract_tags;
