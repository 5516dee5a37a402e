//! LanceDB vector store for ingested articles.
//!
//! The pipeline's final step: each classified article lands here with
//! its pooled embedding so downstream consumers can run similarity
//! search over the corpus. One table, `articles`, keyed by article id.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    FixedSizeListBuilder, Float32Builder, ListBuilder, RecordBatchIterator, StringArray,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::info;

use crate::StoreError;

const ARTICLES_TABLE: &str = "articles";

/// One classified article ready for vector storage.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub label: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    /// Unit-normalized embedding; length must equal the store's dim.
    pub embedding: Vec<f32>,
}

/// LanceDB store for the `articles` table.
pub struct ArticleStore {
    db: lancedb::Connection,
    dim: i32,
}

impl ArticleStore {
    /// Connect to a LanceDB database at the given path, creating the
    /// directory if needed. `dim` fixes the embedding column width.
    pub async fn open(path: &Path, dim: usize) -> Result<Self, StoreError> {
        let uri = path
            .to_str()
            .ok_or_else(|| StoreError::Other("non-UTF8 database path".into()))?;
        let db = lancedb::connect(uri).execute().await?;
        Ok(Self {
            db,
            dim: dim as i32,
        })
    }

    /// Append articles, creating the table on first insert.
    pub async fn insert_articles(&self, records: &[ArticleRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        for r in records {
            if r.embedding.len() != self.dim as usize {
                return Err(StoreError::Other(format!(
                    "article {} embedding has dim {}, store expects {}",
                    r.article_id,
                    r.embedding.len(),
                    self.dim
                )));
            }
        }

        let batch = self.build_batch(records)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new([Ok(batch)], schema);

        let existing = self.db.table_names().execute().await?;
        if existing.contains(&ARTICLES_TABLE.to_string()) {
            let table = self.db.open_table(ARTICLES_TABLE).execute().await?;
            table.add(Box::new(reader)).execute().await?;
        } else {
            self.db
                .create_table(ARTICLES_TABLE, Box::new(reader))
                .execute()
                .await?;
        }

        info!(rows = records.len(), "stored article embeddings");
        Ok(())
    }

    /// Number of stored articles.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let table = self.db.open_table(ARTICLES_TABLE).execute().await?;
        let count = table.count_rows(None).await?;
        Ok(count)
    }

    /// Nearest `limit` articles to the query embedding, by vector
    /// distance on the `embedding` column.
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RecordBatch>, StoreError> {
        let table = self.db.open_table(ARTICLES_TABLE).execute().await?;
        let results: Vec<RecordBatch> = table
            .vector_search(query_vector)?
            .limit(limit)
            .execute()
            .await?
            .try_collect()
            .await?;
        Ok(results)
    }

    // ── Internal ──

    fn build_batch(&self, records: &[ArticleRecord]) -> Result<RecordBatch, StoreError> {
        let mut ids = StringBuilder::new();
        let mut urls = StringBuilder::new();
        let mut titles = StringBuilder::new();
        let mut labels = StringBuilder::new();
        let mut summaries = StringBuilder::new();
        let mut tags = ListBuilder::new(StringBuilder::new());
        let mut embeddings = FixedSizeListBuilder::new(Float32Builder::new(), self.dim);

        for r in records {
            ids.append_value(&r.article_id);
            urls.append_value(&r.url);
            titles.append_value(&r.title);
            labels.append_value(&r.label);
            match &r.summary {
                Some(s) => summaries.append_value(s),
                None => summaries.append_null(),
            }
            for tag in &r.tags {
                tags.values().append_value(tag);
            }
            tags.append(true);
            for &v in &r.embedding {
                embeddings.values().append_value(v);
            }
            embeddings.append(true);
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("article_id", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("label", DataType::Utf8, false),
            Field::new("summary", DataType::Utf8, true),
            Field::new(
                "tags",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                true,
            ),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dim,
                ),
                true,
            ),
        ]));

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids.finish()),
                Arc::new(urls.finish()),
                Arc::new(titles.finish()),
                Arc::new(labels.finish()),
                Arc::new(summaries.finish()),
                Arc::new(tags.finish()),
                Arc::new(embeddings.finish()),
            ],
        )?;
        Ok(batch)
    }
}

/// Pull article ids out of search result batches, in result order.
pub fn result_article_ids(batches: &[RecordBatch]) -> Vec<String> {
    let mut ids = Vec::new();
    for batch in batches {
        if let Some(col) = batch.column_by_name("article_id")
            && let Some(arr) = col.as_any().downcast_ref::<StringArray>()
        {
            for i in 0..arr.len() {
                ids.push(arr.value(i).to_string());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, axis: usize) -> ArticleRecord {
        let mut embedding = vec![0.0f32; 4];
        embedding[axis] = 1.0;
        ArticleRecord {
            article_id: id.to_string(),
            url: format!("https://example.com/{id}"),
            title: format!("Article {id}"),
            label: "tech".to_string(),
            summary: None,
            tags: vec!["rust".to_string()],
            embedding,
        }
    }

    #[tokio::test]
    async fn insert_and_count() {
        let tmp = TempDir::new().unwrap();
        let store = ArticleStore::open(&tmp.path().join("lance"), 4).await.unwrap();

        store
            .insert_articles(&[record("a", 0), record("b", 1)])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        // Second insert appends.
        store.insert_articles(&[record("c", 2)]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn search_returns_nearest_first() {
        let tmp = TempDir::new().unwrap();
        let store = ArticleStore::open(&tmp.path().join("lance"), 4).await.unwrap();
        store
            .insert_articles(&[record("x_axis", 0), record("y_axis", 1)])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap();
        let ids = result_article_ids(&results);
        assert_eq!(ids, vec!["x_axis".to_string()]);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = ArticleStore::open(&tmp.path().join("lance"), 4).await.unwrap();

        let mut bad = record("bad", 0);
        bad.embedding = vec![1.0; 3];
        assert!(store.insert_articles(&[bad]).await.is_err());
    }

    #[tokio::test]
    async fn empty_insert_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = ArticleStore::open(&tmp.path().join("lance"), 4).await.unwrap();
        store.insert_articles(&[]).await.unwrap();
    }
}
