//! Retrieval over user-attached resources.
//!
//! The research graph only needs the [`Retriever`] contract: given keywords and
//! the resources attached to a run, return relevant documents. Vendor
//! knowledge-base clients plug in behind the trait; [`InMemoryRetriever`] is the
//! bundled implementation used for local files.

/// BM25 lexical index.
pub mod search;

use crate::types::{AppError, Resource, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use search::Bm25Index;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A scored piece of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub similarity: f32,
}

/// A document returned by a retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Document {
    /// Flatten into the shape handed to the model: chunk contents joined by blank lines
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "id": self.id,
            "content": self
                .chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        });
        if let Some(url) = &self.url {
            value["url"] = serde_json::Value::String(url.clone());
        }
        if let Some(title) = &self.title {
            value["title"] = serde_json::Value::String(title.clone());
        }
        value
    }
}

/// A source of documents for attached resources
#[async_trait]
pub trait Retriever: Send + Sync {
    /// List resources known to the provider, optionally filtered by a query
    async fn list_resources(&self, query: Option<&str>) -> Result<Vec<Resource>>;

    /// Query documents relevant to `query`, restricted to `resources` when non-empty
    async fn query_relevant_documents(
        &self,
        query: &str,
        resources: &[Resource],
    ) -> Result<Vec<Document>>;
}

struct StoredResource {
    resource: Resource,
    content: String,
}

/// Retriever over documents held in memory, ranked with BM25.
pub struct InMemoryRetriever {
    resources: RwLock<HashMap<String, StoredResource>>,
    index: RwLock<Bm25Index>,
    top_k: usize,
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            index: RwLock::new(Bm25Index::new()),
            top_k: 5,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Add (or replace) a resource and its text
    pub fn add(&self, resource: Resource, content: impl Into<String>) {
        let content = content.into();
        self.index.write().add_document(&resource.uri, &content);
        self.resources
            .write()
            .insert(resource.uri.clone(), StoredResource { resource, content });
    }

    /// Load a local text file as a `file://` resource and return it
    pub fn add_file(&self, path: &Path) -> Result<Resource> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::InvalidInput(format!("Cannot read resource {}: {}", path.display(), e))
        })?;
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let resource = Resource::new(format!("file://{}", path.display()), title);
        self.add(resource.clone(), content);
        Ok(resource)
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn list_resources(&self, query: Option<&str>) -> Result<Vec<Resource>> {
        let resources = self.resources.read();
        let needle = query.map(str::to_lowercase);
        let mut listed: Vec<Resource> = resources
            .values()
            .filter(|stored| match &needle {
                Some(needle) => stored.resource.title.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .map(|stored| stored.resource.clone())
            .collect();
        listed.sort_by(|a, b| a.uri.cmp(&b.uri));
        Ok(listed)
    }

    async fn query_relevant_documents(
        &self,
        query: &str,
        resources: &[Resource],
    ) -> Result<Vec<Document>> {
        let hits = self.index.read().search(query, usize::MAX);
        let stored = self.resources.read();

        Ok(hits
            .into_iter()
            .filter(|(uri, _)| resources.is_empty() || resources.iter().any(|r| &r.uri == uri))
            .take(self.top_k)
            .filter_map(|(uri, score)| {
                stored.get(&uri).map(|entry| Document {
                    id: uri.clone(),
                    url: Some(uri.clone()),
                    title: Some(entry.resource.title.clone()),
                    chunks: vec![Chunk {
                        content: entry.content.clone(),
                        similarity: score,
                    }],
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever() -> InMemoryRetriever {
        let retriever = InMemoryRetriever::new();
        retriever.add(
            Resource::new("rag://dataset/rust", "Rust notes"),
            "Rust ownership and borrowing rules",
        );
        retriever.add(
            Resource::new("rag://dataset/go", "Go notes"),
            "Go goroutines and channels for concurrency",
        );
        retriever
    }

    #[tokio::test]
    async fn test_query_restricted_to_resources() {
        let retriever = retriever();
        let only_go = vec![Resource::new("rag://dataset/go", "Go notes")];

        let docs = retriever
            .query_relevant_documents("ownership concurrency", &only_go)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "rag://dataset/go");
    }

    #[tokio::test]
    async fn test_query_without_match() {
        let docs = retriever()
            .query_relevant_documents("kubernetes", &[])
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_list_resources_filters_by_title() {
        let listed = retriever().list_resources(Some("rust")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Rust notes");
    }

    #[test]
    fn test_add_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "borrow checker").unwrap();

        let retriever = InMemoryRetriever::new();
        let resource = retriever.add_file(&path).unwrap();
        assert!(resource.uri.starts_with("file://"));
        assert_eq!(resource.title, "notes.md");
        assert_eq!(retriever.len(), 1);
    }

    #[test]
    fn test_document_to_json() {
        let doc = Document {
            id: "1".to_string(),
            url: None,
            title: Some("t".to_string()),
            chunks: vec![
                Chunk { content: "a".to_string(), similarity: 1.0 },
                Chunk { content: "b".to_string(), similarity: 0.5 },
            ],
        };
        let json = doc.to_json();
        assert_eq!(json["content"], "a\n\nb");
        assert_eq!(json["title"], "t");
        assert!(json.get("url").is_none());
    }
}
