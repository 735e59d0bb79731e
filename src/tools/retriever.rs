//! `local_search_tool`: exposes a run's attached resources to the research agent.

use crate::rag::Retriever;
use crate::tools::registry::Tool;
use crate::types::{AppError, Resource, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const NO_LOCAL_RESULTS: &str = "No results found from the local knowledge base.";

pub struct RetrieverTool {
    retriever: Arc<dyn Retriever>,
    resources: Vec<Resource>,
}

impl RetrieverTool {
    pub fn new(retriever: Arc<dyn Retriever>, resources: Vec<Resource>) -> Self {
        Self {
            retriever,
            resources,
        }
    }
}

/// Build the tool for a run, or `None` when there is nothing to search.
pub fn get_retriever_tool(
    retriever: Option<&Arc<dyn Retriever>>,
    resources: &[Resource],
) -> Option<Arc<dyn Tool>> {
    if resources.is_empty() {
        return None;
    }
    let retriever = retriever?;
    Some(Arc::new(RetrieverTool::new(
        Arc::clone(retriever),
        resources.to_vec(),
    )))
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        "local_search_tool"
    }

    fn description(&self) -> &str {
        "Useful for retrieving information from the file with `rag://` uri prefix, \
         it should be higher priority than the web search or writing code. \
         Input should be a search keywords."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "string",
                    "description": "search keywords to look up"
                }
            },
            "required": ["keywords"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let keywords = args
            .get("keywords")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidInput("Missing 'keywords' parameter".to_string()))?;

        info!(
            keywords,
            resources = self.resources.len(),
            "Retriever tool query"
        );
        let documents = self
            .retriever
            .query_relevant_documents(keywords, &self.resources)
            .await?;

        if documents.is_empty() {
            return Ok(Value::String(NO_LOCAL_RESULTS.to_string()));
        }
        Ok(Value::Array(documents.iter().map(|d| d.to_json()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::InMemoryRetriever;

    fn retriever() -> Arc<dyn Retriever> {
        let retriever = InMemoryRetriever::new();
        retriever.add(
            Resource::new("rag://dataset/1", "Ownership"),
            "Each value in Rust has an owner",
        );
        Arc::new(retriever)
    }

    #[test]
    fn test_no_tool_without_resources() {
        assert!(get_retriever_tool(Some(&retriever()), &[]).is_none());
        let resources = vec![Resource::new("rag://dataset/1", "Ownership")];
        assert!(get_retriever_tool(None, &resources).is_none());
        assert!(get_retriever_tool(Some(&retriever()), &resources).is_some());
    }

    #[tokio::test]
    async fn test_returns_documents() {
        let tool = RetrieverTool::new(
            retriever(),
            vec![Resource::new("rag://dataset/1", "Ownership")],
        );
        let value = tool.execute(json!({"keywords": "owner"})).await.unwrap();
        assert_eq!(value[0]["id"], "rag://dataset/1");
    }

    #[tokio::test]
    async fn test_empty_result_message() {
        let tool = RetrieverTool::new(
            retriever(),
            vec![Resource::new("rag://dataset/1", "Ownership")],
        );
        let value = tool.execute(json!({"keywords": "kubernetes"})).await.unwrap();
        assert_eq!(value, Value::String(NO_LOCAL_RESULTS.to_string()));
    }
}
