//! Web search and page crawling powered by daedra
//!
//! Search uses DuckDuckGo as the backend; crawling converts a page to
//! markdown.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Maximum characters of crawled content handed back to the model.
pub const CRAWL_CONTENT_LIMIT: usize = 1000;

/// A single web search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Run a DuckDuckGo search and return at most `max_results` hits.
pub async fn web_search(query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let search_args = daedra::SearchArgs {
        query: query.to_string(),
        options: Some(daedra::SearchOptions {
            num_results: max_results,
            ..Default::default()
        }),
    };

    let response = daedra::tools::search::perform_search(&search_args)
        .await
        .map_err(|e| AppError::Tool(format!("Search failed: {}", e)))?;

    Ok(response
        .data
        .iter()
        .take(max_results)
        .map(|r| SearchHit {
            title: r.title.clone(),
            url: r.url.clone(),
            content: r.description.clone(),
        })
        .collect())
}

/// Web search tool
pub struct SearchTool {
    max_results: usize,
}

impl SearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information using DuckDuckGo"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidInput("Missing 'query' parameter".to_string()))?;

        let results: Vec<Value> = web_search(query, self.max_results)
            .await?
            .into_iter()
            .map(|hit| {
                json!({
                    "title": hit.title,
                    "url": hit.url,
                    "content": hit.content
                })
            })
            .collect();

        Ok(json!({
            "query": query,
            "results": results,
            "count": results.len()
        }))
    }
}

/// Page crawling tool
#[derive(Default)]
pub struct CrawlTool;

impl CrawlTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CrawlTool {
    fn name(&self) -> &str {
        "crawl_tool"
    }

    fn description(&self) -> &str {
        "Crawl a url and get readable content in markdown format"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The url to crawl"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidInput("Missing 'url' parameter".to_string()))?;

        let fetch_args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };

        let page = daedra::tools::fetch::fetch_page(&fetch_args)
            .await
            .map_err(|e| AppError::Tool(format!("Failed to crawl {}: {}", url, e)))?;

        let content: String = page.content.chars().take(CRAWL_CONTENT_LIMIT).collect();
        Ok(json!({
            "url": url,
            "title": page.title,
            "crawled_content": content
        }))
    }
}
