//! Built-in Tools for Agent Capabilities
//!
//! Tools let the research and code agents act beyond text generation.
//!
//! # Module Structure
//!
//! - [`registry`] - Tool trait, registration and dispatch
//! - [`search`] - `web_search` and `crawl_tool` (requires the `web-search` feature)
//! - [`python_repl`] - `python_repl_tool` for the code agent
//! - [`retriever`] - `local_search_tool` over attached resources

/// Python execution tool.
pub mod python_repl;
/// Tool registry for managing available tools.
pub mod registry;
/// Local knowledge-base search over attached resources.
pub mod retriever;
/// Web search and crawling via DuckDuckGo.
#[cfg(feature = "web-search")]
pub mod search;

pub use registry::{Tool, ToolRegistry};
