//! Medical literature search tool

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::catalog::{literature_search_definition, SEARCH_MEDICAL_LITERATURE};
use super::result::{normalize_error, normalize_message, ToolCallResult, ToolPayload};
use super::tool::{Tool, ToolContext};
use crate::llm::ToolDefinition;

/// Response of a literature search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureSearchResponse {
    pub success: bool,
    /// Narrative answer, referencing citations as `[1]`, `[2]`, ...
    pub content: String,
    /// Citation URLs; index `i` is referenced as `[i + 1]`
    #[serde(default)]
    pub citations: Vec<String>,
}

/// External literature search service (e.g. a Perplexity-style API)
#[async_trait]
pub trait LiteratureSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<LiteratureSearchResponse>;
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

/// Catalog tool wrapping a `LiteratureSearchProvider`
pub struct LiteratureSearchTool {
    provider: Arc<dyn LiteratureSearchProvider>,
}

impl LiteratureSearchTool {
    pub fn new(provider: Arc<dyn LiteratureSearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for LiteratureSearchTool {
    fn name(&self) -> &str {
        SEARCH_MEDICAL_LITERATURE
    }

    fn definition(&self) -> ToolDefinition {
        literature_search_definition()
    }

    async fn execute(&self, input: &Value, _context: &ToolContext) -> ToolCallResult {
        let query = match serde_json::from_value::<SearchArgs>(input.clone()) {
            Ok(args) if !args.query.trim().is_empty() => args.query,
            Ok(_) => {
                return ToolCallResult::failure(
                    SEARCH_MEDICAL_LITERATURE,
                    "Literature search failed",
                    "Query must not be empty",
                );
            }
            Err(e) => {
                return ToolCallResult::failure(
                    SEARCH_MEDICAL_LITERATURE,
                    "Literature search failed",
                    format!("Invalid arguments: {}", e),
                );
            }
        };

        tracing::info!("[LiteratureSearchTool] Searching: {}", query);

        match self.provider.search(&query).await {
            Ok(response) if response.success => ToolCallResult::success(
                SEARCH_MEDICAL_LITERATURE,
                format!(
                    "Literature search returned {} citation(s)",
                    response.citations.len()
                ),
                ToolPayload::LiteratureSearch {
                    content: response.content,
                    citations: response.citations,
                },
            ),
            Ok(response) => ToolCallResult::failure(
                SEARCH_MEDICAL_LITERATURE,
                "Literature search failed",
                normalize_message(&response.content),
            ),
            Err(e) => {
                let error = normalize_error(&e);
                tracing::warn!("[LiteratureSearchTool] Failed: {}", error);
                ToolCallResult::failure(SEARCH_MEDICAL_LITERATURE, "Literature search failed", error)
            }
        }
    }
}
