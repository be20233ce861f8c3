//! Tool registry for managing available tools
//!
//! The registry holds the tools active for one agent. Definitions are
//! returned in registration order, which is the catalog order when built
//! with `ToolRegistry::clinical`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::catalog::{RESOURCE_TOOLS, SEARCH_MEDICAL_LITERATURE};
use super::fhir_query::{FhirClient, FhirQueryTool, FhirResourceTool};
use super::literature::{LiteratureSearchProvider, LiteratureSearchTool};
use super::patient_info::PatientInfoTool;
use super::result::ToolCallResult;
use super::tool::{Tool, ToolContext};
use crate::llm::ToolDefinition;

/// Registry that holds all available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Build the clinical catalog
    ///
    /// All core query tools share one `FhirQueryTool`. Literature search is
    /// registered only when a provider is configured.
    pub fn clinical(
        fhir_client: Arc<dyn FhirClient>,
        literature: Option<Arc<dyn LiteratureSearchProvider>>,
    ) -> Self {
        let executor = FhirQueryTool::new(fhir_client.clone());
        let mut registry = Self::new();

        registry.register(PatientInfoTool::new(fhir_client));
        for (name, _) in RESOURCE_TOOLS {
            if let Some(tool) = FhirResourceTool::for_tool(name, executor.clone()) {
                registry.register(tool);
            }
        }
        registry.register(FhirResourceTool::generic(executor));

        if let Some(provider) = literature {
            registry.register(LiteratureSearchTool::new(provider));
        }

        registry
    }

    /// Register a tool; a tool with the same name is replaced in place
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        tracing::debug!("[ToolRegistry] Registering tool: {}", name);
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, in registration order
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    /// Whether literature search is part of this catalog
    pub fn has_literature_search(&self) -> bool {
        self.tools.contains_key(SEARCH_MEDICAL_LITERATURE)
    }

    /// Execute a tool by name; unknown names produce a failed result
    pub async fn execute(&self, name: &str, input: &Value, context: &ToolContext) -> ToolCallResult {
        match self.get(name) {
            Some(tool) => tool.execute(input, context).await,
            None => {
                tracing::warn!("[ToolRegistry] Tool not found: {}", name);
                ToolCallResult::failure(
                    name,
                    format!("Tool {} is not available", name),
                    format!("Unknown tool: {}", name),
                )
            }
        }
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
