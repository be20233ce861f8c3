//! FHIR query tool
//!
//! Resolves a tool call into a patient-scoped FHIR search and a one-line
//! summary. One `FhirQueryTool` executor backs every FHIR query tool in the
//! catalog; `FhirResourceTool` binds it to a tool name.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::catalog::{fhir_query_definition, resource_tool_definition, resource_type_for_tool};
use super::result::{normalize_error, ToolCallResult, ToolPayload};
use super::tool::{Tool, ToolContext};
use crate::llm::ToolDefinition;

/// Patient-scoped FHIR client
///
/// Read-only from the agent's point of view. The client owns transport,
/// authentication and request timeouts.
#[async_trait]
pub trait FhirClient: Send + Sync {
    /// Execute a relative query such as `Condition?patient=123&_count=100`
    async fn request(&self, query: &str) -> Result<Value>;
}

/// Default search parameters per resource type
///
/// Each resource has its own "most clinically relevant first" ordering.
pub fn default_parameters(resource_type: &str) -> &'static [(&'static str, &'static str)] {
    match resource_type {
        "Condition" => &[("_count", "100"), ("_sort", "-recorded-date")],
        "MedicationRequest" => &[("_sort", "-authoredon")],
        "Observation" => &[("_count", "200"), ("_sort", "-date")],
        "Procedure" => &[("_sort", "-date")],
        "Encounter" => &[("_count", "50"), ("_sort", "-date")],
        _ => &[],
    }
}

/// Whether `resource_type` is a bare FHIR type name such as `Observation`
///
/// Anything else (`?`, `/`, `#`, `&`) could rewrite the query path and leave
/// the bound patient's compartment.
pub fn is_valid_resource_type(resource_type: &str) -> bool {
    static TYPE_NAME: OnceLock<Regex> = OnceLock::new();
    TYPE_NAME
        .get_or_init(|| Regex::new(r"^[A-Z][A-Za-z]+$").expect("resource type regex is valid"))
        .is_match(resource_type)
}

/// Input of a single FHIR query
#[derive(Debug, Clone, PartialEq)]
pub struct FhirQueryInput {
    pub resource_type: String,
    pub patient_id: String,
    /// Caller-supplied search parameters; these win over the defaults
    pub parameters: Map<String, Value>,
}

impl FhirQueryInput {
    pub fn new(resource_type: impl Into<String>, patient_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            patient_id: patient_id.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

fn parameter_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(parameter_value).collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
        other => Some(other.to_string()),
    }
}

/// Merge default and caller parameters into the final query string
///
/// Defaults come first in their declared order; caller keys (sorted) either
/// replace a default in place or are appended.
pub fn build_query(input: &FhirQueryInput) -> String {
    let mut merged: Vec<(String, String)> = default_parameters(&input.resource_type)
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (key, value) in &input.parameters {
        // patient scope is fixed by the caller
        if key == "patient" {
            continue;
        }
        let Some(value) = parameter_value(value) else {
            continue;
        };
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value,
            None => merged.push((key.clone(), value)),
        }
    }

    let mut query = format!(
        "{}?patient={}",
        urlencoding::encode(&input.resource_type),
        urlencoding::encode(&input.patient_id)
    );
    for (key, value) in merged {
        query.push('&');
        query.push_str(&urlencoding::encode(&key));
        query.push('=');
        query.push_str(&urlencoding::encode(&value));
    }
    query
}

fn entry_count(response: &Value) -> usize {
    response
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// Executor shared by every FHIR query tool
#[derive(Clone)]
pub struct FhirQueryTool {
    client: Arc<dyn FhirClient>,
}

impl FhirQueryTool {
    pub fn new(client: Arc<dyn FhirClient>) -> Self {
        Self { client }
    }

    /// Run one query. Never fails: errors come back as an unsuccessful result.
    pub async fn query(&self, tool_name: &str, input: &FhirQueryInput) -> ToolCallResult {
        if !is_valid_resource_type(&input.resource_type) {
            tracing::warn!(
                "[FhirQueryTool] {} rejected resource type {:?}",
                tool_name,
                input.resource_type
            );
            return ToolCallResult::failure(
                tool_name,
                "Failed to query FHIR data",
                format!("Invalid resourceType: {}", input.resource_type),
            );
        }

        let query = build_query(input);
        tracing::info!("[FhirQueryTool] {} -> {}", tool_name, query);

        match self.client.request(&query).await {
            Ok(response) => {
                let count = entry_count(&response);
                tracing::debug!(
                    "[FhirQueryTool] {} returned {} {} record(s)",
                    tool_name,
                    count,
                    input.resource_type
                );
                ToolCallResult::success(
                    tool_name,
                    format!(
                        "Found {} {} record(s) for patient {}",
                        count, input.resource_type, input.patient_id
                    ),
                    ToolPayload::FhirQuery {
                        resource_type: input.resource_type.clone(),
                        count,
                        data: response,
                    },
                )
            }
            Err(e) => {
                let error = normalize_error(&e);
                tracing::warn!("[FhirQueryTool] {} failed: {}", tool_name, error);
                ToolCallResult::failure(
                    tool_name,
                    format!("Failed to query {} data", input.resource_type),
                    error,
                )
            }
        }
    }
}

/// Arguments accepted by the FHIR query tools
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryArgs {
    resource_type: Option<String>,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

/// A catalog tool backed by `FhirQueryTool`
///
/// Either bound to a fixed resource type (`query_conditions`, ...) or the
/// generic `query_fhir_resources`, which reads `resourceType` from arguments.
pub struct FhirResourceTool {
    name: String,
    resource_type: Option<&'static str>,
    executor: FhirQueryTool,
}

impl FhirResourceTool {
    /// Tool for one of the resource-specific catalog names
    pub fn for_tool(name: &str, executor: FhirQueryTool) -> Option<Self> {
        resource_type_for_tool(name).map(|resource_type| Self {
            name: name.to_string(),
            resource_type: Some(resource_type),
            executor,
        })
    }

    /// The generic `query_fhir_resources` tool
    pub fn generic(executor: FhirQueryTool) -> Self {
        Self {
            name: super::catalog::QUERY_FHIR_RESOURCES.to_string(),
            resource_type: None,
            executor,
        }
    }
}

#[async_trait]
impl Tool for FhirResourceTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        match self.resource_type {
            Some(_) => resource_tool_definition(&self.name),
            None => fhir_query_definition(),
        }
    }

    async fn execute(&self, input: &Value, context: &ToolContext) -> ToolCallResult {
        let args: QueryArgs = if input.is_null() {
            QueryArgs::default()
        } else {
            match serde_json::from_value(input.clone()) {
                Ok(args) => args,
                Err(e) => {
                    return ToolCallResult::failure(
                        &self.name,
                        "Failed to query FHIR data",
                        format!("Invalid arguments: {}", e),
                    );
                }
            }
        };

        let resource_type = match (self.resource_type, args.resource_type) {
            (Some(fixed), _) => fixed.to_string(),
            (None, Some(requested)) if !requested.trim().is_empty() => requested.trim().to_string(),
            (None, _) => {
                return ToolCallResult::failure(
                    &self.name,
                    "Failed to query FHIR data",
                    "Missing required argument: resourceType",
                );
            }
        };

        let Some(patient_id) = context.patient_id.clone() else {
            return ToolCallResult::failure(
                &self.name,
                format!("Failed to query {} data", resource_type),
                "No patient context is bound to this conversation",
            );
        };

        let mut query = FhirQueryInput::new(resource_type, patient_id);
        query.parameters = args.parameters.unwrap_or_default();

        self.executor.query(&self.name, &query).await
    }
}
