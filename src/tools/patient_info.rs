//! Patient demographics tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::catalog::{patient_info_definition, GET_PATIENT_INFO};
use super::fhir_query::FhirClient;
use super::result::{normalize_error, ToolCallResult, ToolPayload};
use super::tool::{Tool, ToolContext};
use crate::llm::ToolDefinition;

/// Reads the bound patient's `Patient` resource
pub struct PatientInfoTool {
    client: Arc<dyn FhirClient>,
}

impl PatientInfoTool {
    pub fn new(client: Arc<dyn FhirClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for PatientInfoTool {
    fn name(&self) -> &str {
        GET_PATIENT_INFO
    }

    fn definition(&self) -> ToolDefinition {
        patient_info_definition()
    }

    async fn execute(&self, _input: &Value, context: &ToolContext) -> ToolCallResult {
        let Some(patient_id) = context.patient_id.as_deref() else {
            return ToolCallResult::failure(
                GET_PATIENT_INFO,
                "Failed to query Patient data",
                "No patient context is bound to this conversation",
            );
        };

        let query = format!("Patient/{}", urlencoding::encode(patient_id));
        tracing::info!("[PatientInfoTool] {}", query);

        match self.client.request(&query).await {
            Ok(data) => ToolCallResult::success(
                GET_PATIENT_INFO,
                format!("Retrieved demographics for patient {}", patient_id),
                ToolPayload::PatientInfo { data },
            ),
            Err(e) => {
                let error = normalize_error(&e);
                tracing::warn!("[PatientInfoTool] Failed: {}", error);
                ToolCallResult::failure(GET_PATIENT_INFO, "Failed to query Patient data", error)
            }
        }
    }
}
