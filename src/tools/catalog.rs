//! Tool catalog
//!
//! The fixed, ordered list of core query tools plus the optional literature
//! search tool. The catalog is assembled per request: literature search is
//! only offered when a literature provider key is configured.

use serde_json::json;

use crate::llm::{ToolDefinition, ToolInputSchema};

pub const GET_PATIENT_INFO: &str = "get_patient_info";
pub const QUERY_CONDITIONS: &str = "query_conditions";
pub const QUERY_MEDICATIONS: &str = "query_medications";
pub const QUERY_OBSERVATIONS: &str = "query_observations";
pub const QUERY_ALLERGIES: &str = "query_allergies";
pub const QUERY_PROCEDURES: &str = "query_procedures";
pub const QUERY_ENCOUNTERS: &str = "query_encounters";
pub const QUERY_FHIR_RESOURCES: &str = "query_fhir_resources";
pub const SEARCH_MEDICAL_LITERATURE: &str = "search_medical_literature";

/// Resource-specific query tools and the FHIR resource type each one reads
pub const RESOURCE_TOOLS: &[(&str, &str)] = &[
    (QUERY_CONDITIONS, "Condition"),
    (QUERY_MEDICATIONS, "MedicationRequest"),
    (QUERY_OBSERVATIONS, "Observation"),
    (QUERY_ALLERGIES, "AllergyIntolerance"),
    (QUERY_PROCEDURES, "Procedure"),
    (QUERY_ENCOUNTERS, "Encounter"),
];

/// FHIR resource type bound to a resource-specific tool name
pub fn resource_type_for_tool(tool_name: &str) -> Option<&'static str> {
    RESOURCE_TOOLS
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, resource_type)| *resource_type)
}

fn parameters_property() -> serde_json::Value {
    json!({
        "type": "object",
        "description": "Optional FHIR search parameters (e.g. {\"code\": \"vital-signs\", \"_count\": \"20\"}). Values override the tool's defaults.",
        "additionalProperties": { "type": "string" }
    })
}

fn resource_tool_description(tool_name: &str) -> &'static str {
    match tool_name {
        QUERY_CONDITIONS => "Query the patient's diagnoses and problem list (FHIR Condition), most recently recorded first.",
        QUERY_MEDICATIONS => "Query the patient's prescriptions (FHIR MedicationRequest), most recently authored first.",
        QUERY_OBSERVATIONS => "Query the patient's lab results and vital signs (FHIR Observation), most recent first.",
        QUERY_ALLERGIES => "Query the patient's allergies and intolerances (FHIR AllergyIntolerance).",
        QUERY_PROCEDURES => "Query procedures performed on the patient (FHIR Procedure), most recent first.",
        QUERY_ENCOUNTERS => "Query the patient's visits and admissions (FHIR Encounter), most recent first.",
        _ => "Query patient data.",
    }
}

/// Catalog entry for `get_patient_info`
pub fn patient_info_definition() -> ToolDefinition {
    ToolDefinition::new(
        GET_PATIENT_INFO,
        "Get the current patient's demographics (name, gender, birth date, identifiers) from the FHIR Patient resource.",
        ToolInputSchema::new().with_properties(json!({})),
    )
}

/// Catalog entry for one of the resource-specific query tools
pub fn resource_tool_definition(tool_name: &str) -> ToolDefinition {
    ToolDefinition::new(
        tool_name,
        resource_tool_description(tool_name),
        ToolInputSchema::new().with_properties(json!({ "parameters": parameters_property() })),
    )
}

/// Catalog entry for the generic FHIR query tool
pub fn fhir_query_definition() -> ToolDefinition {
    ToolDefinition::new(
        QUERY_FHIR_RESOURCES,
        "Query any FHIR resource type for the current patient (e.g. DiagnosticReport, Immunization, CarePlan). Use the specific query tools when one exists.",
        ToolInputSchema::new()
            .with_properties(json!({
                "resourceType": {
                    "type": "string",
                    "description": "FHIR resource type to search, e.g. \"DiagnosticReport\""
                },
                "parameters": parameters_property()
            }))
            .with_required(vec!["resourceType".to_string()]),
    )
}

/// Catalog entry for literature search
pub fn literature_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        SEARCH_MEDICAL_LITERATURE,
        "Search current medical literature and clinical guidelines. Returns a narrative answer with numbered citations.",
        ToolInputSchema::new()
            .with_properties(json!({
                "query": {
                    "type": "string",
                    "description": "Clinical question to research"
                }
            }))
            .with_required(vec!["query".to_string()]),
    )
}

/// The core query tools, in their fixed catalog order
pub fn core_tool_definitions() -> Vec<ToolDefinition> {
    let mut tools = vec![patient_info_definition()];
    tools.extend(
        RESOURCE_TOOLS
            .iter()
            .map(|(name, _)| resource_tool_definition(name)),
    );
    tools.push(fhir_query_definition());
    tools
}

/// Assemble the active catalog for a request
pub fn tool_catalog(has_literature_key: bool) -> Vec<ToolDefinition> {
    let mut tools = core_tool_definitions();
    if has_literature_key {
        tools.push(literature_search_definition());
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_without_literature() {
        let names: Vec<String> = tool_catalog(false).into_iter().map(|t| t.name).collect();
        assert_eq!(names.first().map(String::as_str), Some(GET_PATIENT_INFO));
        assert_eq!(names.last().map(String::as_str), Some(QUERY_FHIR_RESOURCES));
        assert!(!names.iter().any(|n| n == SEARCH_MEDICAL_LITERATURE));
    }

    #[test]
    fn test_literature_appended_last() {
        let catalog = tool_catalog(true);
        assert_eq!(catalog.len(), core_tool_definitions().len() + 1);
        assert_eq!(catalog.last().unwrap().name, SEARCH_MEDICAL_LITERATURE);
    }

    #[test]
    fn test_names_unique() {
        let catalog = tool_catalog(true);
        let names: HashSet<_> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), catalog.len());
    }

    #[test]
    fn test_resource_type_lookup() {
        assert_eq!(resource_type_for_tool(QUERY_CONDITIONS), Some("Condition"));
        assert_eq!(resource_type_for_tool(QUERY_MEDICATIONS), Some("MedicationRequest"));
        assert_eq!(resource_type_for_tool(QUERY_FHIR_RESOURCES), None);
    }
}
