//! Tool system for the clinical agent
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolCallResult` / `ToolPayload` - Result of a dispatched call
//! - `ToolRegistry` - Registry for the active tools
//! - `catalog` - Tool names, descriptions and schemas
//! - FHIR, patient info and literature search tools

pub mod catalog;
mod fhir_query;
mod literature;
mod patient_info;
mod registry;
mod result;
mod tool;

pub use catalog::tool_catalog;
pub use fhir_query::{
    build_query, default_parameters, is_valid_resource_type, FhirClient, FhirQueryInput, FhirQueryTool,
    FhirResourceTool,
};
pub use literature::{LiteratureSearchProvider, LiteratureSearchResponse, LiteratureSearchTool};
pub use patient_info::PatientInfoTool;
pub use registry::ToolRegistry;
pub use result::{normalize_error, normalize_message, ToolCallResult, ToolPayload, UNKNOWN_ERROR};
pub use tool::{Tool, ToolContext};
