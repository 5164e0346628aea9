//! Provider protocol request and response messages
//!
//! Requests are `Clone` because fan-out operations hand an identical copy
//! to every backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    AttributePath, DataSourceMetadata, Diagnostic, DynamicValue, EphemeralResourceMetadata,
    Function, FunctionError, FunctionMetadata, ImportedResource, RawState, ResourceMetadata,
    Schema, ServerCapabilities,
};

// ============================================================================
// Provider-global operations
// ============================================================================

/// GetMetadata request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataRequest {}

/// GetMetadata response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataResponse {
    /// Supported optional features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_capabilities: Option<ServerCapabilities>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    /// Declared resource types
    #[serde(default)]
    pub resources: Vec<ResourceMetadata>,
    /// Declared data source types
    #[serde(default)]
    pub data_sources: Vec<DataSourceMetadata>,
    /// Declared functions
    #[serde(default)]
    pub functions: Vec<FunctionMetadata>,
    /// Declared ephemeral resource types
    #[serde(default)]
    pub ephemeral_resources: Vec<EphemeralResourceMetadata>,
}

/// GetProviderSchema request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetProviderSchemaRequest {}

/// GetProviderSchema response: the full declared surface of a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetProviderSchemaResponse {
    /// Supported optional features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_capabilities: Option<ServerCapabilities>,
    /// Provider configuration schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Schema>,
    /// Provider-meta configuration schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<Schema>,
    /// Resource schemas by type name
    #[serde(default)]
    pub resource_schemas: BTreeMap<String, Schema>,
    /// Data source schemas by type name
    #[serde(default)]
    pub data_source_schemas: BTreeMap<String, Schema>,
    /// Function signatures by name
    #[serde(default)]
    pub functions: BTreeMap<String, Function>,
    /// Ephemeral resource schemas by type name
    #[serde(default)]
    pub ephemeral_resource_schemas: BTreeMap<String, Schema>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// GetFunctions request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFunctionsRequest {}

/// GetFunctions response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetFunctionsResponse {
    /// Function signatures by name
    #[serde(default)]
    pub functions: BTreeMap<String, Function>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// ValidateProviderConfig request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateProviderConfigRequest {
    /// Provider configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
}

/// ValidateProviderConfig response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateProviderConfigResponse {
    /// Normalized configuration; at most one backend may return it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_config: Option<DynamicValue>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// ConfigureProvider request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigureProviderRequest {
    /// Version of the calling engine
    #[serde(default)]
    pub engine_version: String,
    /// Provider configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
}

/// ConfigureProvider response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureProviderResponse {
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// StopProvider request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopProviderRequest {}

/// StopProvider response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopProviderResponse {
    /// Error text; empty when the stop succeeded
    #[serde(default)]
    pub error: String,
}

// ============================================================================
// Resource operations
// ============================================================================

/// ValidateResourceConfig request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateResourceConfigRequest {
    /// Resource type name
    pub type_name: String,
    /// Resource configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
}

/// ValidateResourceConfig response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResourceConfigResponse {
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// UpgradeResourceState request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgradeResourceStateRequest {
    /// Resource type name
    pub type_name: String,
    /// Schema version the stored state was written with
    #[serde(default)]
    pub version: i64,
    /// Stored state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_state: Option<RawState>,
}

/// UpgradeResourceState response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgradeResourceStateResponse {
    /// State upgraded to the current schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_state: Option<DynamicValue>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// ReadResource request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    /// Resource type name
    pub type_name: String,
    /// Current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<DynamicValue>,
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
    /// Provider-meta configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<DynamicValue>,
}

/// ReadResource response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResponse {
    /// Refreshed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<DynamicValue>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
}

/// PlanResourceChange request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResourceChangeRequest {
    /// Resource type name
    pub type_name: String,
    /// Prior state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_state: Option<DynamicValue>,
    /// Proposed new state; null when planning destruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_new_state: Option<DynamicValue>,
    /// Resource configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
    /// Provider-private data from the prior state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_private: Vec<u8>,
    /// Provider-meta configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<DynamicValue>,
}

/// PlanResourceChange response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResourceChangeResponse {
    /// Planned state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_state: Option<DynamicValue>,
    /// Attributes whose change forces replacement
    #[serde(default)]
    pub requires_replace: Vec<AttributePath>,
    /// Provider-private data for the apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_private: Vec<u8>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// ApplyResourceChange request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResourceChangeRequest {
    /// Resource type name
    pub type_name: String,
    /// Prior state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_state: Option<DynamicValue>,
    /// Planned state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_state: Option<DynamicValue>,
    /// Resource configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
    /// Provider-private data from the plan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_private: Vec<u8>,
    /// Provider-meta configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<DynamicValue>,
}

/// ApplyResourceChange response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResourceChangeResponse {
    /// State after the apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<DynamicValue>,
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// ImportResourceState request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResourceStateRequest {
    /// Resource type name
    pub type_name: String,
    /// Caller-supplied import identifier
    pub id: String,
}

/// ImportResourceState response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResourceStateResponse {
    /// Imported resources
    #[serde(default)]
    pub imported_resources: Vec<ImportedResource>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// MoveResourceState request
///
/// Routed by `target_type_name`: the target resource owns the move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveResourceStateRequest {
    /// Address of the provider that wrote the source state
    #[serde(default)]
    pub source_provider_address: String,
    /// Source resource type name
    #[serde(default)]
    pub source_type_name: String,
    /// Source schema version
    #[serde(default)]
    pub source_schema_version: i64,
    /// Source state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_state: Option<RawState>,
    /// Target resource type name
    pub target_type_name: String,
    /// Source provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_private: Vec<u8>,
}

/// MoveResourceState response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveResourceStateResponse {
    /// State for the target resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_state: Option<DynamicValue>,
    /// Target provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_private: Vec<u8>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

// ============================================================================
// Data source operations
// ============================================================================

/// ValidateDataResourceConfig request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateDataResourceConfigRequest {
    /// Data source type name
    pub type_name: String,
    /// Data source configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
}

/// ValidateDataResourceConfig response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateDataResourceConfigResponse {
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// ReadDataSource request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadDataSourceRequest {
    /// Data source type name
    pub type_name: String,
    /// Data source configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
    /// Provider-meta configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<DynamicValue>,
}

/// ReadDataSource response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadDataSourceResponse {
    /// Data source state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DynamicValue>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

// ============================================================================
// Function operations
// ============================================================================

/// CallFunction request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallFunctionRequest {
    /// Function name
    pub name: String,
    /// Positional arguments
    #[serde(default)]
    pub arguments: Vec<DynamicValue>,
}

/// CallFunction response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallFunctionResponse {
    /// Function result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DynamicValue>,
    /// Function error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FunctionError>,
}

// ============================================================================
// Ephemeral resource operations
// ============================================================================

/// ValidateEphemeralResourceConfig request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateEphemeralResourceConfigRequest {
    /// Ephemeral resource type name
    pub type_name: String,
    /// Ephemeral resource configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
}

/// ValidateEphemeralResourceConfig response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateEphemeralResourceConfigResponse {
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// OpenEphemeralResource request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenEphemeralResourceRequest {
    /// Ephemeral resource type name
    pub type_name: String,
    /// Ephemeral resource configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicValue>,
}

/// OpenEphemeralResource response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenEphemeralResourceResponse {
    /// Opened value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DynamicValue>,
    /// Provider-private data for renew and close
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
    /// When the caller should renew
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_at: Option<DateTime<Utc>>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// RenewEphemeralResource request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewEphemeralResourceRequest {
    /// Ephemeral resource type name
    pub type_name: String,
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
}

/// RenewEphemeralResource response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewEphemeralResourceResponse {
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
    /// When the caller should renew next
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_at: Option<DateTime<Utc>>,
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// CloseEphemeralResource request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEphemeralResourceRequest {
    /// Ephemeral resource type name
    pub type_name: String,
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
}

/// CloseEphemeralResource response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEphemeralResourceResponse {
    /// Diagnostics
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_schema_decodes_with_missing_maps() {
        let resp: GetProviderSchemaResponse = serde_json::from_value(json!({
            "resource_schemas": { "example_thing": { "version": 1 } }
        }))
        .unwrap();

        assert!(resp.provider.is_none());
        assert_eq!(resp.resource_schemas["example_thing"].version, 1);
        assert!(resp.data_source_schemas.is_empty());
        assert!(resp.diagnostics.is_empty());
    }

    #[test]
    fn stop_response_defaults_to_no_error() {
        let resp: StopProviderResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.error.is_empty());
    }
}
