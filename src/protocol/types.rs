//! Provider protocol value types shared by requests and responses

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Unset or unknown severity
    #[default]
    Invalid,
    /// Error: the operation did not succeed
    Error,
    /// Warning: the operation succeeded but something deserves attention
    Warning,
}

/// A single step within an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributePathStep {
    /// Named attribute of an object or block
    AttributeName(String),
    /// String key into a map
    ElementKeyString(String),
    /// Integer index into a list
    ElementKeyInt(i64),
}

/// Location of an attribute within a configuration or state value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePath {
    /// Steps from the root of the value
    pub steps: Vec<AttributePathStep>,
}

/// Diagnostic reported by a provider
///
/// Diagnostics are data, not failures: an error-severity diagnostic travels
/// back to the caller inside the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: DiagnosticSeverity,
    /// Short summary
    pub summary: String,
    /// Longer explanation
    #[serde(default)]
    pub detail: String,
    /// Attribute the diagnostic refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<AttributePath>,
    /// Function argument the diagnostic refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_argument: Option<i64>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
            function_argument: None,
        }
    }

    /// Create a warning diagnostic
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
            function_argument: None,
        }
    }

    /// Returns `true` for error-severity diagnostics
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Returns `true` if any diagnostic has error severity
#[must_use]
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Opaque encoded configuration, plan or state value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicValue(Value);

impl DynamicValue {
    /// Wrap a JSON value
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON value
    #[must_use]
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the underlying JSON value
    #[must_use]
    pub fn into_json(self) -> Value {
        self.0
    }
}

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Prior state as stored by the caller, before any upgrade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawState {
    /// JSON-encoded state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Legacy flatmap-encoded state
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flatmap: BTreeMap<String, String>,
}

/// Versioned schema for a provider, resource, data source or ephemeral resource
///
/// The block is carried as-is; the mux compares schemas but never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema version
    #[serde(default)]
    pub version: i64,
    /// Attribute and nested block definitions
    #[serde(default)]
    pub block: Value,
}

impl Schema {
    /// Create a schema from a version and block
    #[must_use]
    pub fn new(version: i64, block: Value) -> Self {
        Self { version, block }
    }
}

/// Provider-defined function parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    #[serde(rename = "type", default)]
    pub type_: Value,
    /// Whether null values are accepted
    #[serde(default)]
    pub allow_null_value: bool,
    /// Whether unknown values are accepted
    #[serde(default)]
    pub allow_unknown_values: bool,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

/// Provider-defined function signature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Positional parameters
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    /// Trailing variadic parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variadic_parameter: Option<FunctionParameter>,
    /// Return type
    #[serde(default)]
    pub return_type: Value,
    /// Short summary
    #[serde(default)]
    pub summary: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Non-empty when the function is deprecated
    #[serde(default)]
    pub deprecation_message: String,
}

/// Error returned by a function call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionError {
    /// Error text
    pub text: String,
    /// Argument responsible for the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_argument: Option<i64>,
}

/// Optional protocol features a server supports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Server accepts plan calls for resource destruction
    #[serde(default)]
    pub plan_destroy: bool,
    /// Caller may skip schema discovery before other calls
    #[serde(default)]
    pub get_provider_schema_optional: bool,
    /// Server implements resource state moves
    #[serde(default)]
    pub move_resource_state: bool,
}

/// Resource type name in metadata responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Type name
    pub type_name: String,
}

/// Data source type name in metadata responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceMetadata {
    /// Type name
    pub type_name: String,
}

/// Function name in metadata responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    /// Function name
    pub name: String,
}

/// Ephemeral resource type name in metadata responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralResourceMetadata {
    /// Type name
    pub type_name: String,
}

/// Resource returned by an import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name
    pub type_name: String,
    /// Imported state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DynamicValue>,
    /// Provider-private data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&DiagnosticSeverity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let diags = vec![Diagnostic::warning("w", "")];
        assert!(!has_errors(&diags));

        let diags = vec![Diagnostic::warning("w", ""), Diagnostic::error("e", "")];
        assert!(has_errors(&diags));
    }

    #[test]
    fn dynamic_value_is_transparent() {
        let value = DynamicValue::new(json!({"hello": "world"}));
        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(encoded, json!({"hello": "world"}));
        assert_eq!(value.into_json(), encoded);
    }

    #[test]
    fn function_parameter_type_field_renamed() {
        let param: FunctionParameter =
            serde_json::from_value(json!({"name": "input", "type": "string"})).unwrap();
        assert_eq!(param.type_, json!("string"));
        assert!(!param.allow_null_value);
    }
}
