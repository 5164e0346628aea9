//! `SchemaFileBackend` — a backend that only knows its declared schema.
//!
//! Used by the command line to check a set of provider schemas for routing
//! conflicts without starting the providers. Provider-global calls succeed
//! with empty responses; type-scoped calls are rejected.

use std::path::Path;

use async_trait::async_trait;

use super::ProviderServer;
use crate::protocol::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, ConfigureProviderRequest,
    ConfigureProviderResponse, GetProviderSchemaRequest, GetProviderSchemaResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, PlanResourceChangeRequest,
    PlanResourceChangeResponse, ReadDataSourceRequest, ReadDataSourceResponse,
    ReadResourceRequest, ReadResourceResponse, StopProviderRequest, StopProviderResponse,
    UpgradeResourceStateRequest, UpgradeResourceStateResponse, ValidateDataResourceConfigRequest,
    ValidateDataResourceConfigResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse, rpc,
};
use crate::{Error, Result};

/// Backend serving a fixed schema loaded from a JSON document
#[derive(Debug, Clone)]
pub struct SchemaFileBackend {
    name: String,
    schema: GetProviderSchemaResponse,
}

impl SchemaFileBackend {
    /// Create a backend from an in-memory schema
    #[must_use]
    pub fn new(name: impl Into<String>, schema: GetProviderSchemaResponse) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Load a JSON-encoded `GetProviderSchemaResponse` from `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read schema {}: {e}", path.display()))
        })?;
        let schema = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("Failed to parse schema {}: {e}", path.display()))
        })?;
        Ok(Self::new(name, schema))
    }

    /// Name this backend was loaded under
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn unsupported(&self, rpc: &str, type_name: &str) -> Error {
        Error::Unimplemented(format!(
            "{rpc} for {type_name:?} is not served by schema-only backend {}",
            self.name
        ))
    }
}

#[async_trait]
impl ProviderServer for SchemaFileBackend {
    async fn get_provider_schema(
        &self,
        _req: GetProviderSchemaRequest,
    ) -> Result<GetProviderSchemaResponse> {
        Ok(self.schema.clone())
    }

    async fn validate_provider_config(
        &self,
        _req: ValidateProviderConfigRequest,
    ) -> Result<ValidateProviderConfigResponse> {
        Ok(ValidateProviderConfigResponse::default())
    }

    async fn configure_provider(
        &self,
        _req: ConfigureProviderRequest,
    ) -> Result<ConfigureProviderResponse> {
        Ok(ConfigureProviderResponse::default())
    }

    async fn stop_provider(&self, _req: StopProviderRequest) -> Result<StopProviderResponse> {
        Ok(StopProviderResponse::default())
    }

    async fn validate_resource_config(
        &self,
        req: ValidateResourceConfigRequest,
    ) -> Result<ValidateResourceConfigResponse> {
        Err(self.unsupported(rpc::VALIDATE_RESOURCE_CONFIG, &req.type_name))
    }

    async fn upgrade_resource_state(
        &self,
        req: UpgradeResourceStateRequest,
    ) -> Result<UpgradeResourceStateResponse> {
        Err(self.unsupported(rpc::UPGRADE_RESOURCE_STATE, &req.type_name))
    }

    async fn read_resource(&self, req: ReadResourceRequest) -> Result<ReadResourceResponse> {
        Err(self.unsupported(rpc::READ_RESOURCE, &req.type_name))
    }

    async fn plan_resource_change(
        &self,
        req: PlanResourceChangeRequest,
    ) -> Result<PlanResourceChangeResponse> {
        Err(self.unsupported(rpc::PLAN_RESOURCE_CHANGE, &req.type_name))
    }

    async fn apply_resource_change(
        &self,
        req: ApplyResourceChangeRequest,
    ) -> Result<ApplyResourceChangeResponse> {
        Err(self.unsupported(rpc::APPLY_RESOURCE_CHANGE, &req.type_name))
    }

    async fn import_resource_state(
        &self,
        req: ImportResourceStateRequest,
    ) -> Result<ImportResourceStateResponse> {
        Err(self.unsupported(rpc::IMPORT_RESOURCE_STATE, &req.type_name))
    }

    async fn validate_data_resource_config(
        &self,
        req: ValidateDataResourceConfigRequest,
    ) -> Result<ValidateDataResourceConfigResponse> {
        Err(self.unsupported(rpc::VALIDATE_DATA_RESOURCE_CONFIG, &req.type_name))
    }

    async fn read_data_source(&self, req: ReadDataSourceRequest) -> Result<ReadDataSourceResponse> {
        Err(self.unsupported(rpc::READ_DATA_SOURCE, &req.type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_reads_json_schema() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"resource_schemas": {{"example_thing": {{"version": 2}}}}}}"#
        )
        .unwrap();

        let backend = SchemaFileBackend::load("example", file.path()).unwrap();

        assert_eq!(backend.name(), "example");
        assert_eq!(backend.schema.resource_schemas["example_thing"].version, 2);
    }

    #[test]
    fn load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = SchemaFileBackend::load("broken", file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse schema"));
    }

    #[tokio::test]
    async fn type_scoped_calls_are_unimplemented() {
        let backend = SchemaFileBackend::new("example", GetProviderSchemaResponse::default());

        let err = backend
            .read_resource(ReadResourceRequest {
                type_name: "example_thing".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unimplemented(_)));
        assert!(err.to_string().contains("example_thing"));
    }
}
