//! In-memory provider server for tests
//!
//! [`TestServer`] declares whatever schema surface it is built with, echoes
//! request payloads back, and records every call it receives. Failures,
//! cancellations and latency can be injected per RPC.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::backend::{BackendId, ProviderServer};
use crate::protocol::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, CallFunctionRequest,
    CallFunctionResponse, CloseEphemeralResourceRequest, CloseEphemeralResourceResponse,
    ConfigureProviderRequest, ConfigureProviderResponse, Diagnostic, DynamicValue, Function,
    GetFunctionsRequest, GetFunctionsResponse, GetMetadataRequest, GetMetadataResponse,
    GetProviderSchemaRequest, GetProviderSchemaResponse, ImportResourceStateRequest,
    ImportResourceStateResponse, ImportedResource, MoveResourceStateRequest,
    MoveResourceStateResponse, OpenEphemeralResourceRequest, OpenEphemeralResourceResponse,
    PlanResourceChangeRequest, PlanResourceChangeResponse, ReadDataSourceRequest,
    ReadDataSourceResponse, ReadResourceRequest, ReadResourceResponse,
    RenewEphemeralResourceRequest, RenewEphemeralResourceResponse, Schema, ServerCapabilities,
    StopProviderRequest, StopProviderResponse, UpgradeResourceStateRequest,
    UpgradeResourceStateResponse, ValidateDataResourceConfigRequest,
    ValidateDataResourceConfigResponse, ValidateEphemeralResourceConfigRequest,
    ValidateEphemeralResourceConfigResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
    rpc,
};
use crate::{Error, Result};

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// RPC name
    pub rpc: &'static str,
    /// Type or function name for type-scoped calls
    pub type_name: Option<String>,
}

/// Configurable in-memory [`ProviderServer`]
#[derive(Debug, Default)]
pub struct TestServer {
    schema: GetProviderSchemaResponse,
    failures: HashMap<&'static str, String>,
    cancellations: HashSet<&'static str>,
    relayed_cancellations: HashSet<&'static str>,
    delay: Option<Duration>,
    rpc_delays: HashMap<&'static str, Duration>,
    validate: ValidateProviderConfigResponse,
    configure_diagnostics: Vec<Diagnostic>,
    stop_error: String,
    diagnostics: Vec<Diagnostic>,
    calls: Mutex<Vec<Call>>,
}

impl TestServer {
    /// Server declaring nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a managed resource type
    #[must_use]
    pub fn with_resource(mut self, type_name: &str) -> Self {
        self.schema
            .resource_schemas
            .insert(type_name.to_string(), Schema::default());
        self
    }

    /// Declare a data source type
    #[must_use]
    pub fn with_data_source(mut self, type_name: &str) -> Self {
        self.schema
            .data_source_schemas
            .insert(type_name.to_string(), Schema::default());
        self
    }

    /// Declare a provider-defined function
    #[must_use]
    pub fn with_function(mut self, name: &str) -> Self {
        self.schema
            .functions
            .insert(name.to_string(), Function::default());
        self
    }

    /// Declare an ephemeral resource type
    #[must_use]
    pub fn with_ephemeral_resource(mut self, type_name: &str) -> Self {
        self.schema
            .ephemeral_resource_schemas
            .insert(type_name.to_string(), Schema::default());
        self
    }

    /// Set the provider configuration schema
    #[must_use]
    pub fn with_provider_schema(mut self, schema: Schema) -> Self {
        self.schema.provider = Some(schema);
        self
    }

    /// Set the provider_meta schema
    #[must_use]
    pub fn with_provider_meta_schema(mut self, schema: Schema) -> Self {
        self.schema.provider_meta = Some(schema);
        self
    }

    /// Add a diagnostic to the schema discovery response
    #[must_use]
    pub fn with_schema_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.schema.diagnostics.push(diagnostic);
        self
    }

    /// Advertise server capabilities
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.schema.server_capabilities = Some(capabilities);
        self
    }

    /// Fail `rpc` with a transport error
    #[must_use]
    pub fn with_failure(mut self, rpc: &'static str, message: &str) -> Self {
        self.failures.insert(rpc, message.to_string());
        self
    }

    /// Report `rpc` as cancelled
    #[must_use]
    pub fn with_cancellation(mut self, rpc: &'static str) -> Self {
        self.cancellations.insert(rpc);
        self
    }

    /// Report `rpc` as a downstream call failure wrapping a cancellation,
    /// the way a nested mux relays one of its own backends
    #[must_use]
    pub fn with_relayed_cancellation(mut self, rpc: &'static str) -> Self {
        self.relayed_cancellations.insert(rpc);
        self
    }

    /// Sleep before answering any call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering `rpc` only
    #[must_use]
    pub fn with_delay_on(mut self, rpc: &'static str, delay: Duration) -> Self {
        self.rpc_delays.insert(rpc, delay);
        self
    }

    /// Populate `PreparedConfig` in validate-provider-config responses
    #[must_use]
    pub fn with_prepared_config(mut self, value: Value) -> Self {
        self.validate.prepared_config = Some(DynamicValue::new(value));
        self
    }

    /// Add a diagnostic to validate-provider-config responses
    #[must_use]
    pub fn with_validate_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.validate.diagnostics.push(diagnostic);
        self
    }

    /// Add a diagnostic to configure-provider responses
    #[must_use]
    pub fn with_configure_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.configure_diagnostics.push(diagnostic);
        self
    }

    /// Report `error` from stop-provider
    #[must_use]
    pub fn with_stop_error(mut self, error: &str) -> Self {
        self.stop_error = error.to_string();
        self
    }

    /// Add a diagnostic to every type-scoped response
    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    /// The schema surface this server declares
    #[must_use]
    pub fn schema(&self) -> &GetProviderSchemaResponse {
        &self.schema
    }

    /// Every call received so far
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Returns `true` if `rpc` was received at least once
    #[must_use]
    pub fn called(&self, rpc: &str) -> bool {
        self.call_count(rpc) > 0
    }

    /// Number of times `rpc` was received
    #[must_use]
    pub fn call_count(&self, rpc: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.rpc == rpc).count()
    }

    /// Returns `true` if `rpc` was received for `type_name`
    #[must_use]
    pub fn called_with(&self, rpc: &str, type_name: &str) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| c.rpc == rpc && c.type_name.as_deref() == Some(type_name))
    }

    async fn enter(&self, rpc: &'static str, type_name: Option<&str>) -> Result<()> {
        self.calls.lock().push(Call {
            rpc,
            type_name: type_name.map(str::to_string),
        });

        if let Some(delay) = self.rpc_delays.get(rpc).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        if self.cancellations.contains(rpc) {
            return Err(Error::Cancelled);
        }
        if self.relayed_cancellations.contains(rpc) {
            return Err(Error::BackendCallFailed {
                rpc,
                backend: BackendId::new(0),
                source: Box::new(Error::Cancelled),
            });
        }
        match self.failures.get(rpc) {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(()),
        }
    }

    fn type_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }
}

#[async_trait]
impl ProviderServer for TestServer {
    async fn get_metadata(&self, _req: GetMetadataRequest) -> Result<GetMetadataResponse> {
        self.enter(rpc::GET_METADATA, None).await?;
        Ok(GetMetadataResponse {
            server_capabilities: self.schema.server_capabilities,
            diagnostics: self.schema.diagnostics.clone(),
            ..GetMetadataResponse::default()
        })
    }

    async fn get_provider_schema(
        &self,
        _req: GetProviderSchemaRequest,
    ) -> Result<GetProviderSchemaResponse> {
        self.enter(rpc::GET_PROVIDER_SCHEMA, None).await?;
        Ok(self.schema.clone())
    }

    async fn get_functions(&self, _req: GetFunctionsRequest) -> Result<GetFunctionsResponse> {
        self.enter(rpc::GET_FUNCTIONS, None).await?;
        Ok(GetFunctionsResponse {
            functions: self.schema.functions.clone(),
            diagnostics: Vec::new(),
        })
    }

    async fn validate_provider_config(
        &self,
        _req: ValidateProviderConfigRequest,
    ) -> Result<ValidateProviderConfigResponse> {
        self.enter(rpc::VALIDATE_PROVIDER_CONFIG, None).await?;
        Ok(self.validate.clone())
    }

    async fn configure_provider(
        &self,
        _req: ConfigureProviderRequest,
    ) -> Result<ConfigureProviderResponse> {
        self.enter(rpc::CONFIGURE_PROVIDER, None).await?;
        Ok(ConfigureProviderResponse {
            diagnostics: self.configure_diagnostics.clone(),
        })
    }

    async fn stop_provider(&self, _req: StopProviderRequest) -> Result<StopProviderResponse> {
        self.enter(rpc::STOP_PROVIDER, None).await?;
        Ok(StopProviderResponse {
            error: self.stop_error.clone(),
        })
    }

    async fn validate_resource_config(
        &self,
        req: ValidateResourceConfigRequest,
    ) -> Result<ValidateResourceConfigResponse> {
        self.enter(rpc::VALIDATE_RESOURCE_CONFIG, Some(&req.type_name))
            .await?;
        Ok(ValidateResourceConfigResponse {
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn upgrade_resource_state(
        &self,
        req: UpgradeResourceStateRequest,
    ) -> Result<UpgradeResourceStateResponse> {
        self.enter(rpc::UPGRADE_RESOURCE_STATE, Some(&req.type_name))
            .await?;
        Ok(UpgradeResourceStateResponse {
            upgraded_state: req
                .raw_state
                .and_then(|raw| raw.json)
                .map(DynamicValue::new),
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn read_resource(&self, req: ReadResourceRequest) -> Result<ReadResourceResponse> {
        self.enter(rpc::READ_RESOURCE, Some(&req.type_name)).await?;
        Ok(ReadResourceResponse {
            new_state: req.current_state,
            diagnostics: self.type_diagnostics(),
            private: req.private,
        })
    }

    async fn plan_resource_change(
        &self,
        req: PlanResourceChangeRequest,
    ) -> Result<PlanResourceChangeResponse> {
        self.enter(rpc::PLAN_RESOURCE_CHANGE, Some(&req.type_name))
            .await?;
        Ok(PlanResourceChangeResponse {
            planned_state: req.proposed_new_state,
            requires_replace: Vec::new(),
            planned_private: req.prior_private,
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn apply_resource_change(
        &self,
        req: ApplyResourceChangeRequest,
    ) -> Result<ApplyResourceChangeResponse> {
        self.enter(rpc::APPLY_RESOURCE_CHANGE, Some(&req.type_name))
            .await?;
        Ok(ApplyResourceChangeResponse {
            new_state: req.planned_state,
            private: req.planned_private,
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn import_resource_state(
        &self,
        req: ImportResourceStateRequest,
    ) -> Result<ImportResourceStateResponse> {
        self.enter(rpc::IMPORT_RESOURCE_STATE, Some(&req.type_name))
            .await?;
        Ok(ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: req.type_name,
                state: Some(DynamicValue::new(serde_json::json!({ "id": req.id }))),
                private: Vec::new(),
            }],
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn move_resource_state(
        &self,
        req: MoveResourceStateRequest,
    ) -> Result<MoveResourceStateResponse> {
        self.enter(rpc::MOVE_RESOURCE_STATE, Some(&req.target_type_name))
            .await?;
        Ok(MoveResourceStateResponse {
            target_state: req
                .source_state
                .and_then(|raw| raw.json)
                .map(DynamicValue::new),
            target_private: req.source_private,
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn validate_data_resource_config(
        &self,
        req: ValidateDataResourceConfigRequest,
    ) -> Result<ValidateDataResourceConfigResponse> {
        self.enter(rpc::VALIDATE_DATA_RESOURCE_CONFIG, Some(&req.type_name))
            .await?;
        Ok(ValidateDataResourceConfigResponse {
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn read_data_source(&self, req: ReadDataSourceRequest) -> Result<ReadDataSourceResponse> {
        self.enter(rpc::READ_DATA_SOURCE, Some(&req.type_name)).await?;
        Ok(ReadDataSourceResponse {
            state: req.config,
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn call_function(&self, req: CallFunctionRequest) -> Result<CallFunctionResponse> {
        self.enter(rpc::CALL_FUNCTION, Some(&req.name)).await?;
        Ok(CallFunctionResponse {
            result: req.arguments.into_iter().next(),
            error: None,
        })
    }

    async fn validate_ephemeral_resource_config(
        &self,
        req: ValidateEphemeralResourceConfigRequest,
    ) -> Result<ValidateEphemeralResourceConfigResponse> {
        self.enter(rpc::VALIDATE_EPHEMERAL_RESOURCE_CONFIG, Some(&req.type_name))
            .await?;
        Ok(ValidateEphemeralResourceConfigResponse {
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn open_ephemeral_resource(
        &self,
        req: OpenEphemeralResourceRequest,
    ) -> Result<OpenEphemeralResourceResponse> {
        self.enter(rpc::OPEN_EPHEMERAL_RESOURCE, Some(&req.type_name))
            .await?;
        Ok(OpenEphemeralResourceResponse {
            result: req.config,
            private: req.type_name.into_bytes(),
            renew_at: None,
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn renew_ephemeral_resource(
        &self,
        req: RenewEphemeralResourceRequest,
    ) -> Result<RenewEphemeralResourceResponse> {
        self.enter(rpc::RENEW_EPHEMERAL_RESOURCE, Some(&req.type_name))
            .await?;
        Ok(RenewEphemeralResourceResponse {
            private: req.private,
            renew_at: None,
            diagnostics: self.type_diagnostics(),
        })
    }

    async fn close_ephemeral_resource(
        &self,
        req: CloseEphemeralResourceRequest,
    ) -> Result<CloseEphemeralResourceResponse> {
        self.enter(rpc::CLOSE_EPHEMERAL_RESOURCE, Some(&req.type_name))
            .await?;
        Ok(CloseEphemeralResourceResponse {
            diagnostics: self.type_diagnostics(),
        })
    }
}
