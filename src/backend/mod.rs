//! Backend management
//!
//! A backend is any [`ProviderServer`]. The mux only ever talks to backends
//! through this trait. It wraps each one in a [`BackendHandle`] that carries
//! the backend's ordinal and its schema surface, discovered once at
//! construction.

mod schema_file;

pub use schema_file::SchemaFileBackend;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::mux::Namespace;
use crate::protocol::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, CallFunctionRequest,
    CallFunctionResponse, CloseEphemeralResourceRequest, CloseEphemeralResourceResponse,
    ConfigureProviderRequest, ConfigureProviderResponse, GetFunctionsRequest,
    GetFunctionsResponse, GetMetadataRequest, GetMetadataResponse, GetProviderSchemaRequest,
    GetProviderSchemaResponse, ImportResourceStateRequest, ImportResourceStateResponse,
    MoveResourceStateRequest, MoveResourceStateResponse, OpenEphemeralResourceRequest,
    OpenEphemeralResourceResponse, PlanResourceChangeRequest, PlanResourceChangeResponse,
    ReadDataSourceRequest, ReadDataSourceResponse, ReadResourceRequest, ReadResourceResponse,
    RenewEphemeralResourceRequest, RenewEphemeralResourceResponse, StopProviderRequest,
    StopProviderResponse, UpgradeResourceStateRequest, UpgradeResourceStateResponse,
    ValidateDataResourceConfigRequest, ValidateDataResourceConfigResponse,
    ValidateEphemeralResourceConfigRequest, ValidateEphemeralResourceConfigResponse,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse, rpc,
};
use crate::{Error, Result};

// ============================================================================
// ProviderServer trait
// ============================================================================

/// A server implementing the provider protocol.
///
/// `Err` means the server failed to process the request at all (transport or
/// protocol failure). Problems the server understood are reported as
/// diagnostics inside an `Ok` response.
///
/// Optional operations (metadata, functions, state moves, ephemeral
/// resources) default to [`Error::Unimplemented`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be
/// stored in `Arc<dyn ProviderServer>` and called concurrently.
#[async_trait]
pub trait ProviderServer: Send + Sync + 'static {
    /// Return the names of everything the server declares.
    async fn get_metadata(&self, _req: GetMetadataRequest) -> Result<GetMetadataResponse> {
        Err(Error::Unimplemented(rpc::GET_METADATA.to_string()))
    }

    /// Return the full declared schema surface.
    async fn get_provider_schema(
        &self,
        req: GetProviderSchemaRequest,
    ) -> Result<GetProviderSchemaResponse>;

    /// Return the declared function signatures.
    async fn get_functions(&self, _req: GetFunctionsRequest) -> Result<GetFunctionsResponse> {
        Err(Error::Unimplemented(rpc::GET_FUNCTIONS.to_string()))
    }

    /// Validate provider configuration.
    async fn validate_provider_config(
        &self,
        req: ValidateProviderConfigRequest,
    ) -> Result<ValidateProviderConfigResponse>;

    /// Configure the provider.
    async fn configure_provider(
        &self,
        req: ConfigureProviderRequest,
    ) -> Result<ConfigureProviderResponse>;

    /// Stop the provider, cancelling its in-flight work.
    async fn stop_provider(&self, req: StopProviderRequest) -> Result<StopProviderResponse>;

    /// Validate resource configuration.
    async fn validate_resource_config(
        &self,
        req: ValidateResourceConfigRequest,
    ) -> Result<ValidateResourceConfigResponse>;

    /// Upgrade stored resource state to the current schema version.
    async fn upgrade_resource_state(
        &self,
        req: UpgradeResourceStateRequest,
    ) -> Result<UpgradeResourceStateResponse>;

    /// Refresh resource state.
    async fn read_resource(&self, req: ReadResourceRequest) -> Result<ReadResourceResponse>;

    /// Plan a resource change.
    async fn plan_resource_change(
        &self,
        req: PlanResourceChangeRequest,
    ) -> Result<PlanResourceChangeResponse>;

    /// Apply a planned resource change.
    async fn apply_resource_change(
        &self,
        req: ApplyResourceChangeRequest,
    ) -> Result<ApplyResourceChangeResponse>;

    /// Import an existing resource.
    async fn import_resource_state(
        &self,
        req: ImportResourceStateRequest,
    ) -> Result<ImportResourceStateResponse>;

    /// Move state from another resource type into one of this server's types.
    async fn move_resource_state(
        &self,
        _req: MoveResourceStateRequest,
    ) -> Result<MoveResourceStateResponse> {
        Err(Error::Unimplemented(rpc::MOVE_RESOURCE_STATE.to_string()))
    }

    /// Validate data source configuration.
    async fn validate_data_resource_config(
        &self,
        req: ValidateDataResourceConfigRequest,
    ) -> Result<ValidateDataResourceConfigResponse>;

    /// Read a data source.
    async fn read_data_source(&self, req: ReadDataSourceRequest) -> Result<ReadDataSourceResponse>;

    /// Call a provider-defined function.
    async fn call_function(&self, _req: CallFunctionRequest) -> Result<CallFunctionResponse> {
        Err(Error::Unimplemented(rpc::CALL_FUNCTION.to_string()))
    }

    /// Validate ephemeral resource configuration.
    async fn validate_ephemeral_resource_config(
        &self,
        _req: ValidateEphemeralResourceConfigRequest,
    ) -> Result<ValidateEphemeralResourceConfigResponse> {
        Err(Error::Unimplemented(
            rpc::VALIDATE_EPHEMERAL_RESOURCE_CONFIG.to_string(),
        ))
    }

    /// Open an ephemeral resource.
    async fn open_ephemeral_resource(
        &self,
        _req: OpenEphemeralResourceRequest,
    ) -> Result<OpenEphemeralResourceResponse> {
        Err(Error::Unimplemented(rpc::OPEN_EPHEMERAL_RESOURCE.to_string()))
    }

    /// Renew an ephemeral resource.
    async fn renew_ephemeral_resource(
        &self,
        _req: RenewEphemeralResourceRequest,
    ) -> Result<RenewEphemeralResourceResponse> {
        Err(Error::Unimplemented(rpc::RENEW_EPHEMERAL_RESOURCE.to_string()))
    }

    /// Close an ephemeral resource.
    async fn close_ephemeral_resource(
        &self,
        _req: CloseEphemeralResourceRequest,
    ) -> Result<CloseEphemeralResourceResponse> {
        Err(Error::Unimplemented(rpc::CLOSE_EPHEMERAL_RESOURCE.to_string()))
    }
}

// ============================================================================
// BackendHandle
// ============================================================================

/// Ordinal position of a backend in the list the mux was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(usize);

impl BackendId {
    /// Create an id from a zero-based position
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Zero-based position
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend {}", self.0)
    }
}

/// One backend plus its cached schema surface.
///
/// The surface is stored exactly as the backend returned it and never
/// changes afterwards.
#[derive(Clone)]
pub struct BackendHandle {
    id: BackendId,
    server: Arc<dyn ProviderServer>,
    schema: GetProviderSchemaResponse,
}

impl BackendHandle {
    /// Wrap a server whose schema surface is already known.
    #[must_use]
    pub fn new(
        id: BackendId,
        server: Arc<dyn ProviderServer>,
        schema: GetProviderSchemaResponse,
    ) -> Self {
        Self { id, server, schema }
    }

    /// Call the server's schema discovery once and cache the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendDiscoveryFailed`] if the call fails or the
    /// response carries error diagnostics.
    #[tracing::instrument(skip_all, fields(backend = %id))]
    pub async fn discover(id: BackendId, server: Arc<dyn ProviderServer>) -> Result<Self> {
        let schema = server
            .get_provider_schema(GetProviderSchemaRequest::default())
            .await
            .map_err(|e| {
                warn!(backend = %id, error = %e, "Schema discovery failed");
                Error::BackendDiscoveryFailed {
                    backend: id,
                    source: Box::new(e),
                }
            })?;

        let errors: Vec<&str> = schema
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.summary.as_str())
            .collect();
        if !errors.is_empty() {
            warn!(backend = %id, errors = errors.len(), "Schema discovery returned errors");
            return Err(Error::BackendDiscoveryFailed {
                backend: id,
                source: Box::new(Error::Protocol(errors.join("; "))),
            });
        }

        debug!(
            backend = %id,
            resources = schema.resource_schemas.len(),
            data_sources = schema.data_source_schemas.len(),
            functions = schema.functions.len(),
            ephemeral_resources = schema.ephemeral_resource_schemas.len(),
            "Discovered backend schema"
        );

        Ok(Self::new(id, server, schema))
    }

    /// Ordinal of this backend
    #[must_use]
    pub fn id(&self) -> BackendId {
        self.id
    }

    /// The underlying server
    #[must_use]
    pub fn server(&self) -> &dyn ProviderServer {
        self.server.as_ref()
    }

    /// Cached schema surface
    #[must_use]
    pub fn schema(&self) -> &GetProviderSchemaResponse {
        &self.schema
    }

    /// Type names this backend declares in `namespace`, in sorted order
    pub fn declared_names(&self, namespace: Namespace) -> Box<dyn Iterator<Item = &str> + '_> {
        match namespace {
            Namespace::Resource => Box::new(self.schema.resource_schemas.keys().map(String::as_str)),
            Namespace::DataSource => {
                Box::new(self.schema.data_source_schemas.keys().map(String::as_str))
            }
            Namespace::Function => Box::new(self.schema.functions.keys().map(String::as_str)),
            Namespace::EphemeralResource => Box::new(
                self.schema
                    .ephemeral_resource_schemas
                    .keys()
                    .map(String::as_str),
            ),
        }
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("id", &self.id)
            .field("resources", &self.schema.resource_schemas.len())
            .field("data_sources", &self.schema.data_source_schemas.len())
            .field("functions", &self.schema.functions.len())
            .field(
                "ephemeral_resources",
                &self.schema.ephemeral_resource_schemas.len(),
            )
            .finish_non_exhaustive()
    }
}
