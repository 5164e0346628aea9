//! The provider mux: many backends behind one `ProviderServer`
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!   caller ──────▶│        MuxServer         │
//!                 │  (impl ProviderServer)   │
//!                 └─────┬──────────────┬─────┘
//!        type-scoped    │              │   provider-global
//!                       ▼              ▼
//!              ┌──────────────┐  ┌──────────────┐
//!              │ RoutingTable │  │    FanOut    │──▶ Merge
//!              │ name → owner │  │ all backends │
//!              └──────┬───────┘  └──────┬───────┘
//!                     ▼                 ▼
//!               one BackendHandle   every BackendHandle
//! ```
//!
//! The routing table and backend handles are built once by
//! [`MuxServer::new`] and are read-only afterwards, so concurrent calls need
//! no locking.
//!
//! Fan-outs watch a per-generation child of [`MuxOptions::cancellation`].
//! [`MuxServer::cancel_in_flight`] aborts the current generation and starts a
//! fresh one, so the mux stays usable afterwards. Cancelling the options
//! token itself is a shutdown: every later fan-out aborts, except
//! `stop_provider`, which always reaches every backend.

mod fan_out;
mod merge;
mod routing;
mod schema;

pub use fan_out::FanOutMode;
pub use routing::{Namespace, RoutingTable};

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use self::fan_out::FanOut;
use self::merge::Merge;
use crate::backend::{BackendHandle, BackendId, ProviderServer};
use crate::protocol::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, CallFunctionRequest,
    CallFunctionResponse, CloseEphemeralResourceRequest, CloseEphemeralResourceResponse,
    ConfigureProviderRequest, ConfigureProviderResponse, GetFunctionsRequest,
    GetFunctionsResponse, GetMetadataRequest, GetMetadataResponse, GetProviderSchemaRequest,
    GetProviderSchemaResponse, ImportResourceStateRequest, ImportResourceStateResponse,
    MoveResourceStateRequest, MoveResourceStateResponse, OpenEphemeralResourceRequest,
    OpenEphemeralResourceResponse, PROTOCOL_VERSION, PlanResourceChangeRequest,
    PlanResourceChangeResponse, ReadDataSourceRequest, ReadDataSourceResponse, ReadResourceRequest, ReadResourceResponse,
    RenewEphemeralResourceRequest, RenewEphemeralResourceResponse, StopProviderRequest,
    StopProviderResponse, UpgradeResourceStateRequest, UpgradeResourceStateResponse,
    ValidateDataResourceConfigRequest, ValidateDataResourceConfigResponse,
    ValidateEphemeralResourceConfigRequest, ValidateEphemeralResourceConfigResponse,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse, rpc,
};
use crate::{Error, Result};

/// Singleton field of `ValidateProviderConfig`
pub const PREPARED_CONFIG_FIELD: &str = "PreparedConfig";

/// Mux construction options
#[derive(Debug, Clone, Default)]
pub struct MuxOptions {
    /// Scheduling of provider-global calls
    pub fan_out: FanOutMode,
    /// Shutdown token. Once cancelled, every fan-out except `stop_provider`
    /// fails with [`Error::Cancelled`]
    pub cancellation: CancellationToken,
}

/// A single provider server composed from several backends
pub struct MuxServer {
    backends: Vec<BackendHandle>,
    routes: RoutingTable,
    schema: GetProviderSchemaResponse,
    options: MuxOptions,
    in_flight: Mutex<CancellationToken>,
}

impl MuxServer {
    /// Build a mux from backends in precedence order.
    ///
    /// Each backend's schema is discovered exactly once, then the routing
    /// table is built. Either step failing aborts construction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendDiscoveryFailed`] or [`Error::DuplicateTypeClaim`].
    pub async fn new<I>(servers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn ProviderServer>>,
    {
        Self::with_options(servers, MuxOptions::default()).await
    }

    /// Build a mux from backend factories, invoked in order.
    ///
    /// # Errors
    ///
    /// Same as [`MuxServer::new`].
    pub async fn from_factories<I, F>(factories: I, options: MuxOptions) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Arc<dyn ProviderServer>,
    {
        Self::with_options(factories.into_iter().map(|factory| factory()), options).await
    }

    /// Build a mux with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`MuxServer::new`].
    pub async fn with_options<I>(servers: I, options: MuxOptions) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn ProviderServer>>,
    {
        let mut backends = Vec::new();
        for (index, server) in servers.into_iter().enumerate() {
            backends.push(BackendHandle::discover(BackendId::new(index), server).await?);
        }

        let routes = RoutingTable::build(&backends)?;
        let schema = schema::merge_provider_schema(&backends);

        info!(
            protocol_version = PROTOCOL_VERSION,
            backends = backends.len(),
            routes = routes.len(),
            fan_out = ?options.fan_out,
            "Provider mux ready"
        );

        Ok(Self {
            backends,
            routes,
            schema,
            in_flight: Mutex::new(options.cancellation.child_token()),
            options,
        })
    }

    /// The routing table
    #[must_use]
    pub fn routing_table(&self) -> &RoutingTable {
        &self.routes
    }

    /// Number of backends
    #[must_use]
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Shutdown token from [`MuxOptions::cancellation`]
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.options.cancellation
    }

    /// Abort every fan-out currently in flight with [`Error::Cancelled`].
    ///
    /// Calls started afterwards run normally.
    pub fn cancel_in_flight(&self) {
        let fresh = self.options.cancellation.child_token();
        let previous = std::mem::replace(&mut *self.in_flight.lock(), fresh);
        previous.cancel();
        debug!("Cancelled in-flight fan-outs");
    }

    /// Resolve the owning backend of a type-scoped call.
    fn route(&self, rpc: &'static str, namespace: Namespace, type_name: &str) -> Result<&BackendHandle> {
        let id = self.routes.route(namespace, type_name).inspect_err(|e| {
            debug!(rpc, error = %e, "Unroutable call");
        })?;
        let backend = self
            .backends
            .get(id.index())
            .ok_or_else(|| Error::Internal(format!("routing table points at missing {id}")))?;

        debug!(rpc, backend = %id, type_name, "Calling downstream server");
        Ok(backend)
    }

    fn fan_out(&self, rpc: &'static str) -> FanOut<'_> {
        let cancel = self.in_flight.lock().clone();
        FanOut::new(rpc, &self.backends, self.options.fan_out, cancel)
    }
}

impl std::fmt::Debug for MuxServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxServer")
            .field("backends", &self.backends)
            .field("routes", &self.routes.len())
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl ProviderServer for MuxServer {
    // ------------------------------------------------------------------
    // Provider-global: served from the merged schema cache
    // ------------------------------------------------------------------

    async fn get_metadata(&self, _req: GetMetadataRequest) -> Result<GetMetadataResponse> {
        Ok(schema::metadata(&self.schema))
    }

    async fn get_provider_schema(
        &self,
        _req: GetProviderSchemaRequest,
    ) -> Result<GetProviderSchemaResponse> {
        Ok(self.schema.clone())
    }

    async fn get_functions(&self, _req: GetFunctionsRequest) -> Result<GetFunctionsResponse> {
        Ok(schema::functions(&self.schema))
    }

    // ------------------------------------------------------------------
    // Provider-global: fan out
    // ------------------------------------------------------------------

    async fn validate_provider_config(
        &self,
        req: ValidateProviderConfigRequest,
    ) -> Result<ValidateProviderConfigResponse> {
        let responses = self
            .fan_out(rpc::VALIDATE_PROVIDER_CONFIG)
            .invoke(|backend| backend.server().validate_provider_config(req.clone()))
            .await?;

        let mut merge = Merge::new(rpc::VALIDATE_PROVIDER_CONFIG);
        let mut prepared = Vec::with_capacity(responses.len());
        for (id, resp) in responses {
            merge.diagnostics(resp.diagnostics);
            prepared.push((id, resp.prepared_config));
        }
        let prepared_config = merge.singleton(PREPARED_CONFIG_FIELD, prepared);

        Ok(ValidateProviderConfigResponse {
            prepared_config,
            diagnostics: merge.finish()?,
        })
    }

    async fn configure_provider(
        &self,
        req: ConfigureProviderRequest,
    ) -> Result<ConfigureProviderResponse> {
        let responses = self
            .fan_out(rpc::CONFIGURE_PROVIDER)
            .invoke(|backend| backend.server().configure_provider(req.clone()))
            .await?;

        let mut merge = Merge::new(rpc::CONFIGURE_PROVIDER);
        for (_, resp) in responses {
            merge.diagnostics(resp.diagnostics);
        }

        Ok(ConfigureProviderResponse {
            diagnostics: merge.finish()?,
        })
    }

    async fn stop_provider(&self, req: StopProviderRequest) -> Result<StopProviderResponse> {
        // Teardown must reach every backend, even after shutdown was signalled
        let responses = FanOut::new(
            rpc::STOP_PROVIDER,
            &self.backends,
            self.options.fan_out,
            CancellationToken::new(),
        )
        .invoke(|backend| backend.server().stop_provider(req.clone()))
            .await?;

        let errors: Vec<String> = responses
            .into_iter()
            .map(|(_, resp)| resp.error)
            .filter(|e| !e.is_empty())
            .collect();

        Ok(StopProviderResponse {
            error: errors.join("\n"),
        })
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    async fn validate_resource_config(
        &self,
        req: ValidateResourceConfigRequest,
    ) -> Result<ValidateResourceConfigResponse> {
        self.route(rpc::VALIDATE_RESOURCE_CONFIG, Namespace::Resource, &req.type_name)?
            .server()
            .validate_resource_config(req)
            .await
    }

    async fn upgrade_resource_state(
        &self,
        req: UpgradeResourceStateRequest,
    ) -> Result<UpgradeResourceStateResponse> {
        self.route(rpc::UPGRADE_RESOURCE_STATE, Namespace::Resource, &req.type_name)?
            .server()
            .upgrade_resource_state(req)
            .await
    }

    async fn read_resource(&self, req: ReadResourceRequest) -> Result<ReadResourceResponse> {
        self.route(rpc::READ_RESOURCE, Namespace::Resource, &req.type_name)?
            .server()
            .read_resource(req)
            .await
    }

    async fn plan_resource_change(
        &self,
        req: PlanResourceChangeRequest,
    ) -> Result<PlanResourceChangeResponse> {
        self.route(rpc::PLAN_RESOURCE_CHANGE, Namespace::Resource, &req.type_name)?
            .server()
            .plan_resource_change(req)
            .await
    }

    async fn apply_resource_change(
        &self,
        req: ApplyResourceChangeRequest,
    ) -> Result<ApplyResourceChangeResponse> {
        self.route(rpc::APPLY_RESOURCE_CHANGE, Namespace::Resource, &req.type_name)?
            .server()
            .apply_resource_change(req)
            .await
    }

    async fn import_resource_state(
        &self,
        req: ImportResourceStateRequest,
    ) -> Result<ImportResourceStateResponse> {
        self.route(rpc::IMPORT_RESOURCE_STATE, Namespace::Resource, &req.type_name)?
            .server()
            .import_resource_state(req)
            .await
    }

    async fn move_resource_state(
        &self,
        req: MoveResourceStateRequest,
    ) -> Result<MoveResourceStateResponse> {
        self.route(rpc::MOVE_RESOURCE_STATE, Namespace::Resource, &req.target_type_name)?
            .server()
            .move_resource_state(req)
            .await
    }

    // ------------------------------------------------------------------
    // Data sources
    // ------------------------------------------------------------------

    async fn validate_data_resource_config(
        &self,
        req: ValidateDataResourceConfigRequest,
    ) -> Result<ValidateDataResourceConfigResponse> {
        self.route(rpc::VALIDATE_DATA_RESOURCE_CONFIG, Namespace::DataSource, &req.type_name)?
            .server()
            .validate_data_resource_config(req)
            .await
    }

    async fn read_data_source(&self, req: ReadDataSourceRequest) -> Result<ReadDataSourceResponse> {
        self.route(rpc::READ_DATA_SOURCE, Namespace::DataSource, &req.type_name)?
            .server()
            .read_data_source(req)
            .await
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    async fn call_function(&self, req: CallFunctionRequest) -> Result<CallFunctionResponse> {
        self.route(rpc::CALL_FUNCTION, Namespace::Function, &req.name)?
            .server()
            .call_function(req)
            .await
    }

    // ------------------------------------------------------------------
    // Ephemeral resources
    // ------------------------------------------------------------------

    async fn validate_ephemeral_resource_config(
        &self,
        req: ValidateEphemeralResourceConfigRequest,
    ) -> Result<ValidateEphemeralResourceConfigResponse> {
        self.route(
            rpc::VALIDATE_EPHEMERAL_RESOURCE_CONFIG,
            Namespace::EphemeralResource,
            &req.type_name,
        )?
        .server()
        .validate_ephemeral_resource_config(req)
        .await
    }

    async fn open_ephemeral_resource(
        &self,
        req: OpenEphemeralResourceRequest,
    ) -> Result<OpenEphemeralResourceResponse> {
        self.route(rpc::OPEN_EPHEMERAL_RESOURCE, Namespace::EphemeralResource, &req.type_name)?
            .server()
            .open_ephemeral_resource(req)
            .await
    }

    async fn renew_ephemeral_resource(
        &self,
        req: RenewEphemeralResourceRequest,
    ) -> Result<RenewEphemeralResourceResponse> {
        self.route(rpc::RENEW_EPHEMERAL_RESOURCE, Namespace::EphemeralResource, &req.type_name)?
            .server()
            .renew_ephemeral_resource(req)
            .await
    }

    async fn close_ephemeral_resource(
        &self,
        req: CloseEphemeralResourceRequest,
    ) -> Result<CloseEphemeralResourceResponse> {
        self.route(rpc::CLOSE_EPHEMERAL_RESOURCE, Namespace::EphemeralResource, &req.type_name)?
            .server()
            .close_ephemeral_resource(req)
            .await
    }
}
