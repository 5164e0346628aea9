//! Provider protocol types (version 6)

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// Provider protocol major version
pub const PROTOCOL_VERSION: u32 = 6;

/// RPC names, used in logs and error messages
pub mod rpc {
    /// GetMetadata
    pub const GET_METADATA: &str = "GetMetadata";
    /// GetProviderSchema
    pub const GET_PROVIDER_SCHEMA: &str = "GetProviderSchema";
    /// GetFunctions
    pub const GET_FUNCTIONS: &str = "GetFunctions";
    /// ValidateProviderConfig
    pub const VALIDATE_PROVIDER_CONFIG: &str = "ValidateProviderConfig";
    /// ConfigureProvider
    pub const CONFIGURE_PROVIDER: &str = "ConfigureProvider";
    /// StopProvider
    pub const STOP_PROVIDER: &str = "StopProvider";
    /// ValidateResourceConfig
    pub const VALIDATE_RESOURCE_CONFIG: &str = "ValidateResourceConfig";
    /// UpgradeResourceState
    pub const UPGRADE_RESOURCE_STATE: &str = "UpgradeResourceState";
    /// ReadResource
    pub const READ_RESOURCE: &str = "ReadResource";
    /// PlanResourceChange
    pub const PLAN_RESOURCE_CHANGE: &str = "PlanResourceChange";
    /// ApplyResourceChange
    pub const APPLY_RESOURCE_CHANGE: &str = "ApplyResourceChange";
    /// ImportResourceState
    pub const IMPORT_RESOURCE_STATE: &str = "ImportResourceState";
    /// MoveResourceState
    pub const MOVE_RESOURCE_STATE: &str = "MoveResourceState";
    /// ValidateDataResourceConfig
    pub const VALIDATE_DATA_RESOURCE_CONFIG: &str = "ValidateDataResourceConfig";
    /// ReadDataSource
    pub const READ_DATA_SOURCE: &str = "ReadDataSource";
    /// CallFunction
    pub const CALL_FUNCTION: &str = "CallFunction";
    /// ValidateEphemeralResourceConfig
    pub const VALIDATE_EPHEMERAL_RESOURCE_CONFIG: &str = "ValidateEphemeralResourceConfig";
    /// OpenEphemeralResource
    pub const OPEN_EPHEMERAL_RESOURCE: &str = "OpenEphemeralResource";
    /// RenewEphemeralResource
    pub const RENEW_EPHEMERAL_RESOURCE: &str = "RenewEphemeralResource";
    /// CloseEphemeralResource
    pub const CLOSE_EPHEMERAL_RESOURCE: &str = "CloseEphemeralResource";
}
