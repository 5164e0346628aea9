//! Error types for the provider mux

use std::io;

use thiserror::Error;

use crate::backend::BackendId;
use crate::mux::Namespace;
use crate::protocol::Diagnostic;

/// Result type alias for the provider mux
pub type Result<T> = std::result::Result<T, Error>;

/// Provider mux errors
#[derive(Error, Debug)]
pub enum Error {
    /// Two backends declared the same type name in one namespace
    #[error("{namespace} type {type_name:?} is declared by both {first} and {second}")]
    DuplicateTypeClaim {
        /// Namespace of the conflicting name
        namespace: Namespace,
        /// Conflicting type name
        type_name: String,
        /// Backend that claimed the name first
        first: BackendId,
        /// Backend that claimed it again
        second: BackendId,
    },

    /// A backend's schema discovery failed
    #[error("schema discovery failed on {backend}: {source}")]
    BackendDiscoveryFailed {
        /// Failing backend
        backend: BackendId,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A type-scoped call named a type no backend declared
    #[error("{namespace} type {type_name:?} isn't supported by any backend")]
    UnroutableType {
        /// Namespace that was searched
        namespace: Namespace,
        /// Requested type name
        type_name: String,
    },

    /// A backend failed to process a fan-out call
    #[error("{rpc} failed on {backend}: {source}")]
    BackendCallFailed {
        /// RPC name
        rpc: &'static str,
        /// Failing backend
        backend: BackendId,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// More than one backend populated a single-valued response field
    #[error(
        "got a {rpc} {field} response from multiple backends ({}), not sure which to use",
        join_backends(.backends)
    )]
    AmbiguousSingleton {
        /// RPC name
        rpc: &'static str,
        /// Conflicting field
        field: &'static str,
        /// Every backend that populated the field
        backends: Vec<BackendId>,
        /// Diagnostics merged from all backends before the conflict was raised
        diagnostics: Vec<Diagnostic>,
    },

    /// The call was cancelled
    #[error("Call cancelled")]
    Cancelled,

    /// Backend does not implement the RPC
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The mux could not be constructed
    Construction,
    /// A type-scoped call could not be routed
    Routing,
    /// A fan-out call could not be merged
    FanOut,
    /// The call was cancelled
    Cancelled,
    /// Error raised by a backend or by local plumbing
    Other,
}

impl Error {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateTypeClaim { .. } | Self::BackendDiscoveryFailed { .. } => {
                ErrorKind::Construction
            }
            Self::UnroutableType { .. } => ErrorKind::Routing,
            Self::BackendCallFailed { .. } | Self::AmbiguousSingleton { .. } => ErrorKind::FanOut,
            Self::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Other,
        }
    }

    /// Returns `true` if this error, or the backend error it wraps, is a cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::BackendCallFailed { source, .. } | Self::BackendDiscoveryFailed { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

fn join_backends(backends: &[BackendId]) -> String {
    backends
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
