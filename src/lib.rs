//! Provider Mux Library
//!
//! Combines several provider servers into one. Each backend declares a set
//! of resource, data source, function and ephemeral resource names; the mux
//! routes type-scoped calls to the single backend that declared the name and
//! fans provider-global calls out to every backend, merging the responses.
//!
//! # Features
//!
//! - **Routing table**: built once at construction, duplicate names rejected
//! - **Fan-out**: parallel or sequential, merged in backend order
//! - **Cancellation**: dropping a call or cancelling the mux token aborts in-flight work
//! - **Composable**: [`mux::MuxServer`] is itself a [`backend::ProviderServer`]
//!
//! # Protocol Version
//!
//! Models provider protocol version 6.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod mux;
pub mod protocol;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, ErrorKind, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
    }

    Ok(())
}
