//! Provider Mux - combine provider servers behind one routing table

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing::{debug, error};

use provider_mux::{
    Error, Result,
    backend::{ProviderServer, SchemaFileBackend},
    cli::{Cli, Command},
    config::Config,
    mux::{MuxServer, Namespace},
    protocol::{GetProviderSchemaRequest, PROTOCOL_VERSION, has_errors},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Routes { schemas, format } => run_routes(&config, schemas, &format).await,
        Command::Check { schemas } => run_check(&config, schemas).await,
    }
}

/// Load the schema backends named on the command line, or the configured ones.
fn load_backends(config: &Config, schemas: Vec<PathBuf>) -> Result<Vec<SchemaFileBackend>> {
    let named: Vec<(String, PathBuf)> = if schemas.is_empty() {
        config
            .enabled_backends()
            .map(|b| (b.name.clone(), b.schema.clone()))
            .collect()
    } else {
        schemas
            .into_iter()
            .map(|p| {
                let name = p
                    .file_stem()
                    .map_or_else(|| p.display().to_string(), |s| s.to_string_lossy().into_owned());
                (name, p)
            })
            .collect()
    };

    if named.is_empty() {
        return Err(Error::Config(
            "No schemas given and no backends configured".to_string(),
        ));
    }

    named
        .into_iter()
        .map(|(name, path)| {
            debug!(backend = %name, path = %path.display(), "Loading schema");
            SchemaFileBackend::load(name, &path)
        })
        .collect()
}

async fn build_mux(config: &Config, backends: &[SchemaFileBackend]) -> Result<MuxServer> {
    let servers = backends
        .iter()
        .map(|b| Arc::new(b.clone()) as Arc<dyn ProviderServer>);
    MuxServer::with_options(servers, config.mux_options()).await
}

/// Print the routing table
async fn run_routes(config: &Config, schemas: Vec<PathBuf>, format: &str) -> ExitCode {
    let backends = match load_backends(config, schemas) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let mux = match build_mux(config, &backends).await {
        Ok(mux) => mux,
        Err(e) => {
            error!(error = %e, "Mux construction failed");
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let table = mux.routing_table();
    let owner_name = |index: usize| backends.get(index).map_or("?", SchemaFileBackend::name);

    if format == "json" {
        let routes: Vec<_> = Namespace::ALL
            .iter()
            .flat_map(|ns| {
                table.entries(*ns).into_iter().map(move |(name, id)| {
                    json!({
                        "namespace": ns.as_str(),
                        "type_name": name,
                        "backend": id.index(),
                        "backend_name": owner_name(id.index()),
                    })
                })
            })
            .collect();
        match serde_json::to_string_pretty(&routes) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("❌ Failed to serialize to JSON: {e}");
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("{} route(s) across {} backend(s):\n", table.len(), mux.backend_count());
    for ns in Namespace::ALL {
        let entries = table.entries(ns);
        if entries.is_empty() {
            continue;
        }
        println!("{ns}:");
        for (name, id) in entries {
            println!("  {name:<40} → {} ({id})", owner_name(id.index()));
        }
        println!();
    }

    ExitCode::SUCCESS
}

/// Check that the schemas combine
async fn run_check(config: &Config, schemas: Vec<PathBuf>) -> ExitCode {
    let backends = match load_backends(config, schemas) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    match build_mux(config, &backends).await {
        Ok(mux) => {
            let schema = match mux
                .get_provider_schema(GetProviderSchemaRequest::default())
                .await
            {
                Ok(schema) => schema,
                Err(e) => {
                    eprintln!("❌ {e}");
                    return ExitCode::FAILURE;
                }
            };

            for diag in &schema.diagnostics {
                println!("{:?}: {} {}", diag.severity, diag.summary, diag.detail);
            }
            if has_errors(&schema.diagnostics) {
                eprintln!("❌ Schemas combine with errors");
                return ExitCode::FAILURE;
            }

            println!(
                "✅ {} backend(s) combine into {} route(s) (protocol v{PROTOCOL_VERSION})",
                mux.backend_count(),
                mux.routing_table().len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
