//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Combine provider servers behind one routing table
#[derive(Parser, Debug)]
#[command(name = "provider-mux")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "PROVIDER_MUX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "PROVIDER_MUX_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "PROVIDER_MUX_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the mux and print its routing table
    Routes {
        /// Schema documents, in precedence order (defaults to the configured backends)
        schemas: Vec<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Check that a set of schemas combine without conflicts
    Check {
        /// Schema documents, in precedence order (defaults to the configured backends)
        schemas: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_accepts_schema_list() {
        let cli = Cli::try_parse_from(["provider-mux", "routes", "a.json", "b.json"]).unwrap();
        match cli.command {
            Command::Routes { schemas, format } => {
                assert_eq!(schemas, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
                assert_eq!(format, "table");
            }
            Command::Check { .. } => panic!("expected routes"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "provider-mux",
            "check",
            "--config",
            "mux.yaml",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("mux.yaml")));
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert!(matches!(cli.command, Command::Check { ref schemas } if schemas.is_empty()));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["provider-mux"]).is_err());
    }
}
