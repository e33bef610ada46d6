use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::{CliOverrides, load_config, run_onboarding};

#[derive(Parser)]
#[command(name = "confab")]
#[command(about = "confab - conversational session server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display version information
    Version,

    /// Write a starter configuration file
    Init {
        /// Where to write the file (default: ~/.confab/config.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Configuration file (default: ~/.confab/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8888
    #[arg(long)]
    pub listen: Option<String>,

    /// sqlx database URL, e.g. sqlite://confab.db?mode=rwc
    #[arg(long)]
    pub database: Option<String>,

    /// Model requested from the completion endpoint
    #[arg(long)]
    pub model: Option<String>,
}

impl From<ServeArgs> for CliOverrides {
    fn from(args: ServeArgs) -> Self {
        CliOverrides {
            config_path: args.config,
            listen: args.listen,
            database_url: args.database,
            model: args.model,
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Version) => {
            print_version();
            Ok(())
        }
        Some(Commands::Init { config, force }) => {
            let path = run_onboarding(config, force)?;
            println!("Configuration written to {}", path.display());
            println!("Set CONFAB_API_KEY (or provider.api_key in that file) before running `confab serve`.");
            Ok(())
        }
        Some(Commands::Serve(args)) => {
            let config = load_config(&args.into())?;
            crate::gateway::run_server(&config).await
        }
        None => {
            print_help();
            Ok(())
        }
    }
}

/// Pulls the command name out of clap's "unrecognized subcommand 'x'" error
pub fn extract_command_from_error(error_msg: &str) -> String {
    if let Some(start) = error_msg.find('\'') {
        if let Some(end) = error_msg[start + 1..].find('\'') {
            return error_msg[start + 1..start + 1 + end].to_string();
        }
    }
    "unknown".to_string()
}

fn print_version() {
    println!("confab {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    println!("confab - conversational session server");
    println!();
    println!("Usage: confab [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  serve    Start the HTTP server");
    println!("  init     Write a starter configuration file");
    println!("  version  Display version information");
    println!("  help     Print this message or the help of the given subcommand(s)");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Enable debug logging");
    println!("  -V, --version  Print version");
    println!("  -h, --help     Print help");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "confab",
            "serve",
            "--listen",
            "0.0.0.0:9000",
            "--database",
            "sqlite::memory:",
            "--model",
            "other-model",
        ])
        .unwrap();

        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        let overrides: CliOverrides = args.into();
        assert_eq!(overrides.listen.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(overrides.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(overrides.model.as_deref(), Some("other-model"));
        assert!(overrides.config_path.is_none());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["confab", "serve", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_init_flags() {
        let cli = Cli::try_parse_from(["confab", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Init {
                config: None,
                force: true
            })
        ));
    }

    #[test]
    fn test_extract_command_from_error() {
        let msg = "error: unrecognized subcommand 'foo_bar'";
        assert_eq!(extract_command_from_error(msg), "foo_bar");
        assert_eq!(extract_command_from_error("no quotes here"), "unknown");
    }
}
