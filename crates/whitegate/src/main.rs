use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use whitegate_cloud_aws::AwsClientFactory;

#[derive(Parser)]
#[command(name = "whitegate")]
#[command(version, about = "Security-group whitelisting over line-oriented JSON-RPC")]
struct Cli {
    /// Config file path (default: WHITEGATE_CONFIG, ./whitegate.json, then
    /// ~/.config/whitegate/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the protocol over stdin/stdout (default)
    Serve,
    /// Parse the configuration and report what was loaded
    Validate,
    /// Print the tool catalog as JSON
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WHITEGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = whitegate_config::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => whitegate_mcp::run_server(config, Arc::new(AwsClientFactory)).await,
        Commands::Validate => {
            println!("configuration OK");
            println!("  default protocol: {}", config.defaults.protocol);
            println!("  default region:   {}", config.defaults.region);
            println!("  port mappings:    {}", config.port_mappings.len());
            println!("  profiles:         {}", config.credential_profiles.len());
            Ok(())
        }
        Commands::Tools => {
            println!(
                "{}",
                serde_json::to_string_pretty(&whitegate_mcp::schema::tool_catalog())?
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::parse_from(["whitegate"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_parses_validate_with_config() {
        let cli = Cli::parse_from(["whitegate", "validate", "--config", "/tmp/wg.json"]);
        assert!(matches!(cli.command, Some(Commands::Validate)));
        assert_eq!(cli.config.unwrap(), PathBuf::from("/tmp/wg.json"));
    }
}
