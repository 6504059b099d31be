/// RogueDB command-line tools
///
/// Mints bearer tokens from a service-account file and applies schema sets.
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rogue_client::{Client, ClientConfig, OperandCodec, SchemaSet};
use rogue_core::{CredentialManager, CredentialPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rogue")]
#[command(about = "RogueDB client tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a freshly minted bearer token
    Token {
        /// Service-account credential file
        #[arg(short, long, env = "ROGUE_CREDENTIALS")]
        credentials: PathBuf,
        /// Print the decoded claims as JSON instead of the token
        #[arg(long)]
        claims: bool,
        /// Token lifetime in seconds
        #[arg(long, default_value = "3600")]
        validity: u64,
    },
    /// Replace the server's schema set with the given files, in order
    Subscribe {
        /// Store endpoint, e.g. https://c-0123.roguedb.dev
        #[arg(short, long, env = "ROGUE_ENDPOINT")]
        endpoint: String,
        /// Service-account credential file
        #[arg(short, long, env = "ROGUE_CREDENTIALS")]
        credentials: PathBuf,
        /// Use the REST endpoints instead of gRPC
        #[arg(long)]
        rest: bool,
        /// API key copied into the request
        #[arg(long, env = "ROGUE_API_KEY", default_value = "")]
        api_key: String,
        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
        /// Schema definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Policy for `rogue token`; the renewal margin shrinks with short lifetimes
fn token_policy(validity: u64) -> Result<CredentialPolicy> {
    if validity == 0 {
        bail!("--validity must be at least 1 second");
    }
    let default_margin = CredentialPolicy::default().renewal_margin.as_secs();
    let policy = CredentialPolicy::new()
        .with_validity(Duration::from_secs(validity))
        .with_renewal_margin(Duration::from_secs(default_margin.min(validity / 2)));
    policy.validate().map_err(anyhow::Error::msg)?;
    Ok(policy)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Token {
            credentials,
            claims,
            validity,
        } => {
            let policy = token_policy(validity)?;
            let manager = CredentialManager::new().with_policy(policy);
            let credential = manager
                .mint(&credentials)
                .with_context(|| format!("Failed to mint token from {}", credentials.display()))?;

            if claims {
                let json = serde_json::to_string_pretty(&credential.claims()).context("Failed to encode claims")?;
                println!("{}", json);
            } else {
                println!("{}", credential.token().as_str());
            }
        }

        Commands::Subscribe {
            endpoint,
            credentials,
            rest,
            api_key,
            timeout,
            files,
        } => {
            let mut schemas = SchemaSet::new();
            for file in &files {
                let text = std::fs::read_to_string(file)
                    .with_context(|| format!("Failed to read schema {}", file.display()))?;
                schemas.push(text);
            }

            let credential = CredentialManager::new()
                .mint(&credentials)
                .with_context(|| format!("Failed to mint token from {}", credentials.display()))?;

            let mut config = ClientConfig::new()
                .with_endpoint(endpoint)
                .with_api_key(api_key)
                .with_session_timeout(Duration::from_secs(timeout));
            if rest {
                config = config.with_rest();
            }

            let client = Client::connect(config, OperandCodec::new())
                .await
                .context("Failed to connect")?;
            client
                .subscribe(schemas, &credential)
                .await
                .context("Schema set was not applied")?;

            info!(files = files.len(), transport = client.transport_name(), "Schema set applied");
            println!("Applied {} schema file(s)", files.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subscribe_requires_files() {
        let parsed = Cli::try_parse_from([
            "rogue",
            "subscribe",
            "--endpoint",
            "http://localhost:50051",
            "--credentials",
            "sa.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_token_policy_scales_margin() {
        let policy = token_policy(3600).unwrap();
        assert_eq!(policy.renewal_margin, Duration::from_secs(60));

        let policy = token_policy(60).unwrap();
        assert_eq!(policy.validity, Duration::from_secs(60));
        assert_eq!(policy.renewal_margin, Duration::from_secs(30));

        let policy = token_policy(1).unwrap();
        assert_eq!(policy.renewal_margin, Duration::ZERO);
    }

    #[test]
    fn test_token_policy_rejects_zero_validity() {
        let err = token_policy(0).unwrap_err();
        assert!(err.to_string().contains("--validity"));
    }

    #[test]
    fn test_token_defaults() {
        let cli = Cli::try_parse_from(["rogue", "token", "--credentials", "sa.json"]).unwrap();
        match cli.command {
            Commands::Token { claims, validity, .. } => {
                assert!(!claims);
                assert_eq!(validity, 3600);
            }
            _ => panic!("expected token command"),
        }
    }
}
