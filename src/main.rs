use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use search_gateway::api::ApiServer;
use search_gateway::config::{Transport, load_dotenv};
use search_gateway::rpc::{RpcHandler, serve_stdio};
use search_gateway::security::{AuthGate, AuthMode};
use search_gateway::tools::ToolDispatcher;
use search_gateway::Config;

/// Search gateway - web search and page extraction tools over MCP
#[derive(Parser)]
#[command(name = "search-gateway", version, about)]
struct Cli {
    /// Transport to serve on (http, stdio)
    #[arg(short, long, env = "MCP_TRANSPORT")]
    transport: Option<String>,

    /// Address to bind the HTTP transport to
    #[arg(long, env = "MCP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MCP_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before parsing so `.env` values reach clap's env fallbacks
    load_dotenv();
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when no -v is given
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,search_gateway=info")),
        1 => EnvFilter::new("info,search_gateway=debug"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // stderr keeps stdout free for the stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(transport) = cli.transport.as_deref() {
        config.server.transport = Transport::parse(transport)?;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    tracing::info!(
        environment = %config.environment,
        transport = %config.server.transport,
        provider = config.search.provider.name(),
        "starting search gateway"
    );

    match config.server.transport {
        Transport::Http => {
            let auth = AuthGate::new(config.server.api_key.clone());
            if auth.mode() == AuthMode::Open {
                if config.is_production() {
                    tracing::error!("MCP_API_KEY not set in production - tools are callable without authentication");
                } else {
                    tracing::warn!("MCP_API_KEY not set - tools are callable without authentication");
                }
            }
            tracing::info!(auth = %auth.mode(), "auth gate ready");

            let dispatcher = ToolDispatcher::from_config(&config, auth)?;
            let handler = RpcHandler::new(Arc::new(dispatcher), config.server.mask_error_details);
            ApiServer::new(handler, config.server.host.clone(), config.server.port)
                .run()
                .await?;
        }
        Transport::Stdio => {
            // The client spawned this process; the pipe is the trust boundary
            tracing::info!("stdio transport does not use bearer authentication");

            let dispatcher = ToolDispatcher::from_config(&config, AuthGate::open())?;
            let handler = RpcHandler::new(Arc::new(dispatcher), config.server.mask_error_details);
            serve_stdio(handler).await?;
        }
    }

    Ok(())
}
