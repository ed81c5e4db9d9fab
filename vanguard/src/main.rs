//! Vanguard CLI entry point.
//!
//! Dispatches to the stdio transport (default, for local MCP peers) or the
//! TCP socket server (for remote peers). Configuration comes from the
//! process environment; see [`GatewayConfig::from_env`].

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use vanguard::catalog;
use vanguard::dispatcher::Dispatcher;
use vanguard::transport::{stdio, tcp};
use vanguard_core::auth::Authenticator;
use vanguard_core::client::ApiClient;
use vanguard_core::config::GatewayConfig;
use vanguard_core::limiter::RateLimiter;

/// Vanguard: governed MCP gateway for the Bungie Destiny 2 API.
#[derive(Parser)]
#[command(name = "vanguard", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway on stdio (default).
    Stdio,
    /// Run the gateway as a TCP server for remote connections.
    Serve {
        /// Port to listen on (overrides VANGUARD_LISTEN_PORT).
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vanguard: {e}");
            return 1;
        }
    };

    // A catalog entry without a bound operation is a build mistake; refuse
    // to serve rather than fail the first matching invocation.
    if let Err(e) = catalog::verify_bindings() {
        eprintln!("vanguard: {e}");
        return 1;
    }

    let limiter = Arc::new(RateLimiter::new(config.rate.clone()));
    let auth = match Authenticator::new(config.oauth.clone()) {
        Ok(auth) => Arc::new(auth),
        Err(e) => {
            eprintln!("vanguard: {e}");
            return 1;
        }
    };
    let client = match ApiClient::new(config.api.clone(), limiter, auth) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("vanguard: {e}");
            return 1;
        }
    };

    let result = match cli.command.unwrap_or(Commands::Stdio) {
        Commands::Stdio => {
            let dispatcher = Arc::new(Dispatcher::new(client));
            stdio::run_stdio(dispatcher).await
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.listen_port);
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => tcp::serve(listener, client).await,
                Err(e) => {
                    eprintln!("vanguard: failed to bind port {port}: {e}");
                    return 1;
                }
            }
        }
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "transport failed");
            eprintln!("vanguard: {e}");
            1
        }
    }
}

/// Initialise tracing with stderr output.
///
/// Respects `RUST_LOG`; stdout is reserved for the stdio transport.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
