use clap::Parser;
use natchk_core::endpoint::Endpoint;
use natchk_server::reflector::Reflector;
use natchk_server::registry::SiblingRegistry;
use natchk_transport::Transport;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Host one or more cooperating NAT-classification reflectors.
#[derive(Debug, Parser)]
#[command(name = "natchk-server", version, about)]
struct Args {
    /// Comma-separated UDP addresses to bind, e.g. 0.0.0.0:5000,0.0.0.0:5001
    #[arg(short = 'l', long = "listen-udp", value_delimiter = ',')]
    listen_udp: Vec<SocketAddr>,

    /// Raise the default log level.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.listen_udp.is_empty() {
        tracing::error!("at least one --listen-udp address is required");
        return ExitCode::FAILURE;
    }

    let mut transports = Vec::new();
    for addr in &args.listen_udp {
        match Transport::bind(*addr) {
            Ok(t) => {
                tracing::info!(bind = %t.local_addr(), "reflector listening");
                transports.push((Endpoint::new(t.local_addr()), t));
            }
            Err(e) => {
                tracing::error!(%addr, error = %e, "failed to bind UDP socket");
                return ExitCode::FAILURE;
            }
        }
    }

    let registry = Arc::new(SiblingRegistry::new(transports.clone()));
    for (self_addr, transport) in &transports {
        let reflector = Arc::new(Reflector::new(*self_addr, transport.clone(), registry.clone()));
        transport.subscribe(reflector);
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl-c, shutting down anyway"),
    }

    for (_, transport) in &transports {
        transport.shutdown().await;
    }

    ExitCode::SUCCESS
}
