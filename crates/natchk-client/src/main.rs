use clap::Parser;
use natchk_client::classifier;
use natchk_core::endpoint::Endpoint;
use natchk_core::server_list::ServerList;
use natchk_transport::Transport;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Classify the NAT environment of this host by probing a pool of
/// reflector servers.
#[derive(Debug, Parser)]
#[command(name = "natchk-client", version, about)]
struct Args {
    /// Local UDP address to bind, e.g. 0.0.0.0:0
    #[arg(short = 'l', long = "listen-udp")]
    listen_udp: SocketAddr,

    /// Comma-separated, ordered reflector server list, e.g. 198.51.100.1:5000,198.51.100.2:5000
    #[arg(short = 's', long = "servers", value_delimiter = ',')]
    servers: Vec<SocketAddr>,

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

    let servers: Vec<Endpoint> = args.servers.iter().map(|a| Endpoint::new(*a)).collect();
    let server_list = match ServerList::new(servers) {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(error = %e, "invalid server list");
            return ExitCode::FAILURE;
        }
    };

    let transport = match Transport::bind(args.listen_udp) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind UDP socket");
            return ExitCode::FAILURE;
        }
    };

    let verdict = classifier::classify(transport, &server_list).await;
    println!("{verdict}");

    ExitCode::SUCCESS
}
