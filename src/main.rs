use clap::Parser;
use httprelay::server::builder::RelayServerBuilder;
use tracing_subscriber::EnvFilter;

/// Command line options of the standalone proxy server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TCP port to bind. A random free port is chosen when omitted.
    #[arg(short, long, env = "HTTPRELAY_PORT")]
    port: Option<u16>,

    /// Bind on all interfaces instead of loopback only.
    #[arg(short, long, env = "HTTPRELAY_EXPOSE")]
    expose: bool,

    /// Print one access log line per inbound request.
    #[arg(long, env = "HTTPRELAY_ACCESS_LOG")]
    print_access_log: bool,

    /// Number of forwarded exchanges to keep in memory.
    #[arg(long, env = "HTTPRELAY_JOURNAL_CAPACITY", default_value = "100")]
    journal_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("httprelay=info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!(
        "Starting {} server V{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let server = RelayServerBuilder::new()
        .port_option(args.port)
        .expose(args.expose)
        .print_access_log(args.print_access_log)
        .journal_capacity(args.journal_capacity)
        .build()?;

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };

    server.start_with_signals(None, shutdown).await?;
    Ok(())
}
