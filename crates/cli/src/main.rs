use clap::Parser;
use dnsreplay_domain::{CliOverrides, SendAs, TimingMode};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod bootstrap;
mod di;
mod replay;

#[derive(Parser)]
#[command(name = "dnsreplay")]
#[command(version)]
#[command(about = "dnsreplay - Replays captured DNS queries against a target server")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Target host name or address
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Target port or service name
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<String>,

    /// Concurrent connections per client pool
    #[arg(short = 'm', long)]
    max_clients: Option<usize>,

    /// Transport to send with (original, udp, tcp)
    #[arg(long, value_name = "TRANSPORT")]
    send_as: Option<SendAs>,

    /// Count a query as done as soon as it is written
    #[arg(long)]
    skip_reply: bool,

    /// Timing mode (ignore, keep, increase=NANOS, reduce=NANOS, multiply=FACTOR)
    #[arg(long, value_name = "MODE")]
    timing: Option<TimingMode>,

    /// Number of passes over the inputs
    #[arg(short = 'i', long)]
    iterations: Option<u64>,

    /// Replay the inputs until interrupted
    #[arg(short = 'l', long = "loop")]
    loop_forever: bool,

    /// Process the inputs without sending anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Number of independent client pools
    #[arg(long)]
    client_pools: Option<usize>,

    /// Log level (trace, debug, info, notice, warning, error, critical)
    #[arg(long)]
    log_level: Option<String>,

    /// Capture files with one decoded packet per line
    #[arg(required = true, value_name = "CAPTURE")]
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        target_host: cli.target.clone(),
        target_service: cli.port.clone(),
        max_clients: cli.max_clients,
        send_as: cli.send_as,
        skip_reply: cli.skip_reply,
        timing: cli.timing,
        iterations: cli.iterations,
        loop_forever: cli.loop_forever,
        dry_run: cli.dry_run,
        client_pools: cli.client_pools,
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    info!(target: "core", "Starting dnsreplay v{}", env!("CARGO_PKG_VERSION"));

    let pools = di::ClientPools::new(&config)?;
    let dispatchers = pools.dispatchers();

    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupt(cancel.clone()));

    // pacing sleeps and pool backpressure block the calling thread
    let runner = replay::ReplayRunner::new(config, cli.inputs, cancel);
    let outcome = tokio::task::spawn_blocking(move || runner.run(dispatchers)).await?;

    let engine = tokio::task::spawn_blocking(move || pools.shutdown()).await??;

    let report = outcome?;
    replay::log_summary(&report, &engine);

    Ok(())
}

async fn watch_interrupt(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "core", error = %e, "unable to listen for interrupts");
        return;
    }
    warn!(target: "core", "Interrupted, finishing queued queries");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!(target: "core", "Interrupted again, exiting");
        std::process::exit(130);
    }
}
