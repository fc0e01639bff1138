use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use jobslot::config::{ControlConfig, SchedulerConfig};
use jobslot::control::{run_control, ControlState};
use jobslot::node::Node;
use jobslot::scheduler::SchedulerEvent;
use jobslot::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "jobslot")]
#[command(version)]
#[command(about = "Continuously assigns jobs to a fixed pool of workers")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP control surface; GET /start begins job assignment
    Serve(ServeArgs),

    /// Start job assignment immediately and print events until interrupted
    Run(RunArgs),
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(clap::Args, Debug)]
struct PoolArgs {
    /// Number of worker slots
    #[arg(long, default_value = "4")]
    pool_size: usize,

    /// Delay between dispatch attempts, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Duration of each simulated job, in milliseconds
    #[arg(long, default_value = "5000")]
    job_duration_ms: u64,
}

impl PoolArgs {
    fn to_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.pool_size)
            .with_poll_interval_ms(self.poll_interval_ms)
            .with_job_duration_ms(self.job_duration_ms)
    }
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Address to bind the control server to
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port for the control server
    #[arg(long)]
    port: Option<u16>,

    #[command(flatten)]
    pool: PoolArgs,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Stop after this many jobs have completed
    #[arg(long)]
    max_jobs: Option<u64>,

    /// Event output format
    #[arg(long, short = 'o', default_value = "text")]
    output: OutputFormat,

    #[command(flatten)]
    pool: PoolArgs,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

// =============================================================================
// Commands
// =============================================================================

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let defaults = ControlConfig::default();
    let control = ControlConfig {
        listen_addr: SocketAddr::new(
            args.host.unwrap_or(defaults.listen_addr.ip()),
            args.port.unwrap_or(defaults.listen_addr.port()),
        ),
    };

    let node = Arc::new(Node::new(args.pool.to_config())?);
    let shutdown = install_shutdown_handler();

    tracing::info!(
        listen_addr = %control.listen_addr,
        pool_size = node.config.pool_size,
        "Waiting for GET /start"
    );

    run_control(
        control.listen_addr,
        ControlState { node: node.clone() },
        shutdown,
    )
    .await?;
    node.shutdown().await?;

    Ok(())
}

async fn run_jobs(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new(args.pool.to_config())?;
    let mut events = BroadcastStream::new(node.subscribe());
    let shutdown = install_shutdown_handler();

    node.start()?;

    let mut completed = 0u64;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = node.stopped() => break,
            item = events.next() => match item {
                Some(Ok(event)) => {
                    print_event(&event, &args.output)?;
                    if let SchedulerEvent::Completed { .. } = event {
                        completed += 1;
                        if args.max_jobs.is_some_and(|max| completed >= max) {
                            break;
                        }
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Event output fell behind, events dropped");
                }
                None => break,
            }
        }
    }

    node.shutdown().await?;
    Ok(())
}

fn print_event(
    event: &SchedulerEvent,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Text => println!("{}", event),
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging();

    match args.command {
        Commands::Serve(serve_args) => run_serve(serve_args).await?,
        Commands::Run(run_args) => run_jobs(run_args).await?,
    }

    Ok(())
}
