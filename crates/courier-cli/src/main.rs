//! courier - queue-consuming job worker

mod handlers;

use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use courier_core::domain::OutgoingMessage;
use courier_core::impls::QueueBackend;
use courier_core::ports::QueueService;
use courier_core::{Shutdown, WorkerBuilder, WorkerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Queue-consuming job worker")]
struct Cli {
    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume jobs until interrupted.
    Run(RunArgs),

    /// Enqueue one job.
    Send(SendArgs),
}

#[derive(Debug, Args)]
struct QueueArgs {
    /// `http(s)://` SQS queue url or `memory://<name>`.
    #[arg(long, env = "AWS_SQS_WEB_QUEUE_URL")]
    queue_url: String,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    queue: QueueArgs,

    /// Seconds a claimed message stays hidden (at most 12 hours).
    #[arg(
        long,
        env = "COURIER_VISIBILITY_TIMEOUT",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(0..=43_200)
    )]
    visibility_timeout: u64,

    /// Seconds a receive long-polls (at most 20).
    #[arg(
        long,
        env = "COURIER_WAIT_TIME",
        default_value_t = 20,
        value_parser = clap::value_parser!(u64).range(0..=20)
    )]
    wait_time: u64,

    /// Deliveries a failing job gets before it is abandoned.
    #[arg(long, env = "COURIER_MAX_RETRY_ATTEMPTS", default_value_t = 5)]
    max_retry_attempts: u32,

    /// Enqueue `FUNCTION=JSON` before starting (handy with `memory://`).
    #[arg(long = "enqueue", value_parser = parse_job)]
    enqueue: Vec<(String, serde_json::Value)>,
}

impl RunArgs {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_visibility_timeout(Duration::from_secs(self.visibility_timeout))
            .with_wait_time(Duration::from_secs(self.wait_time))
            .with_max_retry_attempts(self.max_retry_attempts)
    }
}

#[derive(Debug, Args)]
struct SendArgs {
    #[command(flatten)]
    queue: QueueArgs,

    /// Job type, carried in the `Function` attribute.
    #[arg(long)]
    function: String,

    /// JSON object body.
    #[arg(default_value = "{}")]
    payload: String,
}

fn parse_job(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (function, body) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FUNCTION=JSON, got {raw:?}"))?;
    let body = serde_json::from_str(body).map_err(|e| format!("invalid JSON body: {e}"))?;
    Ok((function.to_string(), body))
}

fn init_tracing(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Send(args) => send(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let backend = QueueBackend::from_url(&args.queue.queue_url)?;
    let queue = backend
        .connect()
        .with_context(|| format!("connecting to {}", backend.describe()))?;
    tracing::info!(queue = %backend.describe(), "queue configured");

    for (function, body) in &args.enqueue {
        let id = queue
            .send(OutgoingMessage::job(function.as_str(), body))
            .await?;
        tracing::info!(message_id = %id, %function, "enqueued");
    }

    let worker = handlers::install(WorkerBuilder::new(queue).config(args.worker_config()))?
        .build()?;

    let (shutdown, signal) = Shutdown::new();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, finishing current job"),
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
        shutdown.trigger();
    });

    let stats = worker.run(signal).await;
    tracing::info!(
        succeeded = stats.succeeded,
        released = stats.released,
        deleted = stats.deleted(),
        "bye"
    );
    Ok(())
}

async fn send(args: SendArgs) -> anyhow::Result<()> {
    let body: serde_json::Value =
        serde_json::from_str(&args.payload).context("payload must be JSON")?;
    anyhow::ensure!(body.is_object(), "payload must be a JSON object");

    let backend = QueueBackend::from_url(&args.queue.queue_url)?;
    let queue = backend.connect()?;
    let id = queue
        .send(OutgoingMessage::job(args.function.as_str(), &body))
        .await?;
    println!("{id}");
    Ok(())
}
