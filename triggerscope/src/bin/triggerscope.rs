//! Test driver: produces events, observes invocations, renders a verdict.
//!
//! Exit codes: 0 when the verdict passes, 1 when it carries hard
//! failures, 2 when setup fails before the test window opens.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triggerscope::chaos::{Disruptor, KubectlReaper};
use triggerscope::coordinator::Coordinator;
use triggerscope::emitter::Emitter;
use triggerscope::kafka::{KafkaEventSink, KafkaInvocationSource, KafkaOptions};
use triggerscope::error::SetupError;
use triggerscope::sensor::Sensor;
use triggerscope::verify::{Verdict, Verifier};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "triggerscope")]
#[command(about = "Verifies trigger-firing correctness of an event-driven sensor", long_about = None)]
struct Args {
    /// Kafka broker addresses
    #[arg(short, long, default_value = "localhost:9092")]
    brokers: Vec<String>,

    /// Topic the sensor consumes dependency events from
    #[arg(short, long, default_value = "input")]
    input_topic: String,

    /// Topic the sensor publishes trigger invocations to
    #[arg(short, long, default_value = "output")]
    output_topic: String,

    /// Connect to Kafka with TLS
    #[arg(short, long)]
    tls: bool,

    /// Connect to Kafka with SASL/SCRAM-SHA-512 (credentials from
    /// SASL_USERNAME / SASL_PASSWORD)
    #[arg(short, long)]
    sasl: bool,

    /// Sensor resource name, fetched live unless --sensor-file is set
    #[arg(long, default_value = "kafka")]
    name: String,

    /// Namespace of the sensor resource and the disruption targets
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Read the sensor manifest from a JSON file instead of the cluster
    #[arg(long)]
    sensor_file: Option<PathBuf>,

    /// Number of dependency events to produce
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Seconds to wait for late invocations before finalizing
    #[arg(short = 'w', long, default_value_t = 60)]
    wait_secs: u64,

    /// Seconds between worker kills (0 disables disruption)
    #[arg(short = 'c', long, default_value_t = 0)]
    chaos_secs: u64,

    /// Maximum seconds to run the whole test
    #[arg(long, default_value_t = 3600)]
    timeout_secs: u64,

    /// Maximum seconds since the last observed invocation
    #[arg(long, default_value_t = 180)]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(args).await {
        Ok(verdict) if verdict.passed() => ExitCode::SUCCESS,
        Ok(verdict) => {
            tracing::error!(failures = verdict.tally.failures, "verification failed");
            ExitCode::FAILURE
        }
        Err(error) => {
            tracing::error!(%error, "setup failed");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<Verdict, Box<dyn std::error::Error>> {
    let sensor = match &args.sensor_file {
        Some(path) => Sensor::from_file(path).await?,
        None => Sensor::fetch(&args.name, &args.namespace).await?,
    };
    tracing::info!(
        sensor = %sensor.metadata.name,
        dependencies = sensor.spec.dependencies.len(),
        triggers = sensor.spec.triggers.len(),
        "loaded sensor"
    );

    if sensor.spec.dependencies.is_empty() {
        return Err(SetupError::NoDependencies {
            sensor: sensor.metadata.name.clone(),
        }
        .into());
    }

    let verifier = Verifier::new(&sensor)?;

    let (produced_tx, produced_rx) = mpsc::channel(1024);
    let (consumed_tx, consumed_rx) = mpsc::channel(1024);
    let cancel = CancellationToken::new();

    let (coordinator, handle) = Coordinator::new(verifier, produced_rx, consumed_rx, cancel.clone());
    let coordinator_task = tokio::spawn(coordinator.run());

    // Consumer first, so no invocation is missed while events are produced.
    let options = KafkaOptions {
        brokers: args.brokers.clone(),
        tls: args.tls,
        sasl: args.sasl,
    };
    let source = KafkaInvocationSource::connect(&options, &args.output_topic, consumed_tx)?;
    let listener_task = tokio::spawn(source.run(cancel.clone()));

    let sink = KafkaEventSink::connect(&options, &args.input_topic)?;
    let emitter = Emitter::new(sink, produced_tx);
    tracing::info!(count = args.count, topic = %args.input_topic, "producing events");
    emitter.produce(args.count, &sensor.spec.dependencies).await?;
    // Dropping the emitter closes the produced channel; everything the
    // verifier will ever see has been queued.
    drop(emitter);

    // Disruption gets its own token: it stops as soon as polling ends,
    // while the pipeline keeps consuming late invocations.
    let chaos_cancel = CancellationToken::new();
    let chaos_task = (args.chaos_secs > 0).then(|| {
        let disruptor = Disruptor::new(
            KubectlReaper::new(args.namespace.clone()),
            Duration::from_secs(args.chaos_secs),
        );
        tokio::spawn(disruptor.run(chaos_cancel.clone()))
    });

    let started = Instant::now();
    let timeout = Duration::from_secs(args.timeout_secs);
    let idle_timeout = Duration::from_secs(args.idle_timeout_secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(15));
    ticker.tick().await; // the first tick completes immediately

    loop {
        ticker.tick().await;

        if started.elapsed() > timeout {
            tracing::warn!(?timeout, "timing out");
            break;
        }
        let Some(status) = handle.status().await else {
            break;
        };
        if status.last_activity.elapsed() > idle_timeout {
            tracing::warn!(?idle_timeout, "no invocation observed recently, timing out");
            break;
        }
        if status.done {
            break;
        }
    }

    chaos_cancel.cancel();
    if let Some(task) = chaos_task {
        let _ = task.await;
    }

    tracing::info!(elapsed = ?started.elapsed(), "polling finished");
    let wait = Duration::from_secs(args.wait_secs);
    tracing::info!(?wait, "waiting for late invocations");
    tokio::time::sleep(wait).await;

    cancel.cancel();
    let _ = listener_task.await;
    let verifier = coordinator_task.await?;

    Ok(verifier.finalize())
}
