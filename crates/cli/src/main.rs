use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use orc_context_store::Database;
use orc_domain::config::Config;
use orc_forge::MockForgeClient;
use orc_mcp_client::McpConfig;
use orc_orchestrator::consumer::ConsumerDriver;
use orc_orchestrator::health::touch_health_file;
use orc_orchestrator::producer::ProducerDriver;
use orc_orchestrator::user_config::NoopUserConfigFetcher;
use orc_queue::{InMemoryQueue, RabbitMqQueue, TaskQueue};
use orc_signals::{FileSignalSource, SignalSource};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Producer,
    Consumer,
}

/// Autonomous coding-agent orchestrator entry point (§6.1): `--mode` selects
/// which half of the producer→queue→consumer pipeline to run; omitted runs
/// one producer sweep followed by one consumer drain. `--continuous` swaps
/// the one-shot variant of the selected mode(s) for its long-running loop.
#[derive(Parser, Debug)]
#[command(name = "coding-agent", version)]
struct Cli {
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    #[arg(long)]
    continuous: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config_path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".into());
    let config_path = PathBuf::from(config_path);
    let config = Config::load(&config_path).context("loading configuration")?;
    let mcp_config = load_mcp_config(&config_path)?;

    let forge_cfg = config
        .forge_config()
        .context("no forge section for configured task_source")?
        .clone();

    // §1 non-goal: the real forge REST/RPC wrappers are out of scope.
    // `MockForgeClient` is the only concrete `ForgeClient` available to an
    // operator running this binary as-is; a real deployment swaps it for a
    // platform-specific adapter behind the same trait.
    let forge = Arc::new(MockForgeClient::new());

    let queue: Arc<dyn TaskQueue> = if config.rabbitmq.use_rabbitmq {
        Arc::new(RabbitMqQueue::new(
            &config.rabbitmq.host,
            config.rabbitmq.port,
            &config.rabbitmq.user,
            config.rabbitmq.password.as_deref(),
            &config.rabbitmq.queue,
        ))
    } else {
        Arc::new(InMemoryQueue::new())
    };

    let base_dir = config.context_storage.base_dir.clone();
    let db = Arc::new(
        Database::open(&base_dir.join("tasks.db")).context("opening tasks.db")?,
    );

    let producer = ProducerDriver::new(
        forge.clone(),
        queue.clone(),
        base_dir.as_path(),
        forge_cfg.bot_label.clone(),
        forge_cfg.processing_label.clone(),
        forge_cfg.query.clone(),
    )
    .with_retention(db.clone(), config.context_storage.cleanup_days)
    .with_pause_expiry(config.pause_resume.paused_task_expiry_days);

    let consumer = ConsumerDriver::new(
        forge,
        queue,
        db,
        base_dir.as_path(),
        config.clone(),
        mcp_config,
        Arc::new(NoopUserConfigFetcher),
    );

    let pause_source: Arc<dyn SignalSource> = Arc::new(FileSignalSource::new(
        base_dir.join(&config.pause_resume.signal_file),
    ));

    let run_producer = matches!(cli.mode, None | Some(Mode::Producer));
    let run_consumer = matches!(cli.mode, None | Some(Mode::Consumer));

    if cli.continuous {
        if run_producer {
            let health = base_dir.join("healthcheck").join("producer.health");
            producer
                .run_continuous(
                    config.continuous.producer.interval_minutes,
                    config.continuous.producer.delay_first_run,
                    &*pause_source,
                    &health,
                )
                .await?;
        }
        if run_consumer {
            touch_health_file(&base_dir.join("healthcheck").join("consumer.health"))?;
            consumer
                .run_continuous(
                    Duration::from_secs(config.continuous.consumer.queue_timeout_seconds),
                    &*pause_source,
                )
                .await?;
        }
    } else {
        if run_producer {
            producer.run_once().await?;
        }
        if run_consumer {
            consumer
                .run_once(Duration::from_secs(config.continuous.consumer.queue_timeout_seconds))
                .await?;
        }
    }

    Ok(())
}

/// Structured logging (§6.2): `DEBUG=true` drops the default filter to
/// `debug`; `LOGS` redirects output from stderr to the given file path.
fn init_tracing() {
    let default_filter = if parse_bool_env("DEBUG") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).json();

    match std::env::var("LOGS") {
        Ok(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .unwrap_or_else(|e| panic!("opening LOGS path {path}: {e}"));
            builder.with_writer(move || file.try_clone().expect("cloning log file handle")).init();
        }
        Err(_) => builder.init(),
    }
}

fn parse_bool_env(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}

/// The MCP server list lives under an `mcp:` key in the same YAML document
/// config is loaded from (§1: the MCP client transport is a separate
/// external boundary, not a field of the core `Config`).
fn load_mcp_config(config_path: &std::path::Path) -> anyhow::Result<McpConfig> {
    if !config_path.exists() {
        return Ok(McpConfig::default());
    }
    let raw = std::fs::read_to_string(config_path)?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&raw)?;
    match doc.get("mcp") {
        Some(section) => Ok(serde_yaml::from_value(section.clone())?),
        None => Ok(McpConfig::default()),
    }
}
