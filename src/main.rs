use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use strata_backend::MemoryBackend;
use strata_config::{Config, ConfigResolver, ConfigSource, Variant};
use strata_engine::{Provisioner, TracingNotifier};
use strata_topology::AppInfra;

/// Strata - provision a load-balanced container app from a small config
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.strata)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the resolved config and the order resources would be created in
  Preview {
    #[command(flatten)]
    config: ConfigArgs,
  },

  /// Provision the stack and print its url
  Up {
    #[command(flatten)]
    config: ConfigArgs,

    /// Backend state file (default: <data-dir>/state.json)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Simulated latency per submission, in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,
  },

  /// Print the resolved config as JSON
  Config {
    #[command(flatten)]
    config: ConfigArgs,
  },
}

#[derive(Args)]
struct ConfigArgs {
  /// Config file (JSON or YAML)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Override a setting, e.g. `--set containerPort=8080`
  #[arg(long = "set", value_name = "KEY=VALUE")]
  overrides: Vec<String>,

  /// Which defaults apply: component or standalone
  #[arg(long, default_value = "component")]
  variant: Variant,
}

impl ConfigArgs {
  fn source(&self) -> Result<ConfigSource> {
    let mut source = match &self.config {
      Some(path) => ConfigSource::from_path(path)
        .with_context(|| format!("failed to load config file: {}", path.display()))?,
      None => ConfigSource::new(),
    };
    for assignment in &self.overrides {
      source
        .apply_override(assignment)
        .with_context(|| format!("invalid override: {}", assignment))?;
    }
    Ok(source)
  }

  fn resolve(&self) -> Result<Config> {
    resolve(&self.source()?, self.variant)
  }
}

fn resolve(source: &ConfigSource, variant: Variant) -> Result<Config> {
  ConfigResolver::new(source, variant)
    .resolve()
    .context("invalid configuration")
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".strata"),
  };

  match cli.command {
    Some(Commands::Preview { config }) => preview(&config)?,
    Some(Commands::Up {
      config,
      state,
      latency_ms,
    }) => {
      let state = state.unwrap_or_else(|| data_dir.join("state.json"));
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { up(&config, &state, latency_ms.map(Duration::from_millis)).await })?;
    }
    Some(Commands::Config { config }) => {
      let config = config.resolve()?;
      println!("{}", serde_json::to_string_pretty(&config)?);
    }
    None => {
      println!("strata - use --help to see available commands");
    }
  }

  Ok(())
}

fn preview(args: &ConfigArgs) -> Result<()> {
  let config = args.resolve()?;
  let app = AppInfra::new(&config).context("failed to build topology")?;
  let plan = app.topology().plan().context("failed to order topology")?;

  eprintln!("Stack {} ({}): {} resources", app.name(), AppInfra::TYPE, plan.resources.len());
  for (i, id) in plan.order().iter().enumerate() {
    eprintln!("  {:>2}. {}", i + 1, id);
  }

  let output = json!({ "config": config, "plan": plan });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

async fn up(args: &ConfigArgs, state: &Path, latency: Option<Duration>) -> Result<()> {
  let source = args.source()?;

  let mut backend = MemoryBackend::load(state)
    .await
    .with_context(|| format!("failed to load state: {}", state.display()))?;
  if let Some(latency) = latency {
    backend = backend.with_latency(latency);
  }

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling in-flight submissions");
      on_interrupt.cancel();
    }
  });

  let (backend, result) = provision(&source, args.variant, backend, cancel).await;

  // Created resources are kept even when the run failed
  backend
    .save(state)
    .await
    .with_context(|| format!("failed to save state: {}", state.display()))?;

  let url = result?;
  println!("{}", serde_json::to_string_pretty(&json!({ "url": url }))?);
  Ok(())
}

/// Resolve `source`, build its stack and provision it on `backend`, in the
/// config's region. Returns the backend alongside the stack url so callers can
/// persist whatever was created, even on failure.
async fn provision(
  source: &ConfigSource,
  variant: Variant,
  backend: MemoryBackend,
  cancel: CancellationToken,
) -> (Arc<MemoryBackend>, Result<String>) {
  let config = match resolve(source, variant) {
    Ok(config) => config,
    Err(e) => return (Arc::new(backend), Err(e)),
  };
  let backend = Arc::new(backend.with_region(&config.region));
  let result = apply(&config, backend.clone(), cancel).await;
  (backend, result)
}

async fn apply(config: &Config, backend: Arc<MemoryBackend>, cancel: CancellationToken) -> Result<String> {
  let app = AppInfra::new(config).context("failed to build topology")?;
  let url = app.url();

  let provisioner = Provisioner::new(backend.clone(), backend).with_notifier(TracingNotifier);
  let report = provisioner
    .apply(app.into_topology(), cancel)
    .await
    .context("provisioning failed")?;
  info!(
    run_id = %report.run_id,
    created = report.created.len(),
    unchanged = report.unchanged.len(),
    "stack is up"
  );

  url.get().await.context("url did not resolve")
}
