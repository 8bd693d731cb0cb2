use asr_sweep::config::SweepConfig;
use asr_sweep::{
    dataset, overrides, ExperimentOrchestrator, HttpJobClient, PollScheduler, SweepError,
    SweepPlan,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "asr-sweep",
    about = "Parameter sensitivity sweeps against a remote ASR execution service"
)]
struct Cli {
    /// Configuration file (defaults to $ASR_SWEEP_CONFIG or config/sweep.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep every eligible parameter and write one report per parameter.
    Run(RunArgs),
    /// Print the candidate values per parameter without submitting jobs.
    Plan(PlanArgs),
    /// Write the default configuration file.
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Name of the tested ASR executor.
    asr_name: String,
    /// Number of steps each numeric range is divided into.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    experiment_count: u32,
    /// Dataset directory name under the samples dir.
    dataset_key: String,
    /// Maximum time to wait for one trial's result, in seconds.
    timeout_secs: u64,
    results_dir: Option<PathBuf>,
    samples_dir: Option<PathBuf>,
    host: Option<String>,
    /// File with excluded parameter keys, one per line.
    excluded_file: Option<PathBuf>,
    /// File with fixed parameter values, `key:value` per line.
    predefined_file: Option<PathBuf>,
    /// Extra runs per candidate value.
    repeat_count: Option<u32>,
    /// Submit test-only jobs and read metrics from the test step.
    #[arg(long)]
    single_step: bool,
}

#[derive(Args, Debug, Clone)]
struct PlanArgs {
    asr_name: String,
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    experiment_count: u32,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    excluded: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InitConfigArgs {
    #[arg(default_value = "config/sweep.toml")]
    path: PathBuf,
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        error!(error = %err, "sweep aborted");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), SweepError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_sweep(cli.config, args).await,
        Command::Plan(args) => run_plan(cli.config, args).await,
        Command::InitConfig(args) => init_config(args),
    }
}

async fn run_sweep(config_path: Option<PathBuf>, args: RunArgs) -> Result<(), SweepError> {
    let (mut config, loaded_from) = SweepConfig::load(config_path)?;
    if let Some(path) = loaded_from.as_ref().filter(|path| path.exists()) {
        info!(path = %path.display(), "loaded configuration");
    }
    if let Some(host) = args.host {
        config.service.host = host;
    }

    let results_dir = args
        .results_dir
        .unwrap_or_else(|| config.sweep.results_dir.clone());
    let samples_dir = args
        .samples_dir
        .unwrap_or_else(|| config.sweep.samples_dir.clone());
    std::fs::create_dir_all(&results_dir)?;

    let samples = dataset::load_samples(&samples_dir, &args.dataset_key)?;
    info!(dataset = %args.dataset_key, samples = samples.len(), "loaded dataset");

    let mut plan = SweepPlan::new(&args.asr_name, args.experiment_count, results_dir);
    plan.repeat_count = args.repeat_count.unwrap_or(config.sweep.repeat_count);
    plan.samples = samples;
    plan.excluded = overrides::load_excluded(args.excluded_file.as_deref())?;
    plan.predefined = overrides::load_predefined(args.predefined_file.as_deref())?;
    plan.measurement_step_supported = config.sweep.measurement_step && !args.single_step;
    plan.metrics = config.sweep.metrics.clone();
    plan.credentials = config
        .service
        .credentials()
        .map(|(username, password)| (username.to_string(), password.to_string()));

    let client = HttpJobClient::from_config(&config.service)?;
    info!(host = %client.base_url(), asr = %plan.asr_key, "starting sweep");
    let poller =
        PollScheduler::from_config(Duration::from_secs(args.timeout_secs), &config.polling);
    let orchestrator = ExperimentOrchestrator::new(client, plan, poller);

    let summary = orchestrator.run().await?;
    for path in &summary.reports {
        println!("{}", path.display());
    }
    if !summary.failed.is_empty() {
        println!("Failed parameters: {}", summary.failed.join(", "));
    }
    Ok(())
}

async fn run_plan(config_path: Option<PathBuf>, args: PlanArgs) -> Result<(), SweepError> {
    let (mut config, _) = SweepConfig::load(config_path)?;
    if let Some(host) = args.host {
        config.service.host = host;
    }

    let mut plan = SweepPlan::new(
        &args.asr_name,
        args.experiment_count,
        config.sweep.results_dir.clone(),
    );
    plan.excluded = overrides::load_excluded(args.excluded.as_deref())?;

    let client = HttpJobClient::from_config(&config.service)?;
    let poller = PollScheduler::from_config(Duration::ZERO, &config.polling);
    let orchestrator = ExperimentOrchestrator::new(client, plan, poller);

    for parameter in orchestrator.plan_candidates().await? {
        let values = parameter
            .values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        println!(
            "{} ({}): {}",
            parameter.key,
            parameter.param_type.label(),
            values.join(", ")
        );
    }
    Ok(())
}

fn init_config(args: InitConfigArgs) -> Result<(), SweepError> {
    if args.path.exists() && !args.force {
        return Err(SweepError::Config(format!(
            "{} already exists (pass --force to overwrite)",
            args.path.display()
        )));
    }
    SweepConfig::default().write(&args.path)?;
    println!("Wrote {}", args.path.display());
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("asr_sweep=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
