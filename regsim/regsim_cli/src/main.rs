use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use regsim_engine::{
    ModelParameters, Parameter, RunStore, SimulationEngine, SimulationRun, SimulationTelemetry,
    TestType,
};
use serde_json::{json, Value};
use shared_logging::LogLevel;
use tokio::{runtime::Runtime, time};

/// p-values at or below this are reported as a rare event.
const RARE_EVENT_THRESHOLD: f64 = 1e-4;

#[derive(Parser, Debug)]
#[command(
    name = "regsim",
    version,
    about = "Simulation-based inference for simple linear regression"
)]
struct Cli {
    /// File holding the active run between invocations.
    #[arg(long, global = true, default_value = "regsim-session.json")]
    session: PathBuf,
    /// Append JSON log records to this file.
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulates an observed dataset and S trials, replacing the active run.
    Generate(GenerateArgs),
    /// Tests the observed estimate against the simulated distribution.
    Test {
        /// `slope` or `intercept`.
        #[arg(long, default_value = "slope")]
        parameter: String,
        /// `>`, `<` or `!=` (also `gt`, `lt`, `ne`).
        #[arg(long)]
        test_type: String,
    },
    /// Percentile confidence interval from the simulated estimates.
    Interval {
        /// `slope` or `intercept`.
        #[arg(long, default_value = "slope")]
        parameter: String,
        /// Confidence level in percent, strictly between 0 and 100.
        #[arg(long, default_value_t = 95.0)]
        confidence_level: f64,
    },
    /// Prints a summary of the active run.
    Show,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// TOML file with model parameters; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sample size.
    #[arg(long)]
    n: Option<usize>,
    /// Drift of the noise mean (`mu * x`).
    #[arg(long, allow_negative_numbers = true)]
    mu: Option<f64>,
    /// True intercept.
    #[arg(long, allow_negative_numbers = true)]
    beta0: Option<f64>,
    /// True slope.
    #[arg(long, allow_negative_numbers = true)]
    beta1: Option<f64>,
    /// Noise variance.
    #[arg(long)]
    sigma2: Option<f64>,
    /// Number of simulation trials.
    #[arg(long)]
    s: Option<usize>,
    /// Seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Run trials on a single thread.
    #[arg(long)]
    sequential: bool,
    /// Abort generation after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl GenerateArgs {
    fn params(&self) -> Result<ModelParameters> {
        let mut params = match &self.config {
            Some(path) => ModelParameters::load(path)?,
            None => ModelParameters::default(),
        };
        if let Some(n) = self.n {
            params.n = n;
        }
        if let Some(mu) = self.mu {
            params.mu = mu;
        }
        if let Some(beta0) = self.beta0 {
            params.beta0 = beta0;
        }
        if let Some(beta1) = self.beta1 {
            params.beta1 = beta1;
        }
        if let Some(sigma2) = self.sigma2 {
            params.sigma2 = sigma2;
        }
        if let Some(s) = self.s {
            params.s = s;
        }
        params.validate()?;
        Ok(params)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = execute(&cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn execute(cli: &Cli) -> Result<Value> {
    match &cli.command {
        Commands::Generate(args) => handle_generate(cli, args),
        Commands::Test {
            parameter,
            test_type,
        } => handle_test(cli, parameter, test_type),
        Commands::Interval {
            parameter,
            confidence_level,
        } => handle_interval(cli, parameter, *confidence_level),
        Commands::Show => handle_show(cli),
    }
}

fn build_engine(log: Option<&Path>, seed: Option<u64>, parallel: bool) -> Result<SimulationEngine> {
    let mut builder = SimulationEngine::builder().parallel(parallel);
    if let Some(path) = log {
        let telemetry = SimulationTelemetry::builder("regsim")
            .log_path(path)
            .min_level(LogLevel::Info)
            .build()
            .with_context(|| format!("opening log {}", path.display()))?;
        builder = builder.telemetry(telemetry);
    }
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    Ok(builder.build())
}

fn handle_generate(cli: &Cli, args: &GenerateArgs) -> Result<Value> {
    let params = args.params()?;
    let engine = Arc::new(build_engine(
        cli.log.as_deref(),
        args.seed,
        !args.sequential,
    )?);
    let run = run_with_timeout(
        Arc::clone(&engine),
        params,
        args.timeout_secs.map(Duration::from_secs),
    )?;
    let summary = engine.summarize(Some(&run))?;

    let store = RunStore::new();
    let active = store.replace(run);
    store.save_to(&cli.session)?;
    if let Some(tel) = engine.telemetry() {
        let _ = tel.log(
            LogLevel::Info,
            "session.saved",
            json!({ "run_id": active.id.to_string(), "path": cli.session }),
        );
    }
    Ok(json!({
        "run_id": active.id.to_string(),
        "session": cli.session,
        "summary": summary,
    }))
}

fn run_with_timeout(
    engine: Arc<SimulationEngine>,
    params: ModelParameters,
    limit: Option<Duration>,
) -> Result<SimulationRun> {
    let runtime = Runtime::new().context("starting runtime")?;
    let outcome = runtime.block_on(async move {
        let task = tokio::task::spawn_blocking(move || engine.run_simulation(params));
        let joined = match limit {
            Some(limit) => time::timeout(limit, task).await.map_err(|_| {
                anyhow!("simulation did not finish within {}s", limit.as_secs())
            })?,
            None => task.await,
        };
        let run = joined.context("simulation task panicked")??;
        Ok::<_, anyhow::Error>(run)
    });
    // a timed-out trial loop keeps its blocking thread; don't wait for it
    runtime.shutdown_background();
    outcome
}

fn handle_test(cli: &Cli, parameter: &str, test_type: &str) -> Result<Value> {
    let parameter: Parameter = parameter.parse()?;
    let test_type: TestType = test_type.parse()?;
    let store = RunStore::load_from(&cli.session)?;
    let active = store.current();
    let engine = build_engine(cli.log.as_deref(), None, true)?;
    let outcome = engine.hypothesis_test(
        active.as_deref().map(|a| &a.run),
        parameter,
        test_type,
    )?;
    Ok(json!({
        "outcome": outcome,
        "message": rare_event_message(outcome.p_value),
    }))
}

fn handle_interval(cli: &Cli, parameter: &str, level: f64) -> Result<Value> {
    let parameter: Parameter = parameter.parse()?;
    let store = RunStore::load_from(&cli.session)?;
    let active = store.current();
    let engine = build_engine(cli.log.as_deref(), None, true)?;
    let ci = engine.confidence_interval(active.as_deref().map(|a| &a.run), parameter, level)?;
    Ok(json!({
        "interval": ci,
        "observed": active.as_deref().map(|a| a.run.observed_value(parameter)),
    }))
}

fn handle_show(cli: &Cli) -> Result<Value> {
    let store = RunStore::load_from(&cli.session)?;
    let active = store.current();
    let engine = build_engine(cli.log.as_deref(), None, true)?;
    let summary = engine.summarize(active.as_deref().map(|a| &a.run))?;
    Ok(json!({
        "run_id": active.as_deref().map(|a| a.id.to_string()),
        "created_at": active.as_deref().map(|a| a.created_at),
        "summary": summary,
    }))
}

fn rare_event_message(p_value: f64) -> Option<&'static str> {
    (p_value <= RARE_EVENT_THRESHOLD).then_some("You have encountered a rare event!")
}
