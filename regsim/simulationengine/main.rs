use std::time::Instant;

use parking_lot::Mutex;
use rand::{rngs::SmallRng, Rng};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    compare::{self, ExtremeProportions, HypothesisTestOutcome},
    data_generator::DataGenerator,
    error::{SimulationError, SimulationResult},
    helper::{random_seed, seeded_rng, SimulationTelemetry},
    interval::{self, ConfidenceInterval},
    methods::{Parameter, TestType},
    params::ModelParameters,
    report::{RunSummary, RunSummaryBuilder},
    simulator::{SimulationRun, Simulator},
};

/// Entry point for generation and inference queries.
///
/// The engine holds no run state. Callers keep the returned [`SimulationRun`] and pass it
/// back to each query; `None` is rejected as a missing run.
pub struct SimulationEngine {
    telemetry: Option<SimulationTelemetry>,
    rng: Mutex<SmallRng>,
    parallel: bool,
}

impl SimulationEngine {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> SimulationEngineBuilder {
        SimulationEngineBuilder::default()
    }

    /// Runs the observed draw plus `params.s` trials using the engine's own random source.
    pub fn run_simulation(&self, params: ModelParameters) -> SimulationResult<SimulationRun> {
        let mut rng = self.rng.lock();
        self.run_simulation_with(params, &mut *rng)
    }

    /// Same as [`Self::run_simulation`] with a caller-supplied random source.
    pub fn run_simulation_with<R: Rng + ?Sized>(
        &self,
        params: ModelParameters,
        rng: &mut R,
    ) -> SimulationResult<SimulationRun> {
        let generator = match DataGenerator::new(params) {
            Ok(generator) => generator,
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    "simulation.run.rejected",
                    json!({ "field": err.field(), "error": err.to_string() }),
                );
                return Err(err);
            }
        };
        self.log(
            LogLevel::Info,
            "simulation.run.start",
            json!({
                "n": params.n,
                "s": params.s,
                "mu": params.mu,
                "beta0": params.beta0,
                "beta1": params.beta1,
                "sigma2": params.sigma2,
                "parallel": self.parallel,
            }),
        );
        let started = Instant::now();
        let run = Simulator::new(generator, self.parallel, self.telemetry.clone()).run(rng);
        self.log(
            LogLevel::Info,
            "simulation.run.completed",
            json!({
                "trials": run.trials(),
                "draws": params.total_draws(),
                "observed_slope": run.observed().slope,
                "observed_intercept": run.observed().intercept,
                "elapsed_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            }),
        );
        Ok(run)
    }

    /// Shares of simulated slopes and intercepts larger in magnitude than observed.
    pub fn extreme_proportions(
        &self,
        run: Option<&SimulationRun>,
    ) -> SimulationResult<ExtremeProportions> {
        compare::extreme_proportions(require(run)?)
    }

    /// Simulation-based p-value for `parameter` in direction `test_type`.
    pub fn hypothesis_test(
        &self,
        run: Option<&SimulationRun>,
        parameter: Parameter,
        test_type: TestType,
    ) -> SimulationResult<HypothesisTestOutcome> {
        let outcome = compare::hypothesis_test(require(run)?, parameter, test_type)?;
        self.log(
            LogLevel::Info,
            "simulation.query.hypothesis_test",
            json!({
                "parameter": parameter.label(),
                "test_type": test_type.symbol(),
                "p_value": outcome.p_value,
            }),
        );
        Ok(outcome)
    }

    /// Percentile interval for `parameter` at `level_percent` (strictly inside 0..100).
    pub fn confidence_interval(
        &self,
        run: Option<&SimulationRun>,
        parameter: Parameter,
        level_percent: f64,
    ) -> SimulationResult<ConfidenceInterval> {
        let c = interval::level_fraction(level_percent)?;
        let ci = interval::interval_at(require(run)?, parameter, level_percent, c)?;
        self.log(
            LogLevel::Info,
            "simulation.query.confidence_interval",
            json!({
                "parameter": parameter.label(),
                "level": level_percent,
                "lower": ci.lower,
                "upper": ci.upper,
                "includes_true": ci.includes_true,
            }),
        );
        Ok(ci)
    }

    /// Summary of a run for display.
    pub fn summarize(&self, run: Option<&SimulationRun>) -> SimulationResult<RunSummary> {
        RunSummaryBuilder::new().run(require(run)?).build()
    }

    /// Returns telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> Option<&SimulationTelemetry> {
        self.telemetry.as_ref()
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }
}

fn require(run: Option<&SimulationRun>) -> SimulationResult<&SimulationRun> {
    run.ok_or(SimulationError::MissingRunState)
}

/// Builder for `SimulationEngine`.
pub struct SimulationEngineBuilder {
    telemetry: Option<SimulationTelemetry>,
    seed: u64,
    parallel: bool,
}

impl SimulationEngineBuilder {
    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: SimulationTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Seeds the engine's random source.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Spreads trials over the rayon pool (default) or runs them on the caller's thread.
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builds the engine.
    #[must_use]
    pub fn build(self) -> SimulationEngine {
        SimulationEngine {
            telemetry: self.telemetry,
            rng: Mutex::new(seeded_rng(self.seed)),
            parallel: self.parallel,
        }
    }
}

impl Default for SimulationEngineBuilder {
    fn default() -> Self {
        Self {
            telemetry: None,
            seed: random_seed(),
            parallel: true,
        }
    }
}
