use std::time::Instant;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    data_generator::{DataGenerator, Dataset, FitResult},
    error::{SimulationError, SimulationResult},
    helper::{seeded_rng, SimulationTelemetry},
    methods::Parameter,
    params::ModelParameters,
};

/// Observed fit plus the empirical sampling distribution of both coefficients.
///
/// `slopes[i]` and `intercepts[i]` come from the same trial. A run is never mutated after
/// construction; a new run replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    params: ModelParameters,
    observed_dataset: Dataset,
    observed: FitResult,
    slopes: Vec<f64>,
    intercepts: Vec<f64>,
}

impl SimulationRun {
    /// Assembles a run from its parts, checking that the sequences are aligned and
    /// non-empty.
    pub fn from_parts(
        params: ModelParameters,
        observed_dataset: Dataset,
        observed: FitResult,
        slopes: Vec<f64>,
        intercepts: Vec<f64>,
    ) -> SimulationResult<Self> {
        let run = Self {
            params,
            observed_dataset,
            observed,
            slopes,
            intercepts,
        };
        run.ensure_ready()?;
        Ok(run)
    }

    /// Fails with `MissingRunState` for an empty run and `InvalidParameter` for
    /// misaligned sequences, sequences whose length is not `params.s`, or invalid stored
    /// parameters. Runs restored from storage bypass `from_parts`, so every query goes
    /// through this check.
    pub fn ensure_ready(&self) -> SimulationResult<()> {
        if self.slopes.is_empty() && self.intercepts.is_empty() {
            return Err(SimulationError::MissingRunState);
        }
        if self.slopes.len() != self.intercepts.len() {
            return Err(SimulationError::invalid(
                "run",
                format!(
                    "{} slopes but {} intercepts",
                    self.slopes.len(),
                    self.intercepts.len()
                ),
            ));
        }
        if self.slopes.len() != self.params.s {
            return Err(SimulationError::invalid(
                "run",
                format!(
                    "{} trials stored but s = {}",
                    self.slopes.len(),
                    self.params.s
                ),
            ));
        }
        self.params.validate()
    }

    /// Parameters the run was generated with.
    #[must_use]
    pub const fn params(&self) -> &ModelParameters {
        &self.params
    }

    /// The first dataset drawn.
    #[must_use]
    pub const fn observed_dataset(&self) -> &Dataset {
        &self.observed_dataset
    }

    /// Fit of the observed dataset.
    #[must_use]
    pub const fn observed(&self) -> FitResult {
        self.observed
    }

    /// Simulated slopes by trial index.
    #[must_use]
    pub fn slopes(&self) -> &[f64] {
        &self.slopes
    }

    /// Simulated intercepts by trial index.
    #[must_use]
    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    /// Number of simulated trials.
    #[must_use]
    pub fn trials(&self) -> usize {
        self.slopes.len()
    }

    /// Simulated estimates of `parameter`.
    #[must_use]
    pub fn estimates(&self, parameter: Parameter) -> &[f64] {
        match parameter {
            Parameter::Slope => &self.slopes,
            Parameter::Intercept => &self.intercepts,
        }
    }

    /// Observed estimate of `parameter`.
    #[must_use]
    pub const fn observed_value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Slope => self.observed.slope,
            Parameter::Intercept => self.observed.intercept,
        }
    }

    /// True model coefficient for `parameter` (`beta1` or `beta0`).
    #[must_use]
    pub const fn true_value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Slope => self.params.beta1,
            Parameter::Intercept => self.params.beta0,
        }
    }
}

/// Runs the observed draw followed by `s` independent trials.
pub struct Simulator {
    generator: DataGenerator,
    parallel: bool,
    telemetry: Option<SimulationTelemetry>,
}

impl Simulator {
    /// Creates a simulator.
    #[must_use]
    pub const fn new(
        generator: DataGenerator,
        parallel: bool,
        telemetry: Option<SimulationTelemetry>,
    ) -> Self {
        Self {
            generator,
            parallel,
            telemetry,
        }
    }

    /// Draws the observed dataset, then every trial.
    ///
    /// The observed dataset and one seed per trial are drawn from `rng` up front; each
    /// trial then owns a generator built from its seed. Results are collected by trial
    /// index, so the output is the same whether trials run on one thread or many.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulationRun {
        let params = *self.generator.params();
        let (observed_dataset, observed) = self.generator.generate(rng);
        let seeds: Vec<u64> = (0..params.s).map(|_| rng.gen()).collect();

        let started = Instant::now();
        let fits: Vec<FitResult> = if self.parallel {
            seeds.par_iter().map(|&seed| self.trial(seed)).collect()
        } else {
            seeds.iter().map(|&seed| self.trial(seed)).collect()
        };
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Debug,
                "simulation.trials.completed",
                json!({
                    "trials": fits.len(),
                    "parallel": self.parallel,
                    "elapsed_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                }),
            );
        }

        let (slopes, intercepts) = fits
            .into_iter()
            .map(|fit| (fit.slope, fit.intercept))
            .unzip();
        SimulationRun {
            params,
            observed_dataset,
            observed,
            slopes,
            intercepts,
        }
    }

    fn trial(&self, seed: u64) -> FitResult {
        let mut rng = seeded_rng(seed);
        self.generator.generate(&mut rng).1
    }
}
