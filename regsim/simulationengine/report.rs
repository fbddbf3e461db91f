use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    compare::{extreme_proportions, ExtremeProportions},
    data_generator::FitResult,
    error::{SimulationError, SimulationResult},
    interval::{mean, std_dev},
    methods::Parameter,
    params::ModelParameters,
    simulator::SimulationRun,
};

/// Descriptive statistics of one simulated coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateSummary {
    /// Coefficient summarized.
    pub parameter: Parameter,
    /// True model value.
    pub true_value: f64,
    /// Observed estimate.
    pub observed: f64,
    /// Mean of the simulated estimates.
    pub mean: f64,
    /// Population standard deviation of the simulated estimates.
    pub std_dev: f64,
    /// Smallest simulated estimate.
    pub min: f64,
    /// Largest simulated estimate.
    pub max: f64,
}

impl EstimateSummary {
    fn from_run(run: &SimulationRun, parameter: Parameter) -> Self {
        let values = run.estimates(parameter);
        Self {
            parameter,
            true_value: run.true_value(parameter),
            observed: run.observed_value(parameter),
            mean: mean(values),
            std_dev: std_dev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// What the caller shows after a generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Parameters used.
    pub params: ModelParameters,
    /// Fit of the observed dataset.
    pub observed: FitResult,
    /// Extreme-magnitude shares for both coefficients.
    pub extreme: ExtremeProportions,
    /// Slope distribution.
    pub slope: EstimateSummary,
    /// Intercept distribution.
    pub intercept: EstimateSummary,
    /// Timestamp.
    pub generated_at: DateTime<Utc>,
}

/// Builder for `RunSummary`.
#[derive(Default)]
pub struct RunSummaryBuilder<'a> {
    run: Option<&'a SimulationRun>,
    generated_at: Option<DateTime<Utc>>,
}

impl<'a> RunSummaryBuilder<'a> {
    /// Creates builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            run: None,
            generated_at: None,
        }
    }

    /// Sets run.
    #[must_use]
    pub const fn run(mut self, run: &'a SimulationRun) -> Self {
        self.run = Some(run);
        self
    }

    /// Overrides the timestamp (defaults to now).
    #[must_use]
    pub const fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Builds the summary.
    pub fn build(self) -> SimulationResult<RunSummary> {
        let run = self.run.ok_or(SimulationError::MissingRunState)?;
        let extreme = extreme_proportions(run)?;
        Ok(RunSummary {
            params: *run.params(),
            observed: run.observed(),
            extreme,
            slope: EstimateSummary::from_run(run, Parameter::Slope),
            intercept: EstimateSummary::from_run(run, Parameter::Intercept),
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
        })
    }
}
