#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Regsim simulation engine – simulates regression datasets, builds empirical sampling
//! distributions of the OLS slope and intercept, and answers inference queries against them.

/// Error kinds surfaced to callers.
#[path = "../error.rs"]
pub mod error;

/// Model parameters and their validation.
#[path = "../params.rs"]
pub mod params;

/// Telemetry and random-source helpers.
#[path = "../helper.rs"]
pub mod helper;

/// Query selectors (estimated parameter, test direction).
#[path = "../methods.rs"]
pub mod methods;

/// Dataset generation and least-squares fitting.
#[path = "../data_generator.rs"]
pub mod data_generator;

/// Repeated-trial simulation and the resulting run.
#[path = "../simulator.rs"]
pub mod simulator;

/// Observed-versus-simulated comparisons (extreme proportions, p-values).
#[path = "../compare.rs"]
pub mod compare;

/// Percentile confidence intervals and descriptive statistics.
#[path = "../interval.rs"]
pub mod interval;

/// Run summaries.
#[path = "../report.rs"]
pub mod report;

/// Holder for the single active run.
#[path = "../session.rs"]
pub mod session;

/// Engine facade.
#[path = "../main.rs"]
pub mod runtime;

pub use compare::{ExtremeProportions, HypothesisTestOutcome};
pub use data_generator::{Dataset, FitResult, Observation};
pub use error::{SimulationError, SimulationResult};
pub use helper::{SimulationTelemetry, SimulationTelemetryBuilder};
pub use interval::ConfidenceInterval;
pub use methods::{Parameter, TestType};
pub use params::{ModelParameters, ModelParametersBuilder};
pub use report::{EstimateSummary, RunSummary, RunSummaryBuilder};
pub use runtime::{SimulationEngine, SimulationEngineBuilder};
pub use session::{ActiveRun, RunStore};
pub use simulator::SimulationRun;
