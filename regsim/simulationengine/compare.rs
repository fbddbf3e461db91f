use serde::{Deserialize, Serialize};

use crate::{
    error::SimulationResult,
    methods::{Parameter, TestType},
    simulator::SimulationRun,
};

/// Share of simulated estimates larger in magnitude than the observed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremeProportions {
    /// Fraction of `|slope_i| > |observed slope|`.
    pub slope: f64,
    /// Fraction of `|intercept_i| > |observed intercept|`.
    pub intercept: f64,
}

/// Result of a simulation-based hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisTestOutcome {
    /// Coefficient tested.
    pub parameter: Parameter,
    /// Test direction.
    pub test_type: TestType,
    /// Observed estimate.
    pub observed: f64,
    /// True model coefficient used as the null value.
    pub hypothesized: f64,
    /// Simulated values at least as extreme as the observed one.
    pub extreme_count: usize,
    /// Number of simulated values.
    pub trials: usize,
    /// `extreme_count / trials`.
    pub p_value: f64,
}

#[allow(clippy::cast_precision_loss)]
fn fraction(count: usize, total: usize) -> f64 {
    count as f64 / total as f64
}

/// Strict-magnitude comparison used right after generation, centered on zero.
pub fn extreme_proportions(run: &SimulationRun) -> SimulationResult<ExtremeProportions> {
    run.ensure_ready()?;
    let share = |values: &[f64], observed: f64| {
        let count = values.iter().filter(|v| v.abs() > observed.abs()).count();
        fraction(count, values.len())
    };
    let observed = run.observed();
    Ok(ExtremeProportions {
        slope: share(run.slopes(), observed.slope),
        intercept: share(run.intercepts(), observed.intercept),
    })
}

/// Computes the p-value of the observed estimate against the simulated distribution.
///
/// All comparisons are inclusive. The two-sided test measures distance from the true
/// coefficient, not from zero.
pub fn hypothesis_test(
    run: &SimulationRun,
    parameter: Parameter,
    test_type: TestType,
) -> SimulationResult<HypothesisTestOutcome> {
    run.ensure_ready()?;
    let simulated = run.estimates(parameter);
    let observed = run.observed_value(parameter);
    let hypothesized = run.true_value(parameter);
    let extreme_count = match test_type {
        TestType::Greater => simulated.iter().filter(|&&v| v >= observed).count(),
        TestType::Less => simulated.iter().filter(|&&v| v <= observed).count(),
        TestType::NotEqual => {
            let observed_gap = (observed - hypothesized).abs();
            simulated
                .iter()
                .filter(|&&v| (v - hypothesized).abs() >= observed_gap)
                .count()
        }
    };
    Ok(HypothesisTestOutcome {
        parameter,
        test_type,
        observed,
        hypothesized,
        extreme_count,
        trials: simulated.len(),
        p_value: fraction(extreme_count, simulated.len()),
    })
}
