use serde::{Deserialize, Serialize};

use crate::{
    error::{SimulationError, SimulationResult},
    methods::Parameter,
    simulator::SimulationRun,
};

/// Percentile interval over simulated estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Coefficient the interval is for.
    pub parameter: Parameter,
    /// Requested level in percent.
    pub level_percent: f64,
    /// Mean of the simulated estimates.
    pub mean: f64,
    /// Lower bound, the `(100 - level) / 2` percentile.
    pub lower: f64,
    /// Upper bound, the `(100 + level) / 2` percentile.
    pub upper: f64,
    /// True coefficient the interval is checked against.
    pub true_value: f64,
    /// Whether `lower <= true_value <= upper`.
    pub includes_true: bool,
}

impl ConfidenceInterval {
    /// Distance between the bounds.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; `NaN` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Percentile of ascending `sorted` data, interpolating linearly between the two closest
/// ranks. `pct` is clamped to `[0, 100]`. `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = pct.clamp(0.0, 100.0) / 100.0 * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let weight = rank - lo as f64;
    Some((sorted[hi] - sorted[lo]).mul_add(weight, sorted[lo]))
}

/// Converts a percent level in `(0, 100)` to a fraction.
pub fn level_fraction(level_percent: f64) -> SimulationResult<f64> {
    if level_percent.is_finite() && level_percent > 0.0 && level_percent < 100.0 {
        Ok(level_percent / 100.0)
    } else {
        Err(SimulationError::invalid(
            "confidence_level",
            format!("must lie strictly between 0 and 100, got {level_percent}"),
        ))
    }
}

/// Empirical percentile interval for `parameter` at `level_percent`.
///
/// This is not a t interval: bounds are read off the simulated distribution directly.
pub fn confidence_interval(
    run: &SimulationRun,
    parameter: Parameter,
    level_percent: f64,
) -> SimulationResult<ConfidenceInterval> {
    let c = level_fraction(level_percent)?;
    interval_at(run, parameter, level_percent, c)
}

/// Interval at an already validated level; `c` is `level_percent / 100`.
pub(crate) fn interval_at(
    run: &SimulationRun,
    parameter: Parameter,
    level_percent: f64,
    c: f64,
) -> SimulationResult<ConfidenceInterval> {
    run.ensure_ready()?;
    let estimates = run.estimates(parameter);
    let mut sorted = estimates.to_vec();
    sorted.sort_by(f64::total_cmp);

    let bound = |pct: f64| percentile(&sorted, pct).ok_or(SimulationError::MissingRunState);
    let lower = bound((1.0 - c) / 2.0 * 100.0)?;
    let upper = bound((1.0 + c) / 2.0 * 100.0)?;
    let true_value = run.true_value(parameter);
    Ok(ConfidenceInterval {
        parameter,
        level_percent,
        mean: mean(estimates),
        lower,
        upper,
        true_value,
        includes_true: lower <= true_value && true_value <= upper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_generator::{DataGenerator, Dataset, FitResult},
        helper::seeded_rng,
        params::ModelParameters,
        simulator::Simulator,
    };
    use proptest::prelude::*;

    fn fixed_run(slopes: Vec<f64>) -> SimulationRun {
        let intercepts = slopes.iter().map(|s| s * 2.0).collect();
        let params = ModelParameters::builder()
            .beta1(3.0)
            .s(slopes.len())
            .build()
            .unwrap();
        SimulationRun::from_parts(params, Dataset::default(), FitResult::default(), slopes, intercepts)
            .unwrap()
    }

    fn simulated_run() -> SimulationRun {
        let params = ModelParameters::builder()
            .n(50)
            .beta0(2.0)
            .beta1(3.0)
            .s(1000)
            .build()
            .unwrap();
        Simulator::new(DataGenerator::new(params).unwrap(), true, None).run(&mut seeded_rng(21))
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 0.0), Some(1.0));
        assert_eq!(percentile(&data, 100.0), Some(4.0));
        assert!((percentile(&data, 50.0).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile(&data, 2.5).unwrap() - 1.075).abs() < 1e-12);
        assert!((percentile(&data, 97.5).unwrap() - 3.925).abs() < 1e-12);
    }

    #[test]
    fn percentile_of_nothing_is_none() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn mean_and_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(std_dev(&values), 2.0);
    }

    #[test]
    fn single_trial_collapses_interval() {
        let run = fixed_run(vec![2.75]);
        for level in [1.0, 50.0, 95.0, 99.9] {
            let ci = confidence_interval(&run, Parameter::Slope, level).unwrap();
            assert_eq!(ci.lower, 2.75);
            assert_eq!(ci.upper, 2.75);
            assert_eq!(ci.mean, 2.75);
            assert!(!ci.includes_true);
        }
    }

    #[test]
    fn rejects_levels_outside_open_range() {
        let run = fixed_run(vec![1.0, 2.0]);
        for level in [0.0, 100.0, -5.0, 150.0, f64::NAN] {
            let err = confidence_interval(&run, Parameter::Slope, level).unwrap_err();
            assert_eq!(err.field(), Some("confidence_level"));
        }
    }

    #[test]
    fn bounds_bracket_mean_and_widen_with_level() {
        let run = simulated_run();
        let mut previous: Option<ConfidenceInterval> = None;
        for level in [50.0, 80.0, 90.0, 95.0, 99.0, 99.9] {
            for parameter in [Parameter::Slope, Parameter::Intercept] {
                let ci = confidence_interval(&run, parameter, level).unwrap();
                assert!(ci.lower <= ci.mean && ci.mean <= ci.upper, "{ci:?}");
            }
            let ci = confidence_interval(&run, Parameter::Slope, level).unwrap();
            if let Some(prev) = previous {
                assert!(ci.lower <= prev.lower);
                assert!(ci.upper >= prev.upper);
                assert!(ci.width() >= prev.width());
            }
            previous = Some(ci);
        }
    }

    #[test]
    fn interval_uses_true_coefficient() {
        let run = simulated_run();
        let ci = confidence_interval(&run, Parameter::Slope, 95.0).unwrap();
        assert_eq!(ci.true_value, 3.0);
        assert!(ci.includes_true);
        assert!((ci.mean - 3.0).abs() < 0.1);
        let ci = confidence_interval(&run, Parameter::Intercept, 95.0).unwrap();
        assert_eq!(ci.true_value, 2.0);
        assert!(ci.includes_true);
    }

    fn estimates() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec((-4000i32..4000).prop_map(|v| f64::from(v) / 8.0), 1..200)
    }

    proptest! {
        #[test]
        fn wider_level_contains_narrower(
            slopes in estimates(),
            a in 0.1f64..99.9,
            b in 0.1f64..99.9,
        ) {
            let (narrow, wide) = if a <= b { (a, b) } else { (b, a) };
            let run = fixed_run(slopes);
            for parameter in [Parameter::Slope, Parameter::Intercept] {
                let inner = confidence_interval(&run, parameter, narrow).unwrap();
                let outer = confidence_interval(&run, parameter, wide).unwrap();
                prop_assert!(inner.lower <= inner.upper);
                prop_assert!(outer.lower <= inner.lower, "{outer:?} {inner:?}");
                prop_assert!(outer.upper >= inner.upper, "{outer:?} {inner:?}");
            }
        }

        #[test]
        fn percentile_stays_within_data(values in estimates(), pct in 0.0f64..=100.0) {
            let mut sorted = values;
            sorted.sort_by(f64::total_cmp);
            let value = percentile(&sorted, pct).unwrap();
            prop_assert!(sorted[0] <= value && value <= sorted[sorted.len() - 1]);
        }
    }
}
