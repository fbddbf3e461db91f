use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{error::SimulationResult, params::ModelParameters};

/// One `(x, y)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Predictor value in `[0, 1)`.
    pub x: f64,
    /// Response value.
    pub y: f64,
}

/// Ordered observations drawn from the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    points: Vec<Observation>,
}

impl Dataset {
    /// Wraps existing observations.
    #[must_use]
    pub fn from_points(points: Vec<Observation>) -> Self {
        Self { points }
    }

    /// Observations in draw order.
    #[must_use]
    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the dataset holds no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Least-squares fit over the observations.
    #[must_use]
    pub fn fit(&self) -> FitResult {
        fit_ols(&self.points)
    }
}

/// Least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitResult {
    /// Estimated slope.
    pub slope: f64,
    /// Estimated intercept.
    pub intercept: f64,
}

impl FitResult {
    /// Value of the fitted line at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope.mul_add(x, self.intercept)
    }
}

/// Closed-form OLS fit of y on x.
///
/// When every `x` is identical the slope is not identified; the minimum-norm solution
/// (slope 0, intercept = mean of y) is returned instead. An empty slice yields the
/// default fit.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fit_ols(points: &[Observation]) -> FitResult {
    if points.is_empty() {
        return FitResult::default();
    }
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;
    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
        let dx = p.x - mean_x;
        (dx.mul_add(dx, sxx), dx.mul_add(p.y - mean_y, sxy))
    });
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    FitResult {
        slope,
        intercept: slope.mul_add(-mean_x, mean_y),
    }
}

/// Draws datasets from a validated [`ModelParameters`].
#[derive(Debug, Clone, Copy)]
pub struct DataGenerator {
    params: ModelParameters,
}

impl DataGenerator {
    /// Creates a generator after validating the parameters.
    pub fn new(params: ModelParameters) -> SimulationResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Parameters this generator samples from.
    #[must_use]
    pub const fn params(&self) -> &ModelParameters {
        &self.params
    }

    /// Draws one dataset and fits it.
    ///
    /// All `x` values are drawn before any noise term, so a given random stream always
    /// maps to the same dataset.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> (Dataset, FitResult) {
        let ModelParameters {
            n, mu, beta0, beta1, ..
        } = self.params;
        let sd = self.params.noise_std_dev();
        let xs: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
        let points = xs
            .into_iter()
            .map(|x| {
                let z: f64 = rng.sample(StandardNormal);
                let noise = sd.mul_add(z, mu * x);
                Observation {
                    x,
                    y: beta1.mul_add(x, beta0) + noise,
                }
            })
            .collect();
        let dataset = Dataset::from_points(points);
        let fit = dataset.fit();
        (dataset, fit)
    }
}

/// Validates `params`, then draws one dataset and its fit from `rng`.
pub fn generate<R: Rng + ?Sized>(
    params: ModelParameters,
    rng: &mut R,
) -> SimulationResult<(Dataset, FitResult)> {
    Ok(DataGenerator::new(params)?.generate(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::seeded_rng;

    fn params() -> ModelParameters {
        ModelParameters::builder()
            .n(50)
            .beta0(2.0)
            .beta1(3.0)
            .s(10)
            .build()
            .unwrap()
    }

    #[test]
    fn fits_exact_line() {
        let points: Vec<_> = [0.0, 0.25, 0.5, 1.0]
            .iter()
            .map(|&x| Observation { x, y: 1.5 - 2.0 * x })
            .collect();
        let fit = fit_ols(&points);
        assert!((fit.slope + 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.5).abs() < 1e-12);
        assert!((fit.predict(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn constant_x_falls_back_to_mean() {
        let points = vec![
            Observation { x: 0.3, y: 1.0 },
            Observation { x: 0.3, y: 3.0 },
        ];
        let fit = fit_ols(&points);
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 2.0);
        assert_eq!(fit_ols(&[]), FitResult::default());
    }

    #[test]
    fn generates_requested_size_in_unit_interval() {
        let (dataset, _) = generate(params(), &mut seeded_rng(1)).unwrap();
        assert_eq!(dataset.len(), 50);
        assert!(dataset.points().iter().all(|p| (0.0..1.0).contains(&p.x)));
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let (a, fit_a) = generate(params(), &mut seeded_rng(99)).unwrap();
        let (b, fit_b) = generate(params(), &mut seeded_rng(99)).unwrap();
        assert_eq!(a, b);
        assert_eq!(fit_a.slope.to_bits(), fit_b.slope.to_bits());
        assert_eq!(fit_a.intercept.to_bits(), fit_b.intercept.to_bits());
        let (c, _) = generate(params(), &mut seeded_rng(100)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn zero_variance_makes_noise_deterministic() {
        let params = ModelParameters::builder()
            .n(20)
            .mu(0.5)
            .beta0(-1.0)
            .beta1(2.0)
            .sigma2(0.0)
            .build()
            .unwrap();
        let (dataset, fit) = generate(params, &mut seeded_rng(3)).unwrap();
        for p in dataset.points() {
            assert!((p.y - (-1.0 + 2.5 * p.x)).abs() < 1e-12);
        }
        assert!((fit.slope - 2.5).abs() < 1e-9);
        assert!((fit.intercept + 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_single_observation() {
        let params = ModelParameters {
            n: 1,
            ..ModelParameters::default()
        };
        let err = generate(params, &mut seeded_rng(0)).unwrap_err();
        assert_eq!(err.field(), Some("n"));
    }
}
