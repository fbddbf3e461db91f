use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};

/// Parameters of the generative model and the number of trials to run.
///
/// Observations follow `y = beta0 + beta1 * x + e` with `x ~ U[0, 1)` and
/// `e ~ Normal(mu * x, sigma2)`. A non-zero `mu` therefore shifts the expected slope by `mu`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Observations per dataset.
    #[serde(alias = "N")]
    pub n: usize,
    /// Coefficient of `x` in the noise mean.
    pub mu: f64,
    /// True intercept.
    pub beta0: f64,
    /// True slope.
    pub beta1: f64,
    /// Noise variance.
    pub sigma2: f64,
    /// Number of simulated trials.
    #[serde(alias = "S")]
    pub s: usize,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            n: 100,
            mu: 0.0,
            beta0: 0.0,
            beta1: 1.0,
            sigma2: 1.0,
            s: 1000,
        }
    }
}

impl ModelParameters {
    /// Returns a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> ModelParametersBuilder {
        ModelParametersBuilder::default()
    }

    /// Loads parameters from a TOML file. Missing keys take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading parameters {}", path.display()))?;
        let params: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        params.validate()?;
        Ok(params)
    }

    /// Checks every constraint, reporting the first offending field.
    pub fn validate(&self) -> SimulationResult<()> {
        if self.n < 2 {
            return Err(SimulationError::invalid(
                "n",
                format!("need at least 2 observations to fit a line, got {}", self.n),
            ));
        }
        if self.s < 1 {
            return Err(SimulationError::invalid("s", "need at least 1 simulation trial"));
        }
        for (field, value) in [("mu", self.mu), ("beta0", self.beta0), ("beta1", self.beta1)] {
            if !value.is_finite() {
                return Err(SimulationError::invalid(field, format!("must be finite, got {value}")));
            }
        }
        if !self.sigma2.is_finite() || self.sigma2 < 0.0 {
            return Err(SimulationError::invalid(
                "sigma2",
                format!("must be a finite non-negative variance, got {}", self.sigma2),
            ));
        }
        Ok(())
    }

    /// Standard deviation of the noise term.
    #[must_use]
    pub fn noise_std_dev(&self) -> f64 {
        self.sigma2.sqrt()
    }

    /// Data points drawn by a full run (observed dataset plus every trial).
    #[must_use]
    pub const fn total_draws(&self) -> usize {
        self.n.saturating_mul(self.s.saturating_add(1))
    }
}

/// Builder for [`ModelParameters`].
#[derive(Debug, Clone, Default)]
pub struct ModelParametersBuilder {
    params: ModelParameters,
}

impl ModelParametersBuilder {
    /// Sets the sample size.
    #[must_use]
    pub const fn n(mut self, n: usize) -> Self {
        self.params.n = n;
        self
    }

    /// Sets the noise-mean drift.
    #[must_use]
    pub const fn mu(mut self, mu: f64) -> Self {
        self.params.mu = mu;
        self
    }

    /// Sets the true intercept.
    #[must_use]
    pub const fn beta0(mut self, beta0: f64) -> Self {
        self.params.beta0 = beta0;
        self
    }

    /// Sets the true slope.
    #[must_use]
    pub const fn beta1(mut self, beta1: f64) -> Self {
        self.params.beta1 = beta1;
        self
    }

    /// Sets the noise variance.
    #[must_use]
    pub const fn sigma2(mut self, sigma2: f64) -> Self {
        self.params.sigma2 = sigma2;
        self
    }

    /// Sets the number of trials.
    #[must_use]
    pub const fn s(mut self, s: usize) -> Self {
        self.params.s = s;
        self
    }

    /// Validates and returns the parameters.
    pub fn build(self) -> SimulationResult<ModelParameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}
