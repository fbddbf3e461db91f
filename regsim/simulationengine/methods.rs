use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Regression coefficient a query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    /// Coefficient of `x` (true value `beta1`).
    Slope,
    /// Constant term (true value `beta0`).
    Intercept,
}

impl Parameter {
    /// Label for logging and output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Slope => "slope",
            Self::Intercept => "intercept",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Parameter {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "slope" => Ok(Self::Slope),
            "intercept" => Ok(Self::Intercept),
            other => Err(SimulationError::invalid(
                "parameter",
                format!("expected `slope` or `intercept`, got `{other}`"),
            )),
        }
    }
}

/// Direction of a simulation-based hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    /// `>`: share of simulated values at or above the observed one.
    #[serde(rename = ">")]
    Greater,
    /// `<`: share of simulated values at or below the observed one.
    #[serde(rename = "<")]
    Less,
    /// `!=`: share of simulated values at least as far from the hypothesized value.
    #[serde(rename = "!=")]
    NotEqual,
}

impl TestType {
    /// Operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::Less => "<",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TestType {
    type Err = SimulationError;

    /// Accepts the operator symbols plus `gt`, `lt` and `ne` for shells where `<` and `>`
    /// are awkward to pass.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(Self::Greater),
            "<" | "lt" => Ok(Self::Less),
            "!=" | "ne" => Ok(Self::NotEqual),
            other => Err(SimulationError::invalid(
                "test_type",
                format!("expected one of `>`, `<`, `!=`, got `{other}`"),
            )),
        }
    }
}
