use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::ValidationError;

/// Population and run parameters for a [`crate::SimulationEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_agents: usize,
    /// Uniform range each agent's budget is re-rolled from every step.
    pub budget_range: (f64, f64),
    /// Uniform range agent price sensitivities are drawn from at creation.
    pub sensitivity_range: (f64, f64),
    pub max_items_per_agent: usize,
    /// Seed for the engine's own random stream.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_agents: 100,
            budget_range: (20.0, 100.0),
            sensitivity_range: (0.2, 0.8),
            max_items_per_agent: 3,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn with_agents(mut self, num_agents: usize) -> Self {
        self.num_agents = num_agents;
        self
    }

    pub fn with_budget_range(mut self, min: f64, max: f64) -> Self {
        self.budget_range = (min, max);
        self
    }

    pub fn with_sensitivity_range(mut self, min: f64, max: f64) -> Self {
        self.sensitivity_range = (min, max);
        self
    }

    pub fn with_max_items(mut self, max_items_per_agent: usize) -> Self {
        self.max_items_per_agent = max_items_per_agent;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let (b_min, b_max) = check_range("budget_range", self.budget_range)?;
        if b_min <= 0.0 {
            return Err(ValidationError::RangeOutOfBounds {
                field: "budget_range",
                min: b_min,
                max: b_max,
            });
        }

        let (s_min, s_max) = check_range("sensitivity_range", self.sensitivity_range)?;
        if s_min <= 0.0 || s_max >= 1.0 {
            return Err(ValidationError::RangeOutOfBounds {
                field: "sensitivity_range",
                min: s_min,
                max: s_max,
            });
        }

        Ok(())
    }
}

pub(crate) fn check_range(
    field: &'static str,
    (min, max): (f64, f64),
) -> Result<(f64, f64), ValidationError> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(ValidationError::InvalidRange { field, min, max });
    }
    Ok((min, max))
}
