//! Front-end container for a two-stage stochastic program.
//!
//! The modeling layer that produces cost vectors, bounds and scenario data
//! is out of scope; this container is the handoff point. The first stage is
//! a plain model (costs, bounds, rows), each scenario is a second-stage
//! model plus the linkage terms `T_i·x` that push the first-stage decision
//! into its right-hand side.

use crate::error::{EngineError, ShapeError};
use lshaped_core::model::Model;
use lshaped_core::subproblem::Linkage;

/// One second-stage scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub probability: f64,
    pub model: Model,
    pub links: Vec<Linkage>,
}

impl Scenario {
    pub fn new(probability: f64, model: Model, links: Vec<Linkage>) -> Self {
        Self {
            probability,
            model,
            links,
        }
    }
}

/// A two-stage stochastic program.
#[derive(Debug, Clone)]
pub struct StochasticProgram {
    pub first_stage: Model,
    pub scenarios: Vec<Scenario>,
}

impl StochasticProgram {
    pub fn new(first_stage: Model) -> Self {
        Self {
            first_stage,
            scenarios: Vec::new(),
        }
    }

    /// Append a scenario, returning its index.
    pub fn add_scenario(&mut self, scenario: Scenario) -> usize {
        self.scenarios.push(scenario);
        self.scenarios.len() - 1
    }

    pub fn num_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    /// Width of the first-stage decision.
    pub fn first_stage_columns(&self) -> usize {
        self.first_stage.num_variables()
    }

    /// Validate shape: scenarios present, probabilities usable, linkage
    /// columns and rows in range. Ranged rows cannot occur; the model
    /// container rejects them at construction.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.scenarios.is_empty() {
            return Err(ShapeError::NoScenarios.into());
        }

        let n_first = self.first_stage_columns();
        let mut total_probability = 0.0;
        for (index, scenario) in self.scenarios.iter().enumerate() {
            if !scenario.probability.is_finite() || scenario.probability <= 0.0 {
                return Err(ShapeError::InvalidProbability {
                    scenario: index,
                    probability: scenario.probability,
                }
                .into());
            }
            total_probability += scenario.probability;

            for link in &scenario.links {
                if link.column >= n_first {
                    return Err(EngineError::Model(
                        lshaped_core::model::ModelError::InvalidColumn {
                            column: link.column,
                            num_variables: n_first,
                        },
                    ));
                }
                scenario.model.get_row(link.row)?;
            }
        }

        if (total_probability - 1.0).abs() > 1e-6 {
            tracing::warn!(
                component = "program",
                operation = "validate",
                status = "warn",
                total_probability,
                "Scenario probabilities do not sum to one"
            );
        }
        Ok(())
    }
}
