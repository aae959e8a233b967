//! Deterministic-equivalent and expected-value forms of a program.
//!
//! The extensive form stacks every scenario's second stage next to the
//! first stage with probability-weighted costs; it is the reference oracle
//! the decomposition must agree with. The expected-value problem collapses
//! the scenarios into their mean and is used by the EVP crash to pick a
//! starting point.

use crate::error::{EngineError, ShapeError};
use crate::program::StochasticProgram;
use lshaped_core::model::{Model, Variable};
use lshaped_core::solver::{SolveStatus, Solver};
use lshaped_core::RowId;
use std::collections::BTreeMap;

/// Build the deterministic equivalent of a program.
pub fn extensive_form(program: &StochasticProgram) -> Result<Model, EngineError> {
    program.validate()?;
    let mut model = Model::new();

    for variable in program.first_stage.variables() {
        model.add_variable(*variable)?;
    }
    for (_, row) in program.first_stage.rows() {
        model.add_row(row.indices.clone(), row.values.clone(), row.bounds)?;
    }

    for scenario in &program.scenarios {
        let offset = model.num_variables() as u32;
        for variable in scenario.model.variables() {
            model.add_variable(Variable::new(
                variable.bounds,
                scenario.probability * variable.cost,
            ))?;
        }

        // T·x + W·y lands in the scenario row bounds: merge the second-stage
        // coefficients (offset into the stacked columns) with the linkage
        // terms on the first-stage columns.
        for (row_id, row) in scenario.model.rows() {
            let mut entries: BTreeMap<u32, f64> = BTreeMap::new();
            for (&index, &value) in row.indices.iter().zip(&row.values) {
                *entries.entry(index + offset).or_insert(0.0) += value;
            }
            for link in scenario.links.iter().filter(|link| link.row == row_id) {
                *entries.entry(link.column as u32).or_insert(0.0) += link.coefficient;
            }
            let (indices, values): (Vec<u32>, Vec<f64>) = entries.into_iter().unzip();
            model.add_row(indices, values, row.bounds)?;
        }
    }
    Ok(model)
}

/// Build the expected-value problem: a single mean scenario.
///
/// Requires structurally identical scenarios (same column/row layout and
/// linkage pattern); values, bounds and costs are probability-averaged.
pub fn expected_value_model(program: &StochasticProgram) -> Result<Model, EngineError> {
    program.validate()?;
    let template = &program.scenarios[0];
    let total: f64 = program.scenarios.iter().map(|s| s.probability).sum();

    for (index, scenario) in program.scenarios.iter().enumerate() {
        if scenario.model.num_variables() != template.model.num_variables()
            || scenario.model.num_rows() != template.model.num_rows()
            || scenario.links.len() != template.links.len()
        {
            return Err(ShapeError::EvpStructureMismatch {
                detail: format!(
                    "scenario {} shape ({} columns, {} rows, {} links) differs from scenario 0",
                    index,
                    scenario.model.num_variables(),
                    scenario.model.num_rows(),
                    scenario.links.len()
                ),
            }
            .into());
        }
    }

    // Mean scenario assembled on the template's layout.
    let mut mean = StochasticProgram::new(program.first_stage.clone());
    let mut model = Model::new();
    for (column, variable) in template.model.variables().iter().enumerate() {
        let cost = program
            .scenarios
            .iter()
            .map(|s| s.probability * s.model.variables()[column].cost)
            .sum::<f64>()
            / total;
        model.add_variable(Variable::new(variable.bounds, cost))?;
    }

    let template_rows: Vec<(RowId, _)> = template.model.rows().collect();
    let per_scenario_rows: Vec<Vec<(RowId, &lshaped_core::model::Row)>> = program
        .scenarios
        .iter()
        .map(|s| s.model.rows().collect())
        .collect();

    for (position, (_, template_row)) in template_rows.iter().enumerate() {
        let mut bounds = template_row.bounds;
        if bounds.lower.is_finite() || bounds.upper.is_finite() {
            let mut lower = 0.0;
            let mut upper = 0.0;
            for (scenario, rows) in program.scenarios.iter().zip(&per_scenario_rows) {
                let row = rows[position].1;
                if row.bounds.lower.is_finite() != bounds.lower.is_finite()
                    || row.bounds.upper.is_finite() != bounds.upper.is_finite()
                {
                    return Err(ShapeError::EvpStructureMismatch {
                        detail: format!("row {} bound pattern differs across scenarios", position),
                    }
                    .into());
                }
                lower += scenario.probability * row.bounds.lower;
                upper += scenario.probability * row.bounds.upper;
            }
            if bounds.lower.is_finite() {
                bounds.lower = lower / total;
            }
            if bounds.upper.is_finite() {
                bounds.upper = upper / total;
            }
        }
        model.add_row(
            template_row.indices.clone(),
            template_row.values.clone(),
            bounds,
        )?;
    }

    let mut links = template.links.clone();
    for (position, link) in links.iter_mut().enumerate() {
        link.coefficient = program
            .scenarios
            .iter()
            .map(|s| s.probability * s.links[position].coefficient)
            .sum::<f64>()
            / total;
    }

    let row_ids: Vec<RowId> = model.rows().map(|(id, _)| id).collect();
    for (position, link) in links.iter_mut().enumerate() {
        // Rebind to the rebuilt model's row ids by position.
        let template_position = template
            .model
            .row_position(template.links[position].row)
            .expect("validated link row");
        link.row = row_ids[template_position];
    }

    mean.add_scenario(crate::program::Scenario::new(1.0, model, links));
    extensive_form(&mean)
}

/// EVP crash: solve the expected-value problem and return its first stage.
pub(crate) fn evp_point<S: Solver>(
    program: &StochasticProgram,
    solver: &mut S,
) -> Result<Vec<f64>, EngineError> {
    let model = expected_value_model(program)?;
    let solution = solver.solve(&model)?;
    if solution.status != SolveStatus::Optimal {
        return Err(ShapeError::EvpStructureMismatch {
            detail: format!("expected-value problem ended with status '{}'", solution.status),
        }
        .into());
    }
    let n_first = program.first_stage_columns();
    tracing::debug!(
        component = "engine",
        operation = "crash",
        status = "success",
        objective = solution.objective,
        "EVP crash produced a starting point"
    );
    Ok(solution.primal[..n_first].to_vec())
}
