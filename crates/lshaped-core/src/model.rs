//! Minimize-only LP/QP container handed to solver adapters.
//!
//! The decomposition engines mutate a model in place across iterations:
//! cut rows come and go, variable bounds tighten under a trust region, and
//! the regularized variant installs a quadratic diagonal. Rows are keyed by
//! stable [`RowId`]s so deletions never invalidate linkage references, and
//! adapters iterate rows in ascending id order, which fixes the dual
//! vector layout.
//!
//! Ranged rows (both bounds finite and distinct) are rejected; equality and
//! one-sided rows are the only supported row shapes.

use crate::ids::RowId;
use std::collections::BTreeMap;

/// Bounds for a variable or row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Unbounded in both directions.
    pub fn free() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// `value ≥ lower`.
    pub fn at_least(lower: f64) -> Self {
        Self::new(lower, f64::INFINITY)
    }

    /// `value ≤ upper`.
    pub fn at_most(upper: f64) -> Self {
        Self::new(f64::NEG_INFINITY, upper)
    }

    /// `value = target`.
    pub fn fixed(target: f64) -> Self {
        Self::new(target, target)
    }

    /// Both bounds finite and distinct.
    pub fn is_ranged(self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower < self.upper
    }

    /// Both bounds finite and equal.
    pub fn is_equality(self) -> bool {
        self.lower.is_finite() && self.lower == self.upper
    }

    /// Shift both finite bounds by `delta`.
    pub fn shifted(self, delta: f64) -> Self {
        let lower = if self.lower.is_finite() {
            self.lower + delta
        } else {
            self.lower
        };
        let upper = if self.upper.is_finite() {
            self.upper + delta
        } else {
            self.upper
        };
        Self::new(lower, upper)
    }
}

/// A first- or second-stage decision variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable {
    pub bounds: Bounds,
    pub cost: f64,
}

impl Variable {
    pub fn new(bounds: Bounds, cost: f64) -> Self {
        Self { bounds, cost }
    }
}

/// A sparse row with its bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
    pub bounds: Bounds,
}

/// Errors that can occur during model operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Variable bounds with lower > upper.
    InvalidVariableBounds { lower: f64, upper: f64 },
    /// Column index outside the model.
    InvalidColumn { column: usize, num_variables: usize },
    /// Row id does not exist (or was deleted).
    InvalidRowId(RowId),
    /// Ranged row: both bounds finite and distinct.
    RangedRow { lower: f64, upper: f64 },
    /// Row bounds with lower > upper.
    InvalidRowBounds { lower: f64, upper: f64 },
    /// indices and values length mismatch.
    LengthMismatch { indices: usize, values: usize },
    /// Non-finite coefficient in a row or objective.
    InvalidCoefficient { value: f64 },
}

impl ModelError {
    /// Returns a semantic error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::InvalidVariableBounds { .. } => "VARIABLE_INVALID_BOUNDS",
            ModelError::InvalidColumn { .. } => "COLUMN_INVALID_INDEX",
            ModelError::InvalidRowId(_) => "ROW_INVALID_ID",
            ModelError::RangedRow { .. } => "ROW_RANGED",
            ModelError::InvalidRowBounds { .. } => "ROW_INVALID_BOUNDS",
            ModelError::LengthMismatch { .. } => "ROW_LENGTH_MISMATCH",
            ModelError::InvalidCoefficient { .. } => "COEFFICIENT_INVALID",
        }
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::InvalidVariableBounds { lower, upper } => write!(
                f,
                "[{}] Variable bounds invalid: lower ({}) > upper ({})",
                self.code(),
                lower,
                upper
            ),
            ModelError::InvalidColumn {
                column,
                num_variables,
            } => write!(
                f,
                "[{}] Column {} out of range (model has {} variables)",
                self.code(),
                column,
                num_variables
            ),
            ModelError::InvalidRowId(id) => {
                write!(f, "[{}] Row {} does not exist", self.code(), id.inner())
            }
            ModelError::RangedRow { lower, upper } => write!(
                f,
                "[{}] Ranged rows are not supported: [{}, {}]",
                self.code(),
                lower,
                upper
            ),
            ModelError::InvalidRowBounds { lower, upper } => write!(
                f,
                "[{}] Row bounds invalid: lower ({}) > upper ({})",
                self.code(),
                lower,
                upper
            ),
            ModelError::LengthMismatch { indices, values } => write!(
                f,
                "[{}] indices length ({}) must match values length ({})",
                self.code(),
                indices,
                values
            ),
            ModelError::InvalidCoefficient { value } => {
                write!(f, "[{}] Coefficient must be finite (got {})", self.code(), value)
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// A mutable linear (optionally diagonally quadratic) minimization model.
#[derive(Debug, Clone, Default)]
pub struct Model {
    variables: Vec<Variable>,
    quadratic: Vec<f64>,
    rows: BTreeMap<RowId, Row>,
    next_row_id: u32,
}

impl Model {
    /// Create a new empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, returning its column index.
    pub fn add_variable(&mut self, variable: Variable) -> Result<usize, ModelError> {
        if variable.bounds.lower > variable.bounds.upper {
            return Err(ModelError::InvalidVariableBounds {
                lower: variable.bounds.lower,
                upper: variable.bounds.upper,
            });
        }
        if !variable.cost.is_finite() {
            return Err(ModelError::InvalidCoefficient {
                value: variable.cost,
            });
        }
        self.variables.push(variable);
        self.quadratic.push(0.0);
        Ok(self.variables.len() - 1)
    }

    /// Add a sparse row, returning its stable id.
    pub fn add_row(
        &mut self,
        indices: Vec<u32>,
        values: Vec<f64>,
        bounds: Bounds,
    ) -> Result<RowId, ModelError> {
        if indices.len() != values.len() {
            return Err(ModelError::LengthMismatch {
                indices: indices.len(),
                values: values.len(),
            });
        }
        if bounds.lower > bounds.upper {
            return Err(ModelError::InvalidRowBounds {
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        if bounds.is_ranged() {
            return Err(ModelError::RangedRow {
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        for &index in &indices {
            if index as usize >= self.variables.len() {
                return Err(ModelError::InvalidColumn {
                    column: index as usize,
                    num_variables: self.variables.len(),
                });
            }
        }
        for &value in &values {
            if !value.is_finite() {
                return Err(ModelError::InvalidCoefficient { value });
            }
        }

        // Normalize: merge duplicate columns, drop exact zeros, sort
        // ascending. Adapters rely on rows being duplicate-free.
        let mut merged: BTreeMap<u32, f64> = BTreeMap::new();
        for (&index, &value) in indices.iter().zip(&values) {
            *merged.entry(index).or_insert(0.0) += value;
        }
        let (indices, values): (Vec<u32>, Vec<f64>) =
            merged.into_iter().filter(|&(_, v)| v != 0.0).unzip();

        let id = RowId::new(self.next_row_id);
        self.next_row_id += 1;
        self.rows.insert(
            id,
            Row {
                indices,
                values,
                bounds,
            },
        );

        tracing::trace!(
            component = "model",
            operation = "add_row",
            status = "success",
            row_id = id.inner(),
            lower = bounds.lower,
            upper = bounds.upper,
            "Added row"
        );
        Ok(id)
    }

    /// Replace a row's bounds (subproblem RHS pushes).
    pub fn set_row_bounds(&mut self, id: RowId, bounds: Bounds) -> Result<(), ModelError> {
        if bounds.lower > bounds.upper {
            return Err(ModelError::InvalidRowBounds {
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        let row = self.rows.get_mut(&id).ok_or(ModelError::InvalidRowId(id))?;
        row.bounds = bounds;
        Ok(())
    }

    /// Replace a variable's bounds (trust-region box).
    pub fn set_variable_bounds(&mut self, column: usize, bounds: Bounds) -> Result<(), ModelError> {
        if bounds.lower > bounds.upper {
            return Err(ModelError::InvalidVariableBounds {
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        let var = self
            .variables
            .get_mut(column)
            .ok_or(ModelError::InvalidColumn {
                column,
                num_variables: self.quadratic.len(),
            })?;
        var.bounds = bounds;
        Ok(())
    }

    /// Replace a variable's linear cost.
    pub fn set_cost(&mut self, column: usize, cost: f64) -> Result<(), ModelError> {
        if !cost.is_finite() {
            return Err(ModelError::InvalidCoefficient { value: cost });
        }
        let num_variables = self.variables.len();
        let var = self
            .variables
            .get_mut(column)
            .ok_or(ModelError::InvalidColumn {
                column,
                num_variables,
            })?;
        var.cost = cost;
        Ok(())
    }

    /// Set the quadratic diagonal weight for a column.
    ///
    /// The objective reads `½ Σ quadratic[j]·x_j² + Σ cost[j]·x_j`.
    pub fn set_quadratic(&mut self, column: usize, weight: f64) -> Result<(), ModelError> {
        if !weight.is_finite() {
            return Err(ModelError::InvalidCoefficient { value: weight });
        }
        let num_variables = self.variables.len();
        let slot = self
            .quadratic
            .get_mut(column)
            .ok_or(ModelError::InvalidColumn {
                column,
                num_variables,
            })?;
        *slot = weight;
        Ok(())
    }

    /// True if any quadratic diagonal entry is nonzero.
    pub fn has_quadratic(&self) -> bool {
        self.quadratic.iter().any(|&w| w != 0.0)
    }

    /// Delete a row by id.
    pub fn delete_row(&mut self, id: RowId) -> Result<(), ModelError> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(ModelError::InvalidRowId(id))
    }

    /// Delete a set of rows; ids that no longer exist are ignored.
    pub fn delete_rows(&mut self, ids: &[RowId]) {
        for id in ids {
            self.rows.remove(id);
        }
    }

    /// Get a row by id.
    pub fn get_row(&self, id: RowId) -> Result<&Row, ModelError> {
        self.rows.get(&id).ok_or(ModelError::InvalidRowId(id))
    }

    /// Iterate rows in ascending id order (the adapters' dual layout).
    pub fn rows(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    /// Rank of a row id among live rows, matching the adapters' dual layout.
    pub fn row_position(&self, id: RowId) -> Option<usize> {
        if !self.rows.contains_key(&id) {
            return None;
        }
        Some(self.rows.range(..id).count())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn quadratic(&self) -> &[f64] {
        &self.quadratic
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Linear cost vector evaluated at a point.
    pub fn linear_objective(&self, x: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(x)
            .map(|(var, value)| var.cost * value)
            .sum()
    }
}
