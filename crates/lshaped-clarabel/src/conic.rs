//! Lowering from the model container to Clarabel's conic form.
//!
//! Every model row becomes exactly one backend row (ranged rows cannot
//! appear; the model rejects them), and every finite variable bound becomes
//! one more. Equalities land in the zero cone, inequalities in the
//! nonnegative cone, rewritten so the slack is `b − Ax`:
//!
//! ```text
//! a·x = rhs   →   a·x + s = rhs,   s ∈ {0}
//! a·x ≥ rhs   →  −a·x + s = −rhs,  s ≥ 0
//! a·x ≤ rhs   →   a·x + s = rhs,   s ≥ 0
//! ```
//!
//! [`RowLowering`] remembers which backend row a model row landed in and
//! with which orientation, so duals and certificates can be read back in
//! the ∂/∂rhs convention of the solver contract.

use clarabel::algebra::CscMatrix;
use clarabel::solver::SupportedConeT;
use lshaped_core::model::Model;

/// How one model row was lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowLowering {
    /// Zero-cone backend row at this index.
    Equality(usize),
    /// Negated nonnegative-cone backend row at this index.
    GreaterEqual(usize),
    /// Nonnegative-cone backend row at this index.
    LessEqual(usize),
    /// Both bounds infinite; no backend row.
    Free,
}

/// The assembled conic data for one solve.
pub(crate) struct ConicForm {
    pub quadratic: CscMatrix<f64>,
    pub linear: Vec<f64>,
    pub constraints: CscMatrix<f64>,
    pub rhs: Vec<f64>,
    pub cones: Vec<SupportedConeT<f64>>,
    /// One entry per model row, in ascending row-id order.
    pub row_lowerings: Vec<RowLowering>,
}

impl ConicForm {
    /// Infeasibility measure `b'z` of a certificate.
    pub fn certificate_value(&self, z: &[f64]) -> f64 {
        self.rhs.iter().zip(z).map(|(b, z)| b * z).sum()
    }

    /// Read optimal duals back per model row (∂objective/∂rhs).
    pub fn row_duals(&self, z: &[f64]) -> Vec<f64> {
        self.row_lowerings
            .iter()
            .map(|lowering| match *lowering {
                RowLowering::Equality(k) => -z[k],
                RowLowering::GreaterEqual(k) => z[k],
                RowLowering::LessEqual(k) => -z[k],
                RowLowering::Free => 0.0,
            })
            .collect()
    }

    /// Read an infeasibility certificate back per model row (∂V/∂rhs for
    /// the measure `V = b'z`).
    pub fn dual_ray(&self, z: &[f64]) -> Vec<f64> {
        self.row_lowerings
            .iter()
            .map(|lowering| match *lowering {
                RowLowering::Equality(k) => z[k],
                RowLowering::GreaterEqual(k) => -z[k],
                RowLowering::LessEqual(k) => z[k],
                RowLowering::Free => 0.0,
            })
            .collect()
    }
}

/// Append a row's cone, merging with the previous cone when adjacent and of
/// the same kind.
fn push_cone(cones: &mut Vec<SupportedConeT<f64>>, zero: bool) {
    match (cones.last_mut(), zero) {
        (Some(SupportedConeT::ZeroConeT(n)), true) => *n += 1,
        (Some(SupportedConeT::NonnegativeConeT(n)), false) => *n += 1,
        (_, true) => cones.push(SupportedConeT::ZeroConeT(1)),
        (_, false) => cones.push(SupportedConeT::NonnegativeConeT(1)),
    }
}

/// Lower a model into conic form.
pub(crate) fn lower(model: &Model) -> ConicForm {
    let n = model.num_variables();

    // Column-wise accumulation of the constraint matrix.
    let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut rhs = Vec::new();
    let mut cones = Vec::new();
    let mut row_lowerings = Vec::new();
    let mut next_backend_row = 0usize;

    let mut emit = |columns: &mut Vec<Vec<(usize, f64)>>,
                    rhs: &mut Vec<f64>,
                    cones: &mut Vec<SupportedConeT<f64>>,
                    entries: &[(u32, f64)],
                    b: f64,
                    zero: bool|
     -> usize {
        let backend_row = next_backend_row;
        next_backend_row += 1;
        for &(column, value) in entries {
            columns[column as usize].push((backend_row, value));
        }
        rhs.push(b);
        push_cone(cones, zero);
        backend_row
    };

    for (_, row) in model.rows() {
        let entries: Vec<(u32, f64)> = row
            .indices
            .iter()
            .copied()
            .zip(row.values.iter().copied())
            .collect();
        let bounds = row.bounds;
        let lowering = if bounds.is_equality() {
            let k = emit(&mut columns, &mut rhs, &mut cones, &entries, bounds.lower, true);
            RowLowering::Equality(k)
        } else if bounds.lower.is_finite() {
            let negated: Vec<(u32, f64)> = entries.iter().map(|&(c, v)| (c, -v)).collect();
            let k = emit(
                &mut columns,
                &mut rhs,
                &mut cones,
                &negated,
                -bounds.lower,
                false,
            );
            RowLowering::GreaterEqual(k)
        } else if bounds.upper.is_finite() {
            let k = emit(&mut columns, &mut rhs, &mut cones, &entries, bounds.upper, false);
            RowLowering::LessEqual(k)
        } else {
            RowLowering::Free
        };
        row_lowerings.push(lowering);
    }

    // Variable bounds as backend rows.
    for (column, variable) in model.variables().iter().enumerate() {
        let bounds = variable.bounds;
        let entry = [(column as u32, 1.0)];
        let negated = [(column as u32, -1.0)];
        if bounds.is_equality() {
            emit(&mut columns, &mut rhs, &mut cones, &entry, bounds.lower, true);
        } else {
            if bounds.lower.is_finite() {
                emit(
                    &mut columns,
                    &mut rhs,
                    &mut cones,
                    &negated,
                    -bounds.lower,
                    false,
                );
            }
            if bounds.upper.is_finite() {
                emit(&mut columns, &mut rhs, &mut cones, &entry, bounds.upper, false);
            }
        }
    }

    let m = next_backend_row;

    // Assemble CSC (columns already collected per variable).
    let mut colptr = Vec::with_capacity(n + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    let mut nnz = 0usize;
    for column in &mut columns {
        colptr.push(nnz);
        column.sort_by_key(|&(row, _)| row);
        for &(row, value) in column.iter() {
            rowval.push(row);
            nzval.push(value);
            nnz += 1;
        }
    }
    colptr.push(nnz);
    let constraints = CscMatrix::new(m, n, colptr, rowval, nzval);

    // Diagonal quadratic part (upper triangle is the diagonal itself).
    let mut p_colptr = Vec::with_capacity(n + 1);
    let mut p_rowval = Vec::new();
    let mut p_nzval = Vec::new();
    let mut p_nnz = 0usize;
    for (column, &weight) in model.quadratic().iter().enumerate() {
        p_colptr.push(p_nnz);
        if weight != 0.0 {
            p_rowval.push(column);
            p_nzval.push(weight);
            p_nnz += 1;
        }
    }
    p_colptr.push(p_nnz);
    let quadratic = CscMatrix::new(n, n, p_colptr, p_rowval, p_nzval);

    let linear = model.variables().iter().map(|v| v.cost).collect();

    ConicForm {
        quadratic,
        linear,
        constraints,
        rhs,
        cones,
        row_lowerings,
    }
}
