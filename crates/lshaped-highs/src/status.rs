//! Status mapping from HiGHS to the solver contract.

use highs::HighsModelStatus;
use lshaped_core::solver::SolveStatus;

/// Collapse the HiGHS model status onto the contract's four states.
pub(crate) fn map_status(status: HighsModelStatus) -> SolveStatus {
    match status {
        HighsModelStatus::Optimal => SolveStatus::Optimal,
        HighsModelStatus::Infeasible => SolveStatus::Infeasible,
        HighsModelStatus::Unbounded => SolveStatus::Unbounded,
        _ => SolveStatus::Other,
    }
}
