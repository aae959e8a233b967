//! Status mapping from Clarabel to the solver contract.

use clarabel::solver::SolverStatus as ClarabelStatus;
use lshaped_core::solver::SolveStatus;

/// Collapse Clarabel's status onto the contract's four states. The
/// `Almost*` outcomes are close enough to act on; they map to their exact
/// counterparts with a warning.
pub(crate) fn map_status(status: ClarabelStatus) -> SolveStatus {
    match status {
        ClarabelStatus::Solved => SolveStatus::Optimal,
        ClarabelStatus::PrimalInfeasible => SolveStatus::Infeasible,
        ClarabelStatus::DualInfeasible => SolveStatus::Unbounded,
        ClarabelStatus::AlmostSolved => {
            tracing::warn!(
                component = "solver",
                operation = "solve",
                status = "warn",
                solver = "clarabel",
                "Clarabel reported AlmostSolved; treating as optimal"
            );
            SolveStatus::Optimal
        }
        ClarabelStatus::AlmostPrimalInfeasible => {
            tracing::warn!(
                component = "solver",
                operation = "solve",
                status = "warn",
                solver = "clarabel",
                "Clarabel reported AlmostPrimalInfeasible; treating as infeasible"
            );
            SolveStatus::Infeasible
        }
        ClarabelStatus::AlmostDualInfeasible => {
            tracing::warn!(
                component = "solver",
                operation = "solve",
                status = "warn",
                solver = "clarabel",
                "Clarabel reported AlmostDualInfeasible; treating as unbounded"
            );
            SolveStatus::Unbounded
        }
        _ => SolveStatus::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_statuses() {
        assert_eq!(map_status(ClarabelStatus::Solved), SolveStatus::Optimal);
        assert_eq!(
            map_status(ClarabelStatus::PrimalInfeasible),
            SolveStatus::Infeasible
        );
        assert_eq!(
            map_status(ClarabelStatus::DualInfeasible),
            SolveStatus::Unbounded
        );
        assert_eq!(map_status(ClarabelStatus::MaxIterations), SolveStatus::Other);
        assert_eq!(map_status(ClarabelStatus::NumericalError), SolveStatus::Other);
    }

    #[test]
    fn test_almost_statuses_map_to_exact() {
        assert_eq!(map_status(ClarabelStatus::AlmostSolved), SolveStatus::Optimal);
        assert_eq!(
            map_status(ClarabelStatus::AlmostPrimalInfeasible),
            SolveStatus::Infeasible
        );
        assert_eq!(
            map_status(ClarabelStatus::AlmostDualInfeasible),
            SolveStatus::Unbounded
        );
    }
}
