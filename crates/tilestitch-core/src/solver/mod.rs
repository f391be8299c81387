//! Global optimisation: turning pairwise shifts into one consistent set of
//! view translations.

mod problem;
mod relaxation;

pub use problem::{GlobalOptimizer, GlobalProblem, GlobalSolution, LinkError, TransformModel};
pub use relaxation::RelaxationSolver;
