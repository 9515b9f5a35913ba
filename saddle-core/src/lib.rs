//! saddle: a compositional solver for smooth constrained nonlinear
//! programming.
//!
//! Solves problems of the form
//!
//! ```text
//!   minimize    f(x)
//!   subject to  c_L <= c(x) <= c_U
//!               x_L <=  x   <= x_U
//! ```
//!
//! by combining three orthogonal ingredients selected through
//! [`Options`]:
//!
//! - a **subproblem** strategy: active-set QP (SQP) or LP (SLP), or a
//!   primal-dual interior-point method on the barrier reformulation;
//! - a **globalization** strategy: l1 merit function, filter, or funnel,
//!   all gated by an Armijo sufficient-decrease test;
//! - a **constraint relaxation** driver: two-phase feasibility restoration,
//!   or the l1 relaxation with penalty management (Sl1QP).
//!
//! # Example
//!
//! ```ignore
//! use saddle_core::{solve, Options};
//!
//! let options = Options {
//!     subproblem: "QP".to_string(),
//!     globalization_strategy: "filter".to_string(),
//!     ..Options::default()
//! };
//! let result = solve(&my_model, &options)?;
//! println!("{}: f = {}", result.status, result.objective);
//! ```

pub mod direction;
pub mod error;
pub mod globalization;
pub mod iterate;
pub mod linalg;
pub mod model;
pub mod optimizer;
pub mod options;
pub mod reformulation;
pub mod relaxation;
pub mod solvers;
pub mod subproblem;
pub mod termination;

pub use direction::{Direction, Phase, SubproblemStatus};
pub use error::SolverError;
pub use iterate::{Iterate, Multipliers, ProgressMeasures};
pub use model::{Interval, Model};
pub use optimizer::SolveResult;
pub use options::Options;
pub use termination::TerminationStatus;

use globalization::{FilterStrategy, FunnelStrategy, GlobalizationStrategy, MeritFunction};
use options::{GlobalizationKind, RelaxationKind, SubproblemKind};
use reformulation::EqualityConstrainedModel;
use relaxation::{ConstraintRelaxationStrategy, FeasibilityRestoration, L1Relaxation};
use subproblem::{InteriorPointSubproblem, LpSubproblem, QpSubproblem, Subproblem};

/// Solve a model with the strategy combination selected in `options`.
///
/// The solver is pure given options and model: no state persists between
/// calls.
pub fn solve(model: &dyn Model, options: &Options) -> Result<SolveResult, SolverError> {
    let combination = options.resolve_strategies()?;

    match combination.subproblem {
        SubproblemKind::PrimalDualInteriorPoint => {
            // the barrier subproblem needs equality constraints only
            let equality_model = EqualityConstrainedModel::new(model);
            solve_reformulated(&equality_model, model.number_variables(), options)
        }
        _ => solve_reformulated(model, model.number_variables(), options),
    }
}

fn solve_reformulated(
    model: &dyn Model,
    number_original_variables: usize,
    options: &Options,
) -> Result<SolveResult, SolverError> {
    let combination = options.resolve_strategies()?;
    let n = model.number_variables();
    let m = model.number_constraints();
    // elastic variables may extend the dimension of the working problems
    let max_number_variables = n + 2 * m;

    let subproblem: Box<dyn Subproblem> = match combination.subproblem {
        SubproblemKind::Qp => Box::new(QpSubproblem::new(max_number_variables, m)),
        SubproblemKind::Lp => Box::new(LpSubproblem::new(max_number_variables, m)),
        SubproblemKind::PrimalDualInteriorPoint => {
            Box::new(InteriorPointSubproblem::new(max_number_variables, m, options))
        }
    };

    let globalization: Box<dyn GlobalizationStrategy> = match combination.globalization {
        GlobalizationKind::Merit => Box::new(MeritFunction::new(options)),
        GlobalizationKind::Filter => Box::new(FilterStrategy::new(options)),
        GlobalizationKind::Funnel => Box::new(FunnelStrategy::new(options)),
    };

    match combination.relaxation {
        RelaxationKind::FeasibilityRestoration => {
            let mut relaxation = FeasibilityRestoration::new(model, subproblem, globalization);
            optimizer::minimize(&mut relaxation, model, number_original_variables, options)
        }
        RelaxationKind::L1Relaxation => {
            let mut relaxation = L1Relaxation::new(
                model,
                subproblem,
                globalization,
                options.sl1qp_initial_parameter,
                options.l1_penalty_update_factor,
                options.l1_feasible_streak,
                options.tolerance,
            );
            optimizer::minimize(&mut relaxation, model, number_original_variables, options)
        }
    }
}
