//! Quasi-Newton driver over the pooled constraint system.
use super::constraint::{Constraint, Pools};
use crate::Error;
use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

/// Precision presets of the external minimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Fast preset for interactive solving.
    #[default]
    Rough,
    /// Tight preset for verification runs.
    Fine,
}

impl Precision {
    fn tol(self) -> f64 {
        match self {
            Self::Rough => 1e-8,
            Self::Fine => 1e-14,
        }
    }
}

const MAX_ITERS: u64 = 1000;
const MEMORY: usize = 7;

struct SystemCost<'a> {
    pools: &'a Pools,
    cons: &'a [Constraint],
}

impl SystemCost<'_> {
    fn eval(&self, x: &[f64]) -> f64 {
        self.cons.iter().map(|c| c.cost(self.pools, x)).sum()
    }
}

impl CostFunction for SystemCost<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<f64, argmin::core::Error> {
        Ok(self.eval(x))
    }
}

impl Gradient for SystemCost<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Vec<f64>, argmin::core::Error> {
        let mut grad = vec![0.; x.len()];
        for c in self.cons {
            c.grad(self.pools, x, &mut grad);
        }
        Ok(grad)
    }
}

/// Minimize the squared-residual cost from `x0` and return a parameter
/// vector satisfying every constraint to the preset tolerance.
pub(crate) fn minimize(
    pools: &Pools,
    cons: &[Constraint],
    x0: Vec<f64>,
    precision: Precision,
) -> Result<Vec<f64>, Error> {
    let problem = SystemCost { pools, cons };
    let tol = precision.tol();
    if problem.eval(&x0) <= tol {
        return Ok(x0);
    }
    if x0.is_empty() {
        // Nothing to move, yet the residuals are standing
        return Err(Error::NoSolution);
    }
    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, MEMORY);
    let res = Executor::new(problem, solver)
        .configure(|state| state.param(x0).max_iters(MAX_ITERS).target_cost(tol))
        .run()
        .map_err(|e| {
            log::debug!("minimizer aborted: {e}");
            Error::NoSolution
        })?;
    let state = res.state();
    let cost = state.get_best_cost();
    if cost.is_finite() && cost <= tol {
        state.get_best_param().cloned().ok_or(Error::NoSolution)
    } else {
        log::debug!("minimizer stalled at cost {cost:e}");
        Err(Error::NoSolution)
    }
}
