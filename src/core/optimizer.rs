// MAP estimation for the additive model.
// Penalized least squares gives a starting point, argmin's L-BFGS refines it
// against the exact posterior (Laplace changepoint prior included).

use super::objective::{ProphetModel, ProphetParams, SIGMA_FLOOR};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

/// Optimization configuration
#[derive(Clone, Debug)]
pub struct OptimizationConfig {
    pub max_iters: u64,
    pub tolerance_grad: f64,
    pub tolerance_cost: f64,
    pub history_size: usize, // For L-BFGS
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_iters: 2_000,
            tolerance_grad: 1e-8,
            tolerance_cost: 1e-12,
            history_size: 5,
        }
    }
}

/// Optimization result
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub params: ProphetParams,
    pub neg_log_prob: f64,
    pub iterations: u64,
    pub refined: bool,
}

struct ProphetProblem<'a> {
    model: &'a ProphetModel,
}

impl CostFunction for ProphetProblem<'_> {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(self.model.neg_log_prob(&params.to_vec()))
    }
}

impl Gradient for ProphetProblem<'_> {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        Ok(Array1::from_vec(self.model.gradient(&params.to_vec())))
    }
}

/// Find the MAP estimate. Falls back to the least-squares start when L-BFGS
/// fails or does not improve on it.
pub fn fit_map(model: &ProphetModel, config: &OptimizationConfig) -> Result<OptimizationResult, String> {
    let init = initialize_params(model)?;
    let init_vec = init.to_vec();
    let init_cost = model.neg_log_prob(&init_vec);
    if !init_cost.is_finite() {
        return Err("the objective is not finite at the starting point".to_string());
    }

    match run_lbfgs(model, init_vec, config) {
        Ok((best, cost, iterations)) if cost.is_finite() && cost <= init_cost => {
            debug!(iterations, cost, init_cost, "L-BFGS converged");
            Ok(OptimizationResult {
                params: ProphetParams::from_vec(&best, model.s, model.k),
                neg_log_prob: cost,
                iterations,
                refined: true,
            })
        }
        Ok((_, cost, iterations)) => {
            warn!(iterations, cost, init_cost, "L-BFGS did not improve on the least-squares start");
            Ok(OptimizationResult {
                params: init,
                neg_log_prob: init_cost,
                iterations,
                refined: false,
            })
        }
        Err(e) => {
            warn!(error = %e, "L-BFGS failed, keeping the least-squares start");
            Ok(OptimizationResult {
                params: init,
                neg_log_prob: init_cost,
                iterations: 0,
                refined: false,
            })
        }
    }
}

fn run_lbfgs(
    model: &ProphetModel,
    init: Vec<f64>,
    config: &OptimizationConfig,
) -> Result<(Vec<f64>, f64, u64), ArgminError> {
    let problem = ProphetProblem { model };
    let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9)?;
    let solver = LBFGS::new(linesearch, config.history_size)
        .with_tolerance_grad(config.tolerance_grad)?
        .with_tolerance_cost(config.tolerance_cost)?;

    let result = Executor::new(problem, solver)
        .configure(|state| {
            state
                .param(Array1::from_vec(init))
                .max_iters(config.max_iters)
        })
        .run()?;

    let state = result.state();
    let best = state
        .get_best_param()
        .ok_or_else(|| ArgminError::msg("no parameters found"))?
        .to_vec();
    Ok((best, state.get_best_cost(), state.get_iter()))
}

/// Starting point from penalized least squares.
///
/// Replaces the Laplace prior on `delta` by a Normal of the same variance
/// (2 tau^2) so the problem becomes linear. Solved twice: once with a rough
/// noise level, once with the residual noise of the first pass.
pub fn initialize_params(model: &ProphetModel) -> Result<ProphetParams, String> {
    let design = design_matrix(model);
    let p = design.ncols();

    let mut precision = Array1::zeros(p);
    precision[0] = 1.0 / 25.0;
    precision[1] = 1.0 / 25.0;
    for j in 0..model.s {
        precision[2 + j] = 1.0 / (2.0 * model.tau * model.tau);
    }
    for j in 0..model.k {
        precision[2 + model.s + j] = 1.0 / (model.sigmas[j] * model.sigmas[j]);
    }

    let xtx = design.t().dot(&design);
    let xty = design.t().dot(&model.y);

    let mut sigma: f64 = 0.1;
    let mut theta = Array1::zeros(p);
    for _ in 0..2 {
        let mut lhs = xtx.clone();
        for j in 0..p {
            lhs[[j, j]] += sigma * sigma * precision[j];
        }
        theta = solve_spd(&lhs, &xty)
            .ok_or_else(|| "the normal equations are singular".to_string())?;
        let resid = &model.y - &design.dot(&theta);
        let mse = resid.dot(&resid) / model.n.max(1) as f64;
        sigma = mse.sqrt().max(1e-3);
    }

    Ok(ProphetParams {
        k: theta[0],
        m: theta[1],
        delta: theta.slice(ndarray::s![2..2 + model.s]).to_owned(),
        sigma_obs: sigma.max(SIGMA_FLOOR * 2.0),
        beta: theta.slice(ndarray::s![2 + model.s..]).to_owned(),
    })
}

/// Columns: t, 1, changepoint hinges (t - c)+, seasonal features.
fn design_matrix(model: &ProphetModel) -> Array2<f64> {
    let p = 2 + model.s + model.k;
    let mut design = Array2::zeros((model.n, p));
    for i in 0..model.n {
        let ti = model.t[i];
        design[[i, 0]] = ti;
        design[[i, 1]] = 1.0;
        for (j, &c) in model.t_change.iter().enumerate() {
            if ti >= c {
                design[[i, 2 + j]] = ti - c;
            }
        }
        for j in 0..model.k {
            design[[i, 2 + model.s + j]] = model.x[[i, j]];
        }
    }
    design
}

/// Solve `a x = b` for symmetric positive definite `a` (Cholesky).
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in i + 1..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Some(x)
}
