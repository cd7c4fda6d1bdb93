// Negative log posterior of the additive model with automatic differentiation.
//
// yhat = (k + A*delta) * t + (m - A*(t_change .* delta)) + X*beta
// y ~ Normal(yhat, sigma_obs), k, m ~ Normal(0, 5), delta ~ Laplace(0, tau),
// sigma_obs ~ HalfNormal(0, 0.5), beta ~ Normal(0, sigmas)

use autodiff::*;
use ndarray::{Array1, Array2};

/// Lower bound on the observation noise, in scaled units.
pub const SIGMA_FLOOR: f64 = 1e-6;

/// Data and hyperparameters of one fit.
#[derive(Clone, Debug)]
pub struct ProphetModel {
    pub n: usize,              // Number of observations
    pub k: usize,              // Number of seasonality features
    pub s: usize,              // Number of changepoints
    pub t: Array1<f64>,        // Time values (scaled to [0, 1])
    pub y: Array1<f64>,        // Observed values (scaled)
    pub x: Array2<f64>,        // Seasonality features (n × k)
    pub t_change: Array1<f64>, // Changepoint times
    pub sigmas: Array1<f64>,   // Prior scales for seasonality coefficients
    pub tau: f64,              // Changepoint prior scale
}

/// Parameters of the additive model.
#[derive(Clone, Debug, PartialEq)]
pub struct ProphetParams {
    pub k: f64,             // Base growth rate
    pub m: f64,             // Offset parameter
    pub delta: Array1<f64>, // Changepoint rate adjustments
    pub sigma_obs: f64,     // Observation noise standard deviation
    pub beta: Array1<f64>,  // Seasonality coefficients
}

impl ProphetParams {
    /// Flatten to the optimizer's unconstrained vector: noise is stored as
    /// `ln(sigma_obs - SIGMA_FLOOR)`.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(Self::num_params(self.delta.len(), self.beta.len()));
        v.push(self.k);
        v.push(self.m);
        v.extend(self.delta.iter());
        v.push((self.sigma_obs - SIGMA_FLOOR).max(f64::MIN_POSITIVE).ln());
        v.extend(self.beta.iter());
        v
    }

    /// Inverse of [`to_vec`](Self::to_vec) for `s` changepoints and `k`
    /// seasonal features.
    pub fn from_vec(v: &[f64], s: usize, k: usize) -> Self {
        debug_assert_eq!(v.len(), Self::num_params(s, k));
        let mut idx = 0;
        let k_val = v[idx];
        idx += 1;
        let m_val = v[idx];
        idx += 1;
        let delta = Array1::from_vec(v[idx..idx + s].to_vec());
        idx += s;
        let sigma_obs = SIGMA_FLOOR + v[idx].exp();
        idx += 1;
        let beta = Array1::from_vec(v[idx..idx + k].to_vec());

        Self {
            k: k_val,
            m: m_val,
            delta,
            sigma_obs,
            beta,
        }
    }

    pub fn num_params(s: usize, k: usize) -> usize {
        2 + s + 1 + k // k, m, delta[s], log sigma_obs, beta[k]
    }
}

impl ProphetModel {
    /// Negative log posterior, up to an additive constant.
    pub fn neg_log_prob(&self, params_vec: &[f64]) -> f64 {
        if params_vec.iter().any(|p| !p.is_finite()) {
            return f64::INFINITY;
        }
        let params: Vec<F1> = params_vec.iter().map(|&p| F1::cst(p)).collect();
        self.neg_log_prob_dual(&params).x
    }

    /// Gradient of [`neg_log_prob`](Self::neg_log_prob), one forward pass per parameter.
    pub fn gradient(&self, params_vec: &[f64]) -> Vec<f64> {
        use rayon::prelude::*;

        (0..params_vec.len())
            .into_par_iter()
            .map(|i| self.partial_derivative(params_vec, i))
            .collect()
    }

    fn partial_derivative(&self, params_vec: &[f64], param_idx: usize) -> f64 {
        let params: Vec<F1> = params_vec
            .iter()
            .enumerate()
            .map(|(i, &p)| if i == param_idx { F1::var(p) } else { F1::cst(p) })
            .collect();
        self.neg_log_prob_dual(&params).dx
    }

    fn neg_log_prob_dual(&self, params: &[F1]) -> F1 {
        let mut idx = 0;
        let k = params[idx];
        idx += 1;
        let m = params[idx];
        idx += 1;
        let delta = &params[idx..idx + self.s];
        idx += self.s;
        let sigma_obs = F1::cst(SIGMA_FLOOR) + params[idx].exp();
        idx += 1;
        let beta = &params[idx..idx + self.k];

        let trend = linear_trend(k, m, delta, self.t.as_slice().unwrap_or(&[]), self.t_change.as_slice().unwrap_or(&[]));

        let mut nll = F1::cst(0.0);
        let ln_sigma = sigma_obs.ln();
        for i in 0..self.n {
            let mut yhat = trend[i];
            for j in 0..self.k {
                yhat = yhat + beta[j] * F1::cst(self.x[[i, j]]);
            }
            let z = (F1::cst(self.y[i]) - yhat) / sigma_obs;
            nll = nll + F1::cst(0.5) * z * z + ln_sigma;
        }

        let mut neg_prior = half_square(k / F1::cst(5.0)) + half_square(m / F1::cst(5.0));
        for d in delta {
            neg_prior = neg_prior + d.abs() / F1::cst(self.tau);
        }
        neg_prior = neg_prior + half_square(sigma_obs / F1::cst(0.5));
        for j in 0..self.k {
            neg_prior = neg_prior + half_square(beta[j] / F1::cst(self.sigmas[j]));
        }

        nll + neg_prior
    }
}

fn half_square(z: F1) -> F1 {
    F1::cst(0.5) * z * z
}

/// Linear trend with changepoints
fn linear_trend(k: F1, m: F1, delta: &[F1], t: &[f64], t_change: &[f64]) -> Vec<F1> {
    t.iter()
        .map(|&t_i| {
            let mut k_t = k;
            let mut m_t = m;
            for (j, &c) in t_change.iter().enumerate() {
                if t_i >= c {
                    k_t = k_t + delta[j];
                    m_t = m_t - delta[j] * F1::cst(c);
                }
            }
            k_t * F1::cst(t_i) + m_t
        })
        .collect()
}
