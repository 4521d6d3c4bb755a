//! Gaussian-process surrogate and acquisition functions.

use nalgebra::{DMatrix, DVector};

use super::gp::Acquisition;

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// A fitted GP model ready for predictions.
pub(crate) struct GpModel {
    /// Cholesky factor L of K + σ²I.
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// α = (K + σ²I)^{-1} y.
    alpha: DVector<f64>,
    /// Training inputs, each encoded into [0, 1] per column.
    x_train: Vec<Vec<f64>>,
    lengthscales: Vec<f64>,
    signal_var: f64,
    /// Best observed (standardized) y.
    f_best: f64,
}

/// Matérn 5/2 kernel with ARD lengthscales.
///
/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let sqrt5_r = SQRT_5 * r_sq.sqrt();
    signal_var * (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

/// Fit a GP to `(x_train, y_train)`.
///
/// Targets are standardized; lengthscales are the per-column standard
/// deviation of the inputs. Returns `None` when there is no data or the
/// kernel matrix is not positive definite.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn fit(x_train: &[Vec<f64>], y_train: &[f64], noise_var: f64) -> Option<GpModel> {
    let n = y_train.len();
    if n == 0 || x_train.len() != n {
        return None;
    }

    let y_mean = y_train.iter().sum::<f64>() / n as f64;
    let y_var = if n > 1 {
        y_train.iter().map(|&y| (y - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        1.0
    };
    let y_std = y_var.sqrt().max(1e-10);
    let y_standardized: Vec<f64> = y_train.iter().map(|&y| (y - y_mean) / y_std).collect();
    let f_best = y_standardized.iter().copied().fold(f64::INFINITY, f64::min);

    let d = x_train[0].len();
    let lengthscales: Vec<f64> = (0..d)
        .map(|j| {
            let mean_j = x_train.iter().map(|x| x[j]).sum::<f64>() / n as f64;
            let var_j = x_train.iter().map(|x| (x[j] - mean_j).powi(2)).sum::<f64>() / n as f64;
            var_j.sqrt().max(0.01)
        })
        .collect();

    // Data is standardized.
    let signal_var = 1.0;

    let k = DMatrix::from_fn(n, n, |i, j| {
        let k = matern52(&x_train[i], &x_train[j], &lengthscales, signal_var);
        if i == j { k + noise_var } else { k }
    });
    let cholesky = nalgebra::linalg::Cholesky::new(k)?;
    let alpha = cholesky.solve(&DVector::from_column_slice(&y_standardized));

    Some(GpModel {
        cholesky,
        alpha,
        x_train: x_train.to_vec(),
        lengthscales,
        signal_var,
        f_best,
    })
}

impl GpModel {
    /// Posterior mean and standard deviation at `x`, in standardized units.
    pub(crate) fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star = DVector::from_fn(self.x_train.len(), |i, _| {
            matern52(x, &self.x_train[i], &self.lengthscales, self.signal_var)
        });

        let mean = k_star.dot(&self.alpha);
        let v = self.cholesky.solve(&k_star);
        let var = (self.signal_var - k_star.dot(&v)).max(0.0);

        (mean, var.sqrt())
    }

    /// Acquisition value at `x`; larger is better.
    pub(crate) fn acquisition(&self, acquisition: Acquisition, x: &[f64]) -> f64 {
        let (mean, std) = self.predict(x);
        acquisition.score(mean, std, self.f_best)
    }
}

impl Acquisition {
    /// Scores a posterior `(mean, std)` against the incumbent `f_best`.
    ///
    /// Lower confidence bound is negated so every acquisition is maximized.
    pub(crate) fn score(self, mean: f64, std: f64, f_best: f64) -> f64 {
        match self {
            Self::ExpectedImprovement { xi } => expected_improvement(mean, std, f_best - xi),
            Self::ProbabilityOfImprovement { xi } => {
                if std < 1e-12 {
                    return if mean < f_best - xi { 1.0 } else { 0.0 };
                }
                norm_cdf((f_best - xi - mean) / std)
            }
            Self::LowerConfidenceBound { kappa } => -(mean - kappa * std),
        }
    }
}

/// `EI(x) = (f_best - mean) Φ(z) + std φ(z)` where `z = (f_best - mean) / std`.
fn expected_improvement(mean: f64, std: f64, f_best: f64) -> f64 {
    if std < 1e-12 {
        return (f_best - mean).max(0.0);
    }
    let z = (f_best - mean) / std;
    let improvement = (f_best - mean) * norm_cdf(z) + std * norm_pdf(z);
    improvement.max(0.0)
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Hart rational approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let t = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782 + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));
    let cdf = 1.0 - norm_pdf(x.abs()) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_is_symmetric_and_monotone() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((norm_cdf(-1.0) + norm_cdf(1.0) - 1.0).abs() < 1e-9);
        assert!(norm_cdf(-0.5) < norm_cdf(0.5));
    }

    #[test]
    fn gp_interpolates_training_points() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![f64::from(i) / 5.0]).collect();
        let y: Vec<f64> = x.iter().map(|p| (p[0] - 0.4).powi(2)).collect();
        let model = fit(&x, &y, 1e-6).unwrap();

        let (mean_at_min, std_at_obs) = model.predict(&x[2]);
        let (mean_at_max, _) = model.predict(&x[5]);
        let (_, std_between) = model.predict(&[0.5]);
        assert!(std_at_obs < std_between);
        assert!(mean_at_min < mean_at_max);
    }

    #[test]
    fn fit_rejects_empty_data() {
        assert!(fit(&[], &[], 1e-6).is_none());
    }

    #[test]
    fn acquisitions_prefer_lower_means() {
        for acquisition in [
            Acquisition::ExpectedImprovement { xi: 0.0 },
            Acquisition::ProbabilityOfImprovement { xi: 0.0 },
            Acquisition::LowerConfidenceBound { kappa: 1.96 },
        ] {
            let good = acquisition.score(-1.0, 0.5, 0.0);
            let bad = acquisition.score(1.0, 0.5, 0.0);
            assert!(good > bad, "{acquisition:?}");
        }
    }

    #[test]
    fn zero_std_expected_improvement_is_plain_improvement() {
        assert_eq!(expected_improvement(1.0, 0.0, 3.0), 2.0);
        assert_eq!(expected_improvement(4.0, 0.0, 3.0), 0.0);
    }
}
