use nalgebra::{DMatrix, DVector};

use hybrid_core::{HybridSystem, IntegrationError, Tolerances};

use super::Config;

/// Weighted root-mean-square norm with weights `atol + rtol |scale|`.
pub(super) fn wrms(v: &[f64], scale: &[f64], tolerances: &Tolerances) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v
        .iter()
        .zip(scale)
        .map(|(&vi, &si)| (vi / tolerances.weight(si)).powi(2))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let n = v.len() as f64;
    (sum / n).sqrt()
}

/// Converged backward Euler step.
pub(super) struct Solved {
    pub(super) z: Vec<f64>,
    pub(super) f: Vec<f64>,
}

/// Solves `z - y - h f(t + h, z) = 0` by simplified Newton iteration.
///
/// The Jacobian is formed once by forward differences at the explicit Euler
/// predictor. Returns `Ok(None)` if the iteration diverges or the iteration
/// matrix is singular.
pub(super) fn solve<S: HybridSystem>(
    system: &S,
    t: f64,
    y: &[f64],
    f: &[f64],
    h: f64,
    tolerances: &Tolerances,
    config: &Config,
) -> Result<Option<Solved>, IntegrationError<S::Error>> {
    let n = y.len();
    let t1 = t + h;
    let mut z: Vec<f64> = y.iter().zip(f).map(|(&yi, &fi)| yi + h * fi).collect();

    let mut fz = vec![0.0; n];
    system.rhs(t1, &z, &mut fz).map_err(IntegrationError::System)?;

    let jacobian = finite_difference_jacobian(system, t1, &z, &fz, tolerances)?;
    let iteration = DMatrix::identity(n, n) - jacobian * h;
    let lu = iteration.lu();

    for _ in 0..config.max_newton_iters() {
        let residual = DVector::from_iterator(
            n,
            (0..n).map(|i| -(z[i] - y[i] - h * fz[i])),
        );
        let Some(delta) = lu.solve(&residual) else {
            return Ok(None);
        };

        for (zi, di) in z.iter_mut().zip(delta.iter()) {
            *zi += di;
        }
        let norm = wrms(delta.as_slice(), &z, tolerances);
        if !norm.is_finite() {
            return Ok(None);
        }

        system.rhs(t1, &z, &mut fz).map_err(IntegrationError::System)?;
        if norm <= config.newton_tolerance() {
            return Ok(Some(Solved { z, f: fz }));
        }
    }

    Ok(None)
}

fn finite_difference_jacobian<S: HybridSystem>(
    system: &S,
    t: f64,
    z: &[f64],
    fz: &[f64],
    tolerances: &Tolerances,
) -> Result<DMatrix<f64>, IntegrationError<S::Error>> {
    let n = z.len();
    let sqrt_eps = f64::EPSILON.sqrt();
    let mut jacobian = DMatrix::zeros(n, n);
    let mut perturbed = z.to_vec();
    let mut f_perturbed = vec![0.0; n];

    for j in 0..n {
        let dz = sqrt_eps * z[j].abs().max(tolerances.weight(z[j])).max(sqrt_eps);
        perturbed[j] = z[j] + dz;
        system
            .rhs(t, &perturbed, &mut f_perturbed)
            .map_err(IntegrationError::System)?;
        for i in 0..n {
            jacobian[(i, j)] = (f_perturbed[i] - fz[i]) / dz;
        }
        perturbed[j] = z[j];
    }

    Ok(jacobian)
}
