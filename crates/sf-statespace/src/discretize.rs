//! Continuous to discrete conversion over a variable period.

use nalgebra::DMatrix;
use sf_core::ensure_period;

use crate::error::StateSpaceResult;

/// Zero-order-hold discretization of `(A, B)` over `dt`.
///
/// Uses the matrix exponential of the augmented matrix
///
/// ```text
/// exp([[A, B], [0, 0]] * dt) = [[A_d, B_d], [0, I]]
/// ```
pub fn discretize_ab(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    dt: f64,
) -> StateSpaceResult<(DMatrix<f64>, DMatrix<f64>)> {
    let dt = ensure_period(dt)?;
    let states = a.nrows();
    let inputs = b.ncols();

    let mut m = DMatrix::<f64>::zeros(states + inputs, states + inputs);
    m.view_mut((0, 0), (states, states)).copy_from(&(a * dt));
    m.view_mut((0, states), (states, inputs)).copy_from(&(b * dt));
    let phi = m.exp();

    let a_d = phi.view((0, 0), (states, states)).into_owned();
    let b_d = phi.view((0, states), (states, inputs)).into_owned();
    Ok((a_d, b_d))
}

/// Discrete process noise, first order: `Q_d ≈ Q * dt`.
pub fn discretize_q(q: &DMatrix<f64>, dt: f64) -> StateSpaceResult<DMatrix<f64>> {
    Ok(q * ensure_period(dt)?)
}

/// Discrete measurement noise: `R_d = R / dt`.
pub fn discretize_r(r: &DMatrix<f64>, dt: f64) -> StateSpaceResult<DMatrix<f64>> {
    Ok(r / ensure_period(dt)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn double_integrator_is_exact() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let dt = 0.02;
        let (a_d, b_d) = discretize_ab(&a, &b, dt).unwrap();
        let expected_a = DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]);
        let expected_b = DMatrix::from_row_slice(2, 1, &[0.5 * dt * dt, dt]);
        assert!((a_d - expected_a).norm() < 1e-12);
        assert!((b_d - expected_b).norm() < 1e-12);
    }

    #[test]
    fn noise_discretization() {
        let q = DMatrix::from_element(1, 1, 2.0);
        assert!((discretize_q(&q, 0.5).unwrap()[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((discretize_r(&q, 0.5).unwrap()[(0, 0)] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_dt_rejected() {
        let a = DMatrix::from_element(1, 1, -1.0);
        assert!(discretize_ab(&a, &a, 0.0).is_err());
        assert!(discretize_r(&a, -0.1).is_err());
        assert!(discretize_q(&a, f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn scalar_system_matches_closed_form(
            a in -5.0..-0.1_f64,
            b in -3.0..3.0_f64,
            dt in 0.001..0.1_f64,
        ) {
            let (a_d, b_d) = discretize_ab(
                &DMatrix::from_element(1, 1, a),
                &DMatrix::from_element(1, 1, b),
                dt,
            ).unwrap();
            let e = (a * dt).exp();
            prop_assert!((a_d[(0, 0)] - e).abs() < 1e-9);
            prop_assert!((b_d[(0, 0)] - b * (e - 1.0) / a).abs() < 1e-9);
        }
    }
}
