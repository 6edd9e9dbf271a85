//! Coefficient bundles for a state-space loop.
//!
//! A system has `states` states, `inputs` control inputs and `outputs`
//! measured outputs. Every bundle is validated against those dimensions when
//! it is built, so a loop never runs with mismatched shapes.
//!
//! | Bundle | Matrix | Shape |
//! |---|---|---|
//! | plant | `A` | states × states |
//! | plant | `B` | states × inputs |
//! | plant | `C` | outputs × states |
//! | plant | `D` | outputs × inputs |
//! | controller | `K`, `Kff` | inputs × states |
//! | controller | `u_min`, `u_max` | inputs |
//! | observer | `Q`, `P_ss` | states × states |
//! | observer | `R` | outputs × outputs |

use nalgebra::{DMatrix, DVector};

use crate::error::{StateSpaceError, StateSpaceResult};

/// System dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub states: usize,
    pub inputs: usize,
    pub outputs: usize,
}

pub(crate) fn check_shape(
    what: &'static str,
    m: &DMatrix<f64>,
    rows: usize,
    cols: usize,
) -> StateSpaceResult<()> {
    if m.nrows() != rows || m.ncols() != cols {
        return Err(StateSpaceError::DimensionMismatch {
            what,
            expected: (rows, cols),
            actual: (m.nrows(), m.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn check_len(what: &'static str, v: &DVector<f64>, len: usize) -> StateSpaceResult<()> {
    if v.len() != len {
        return Err(StateSpaceError::DimensionMismatch {
            what,
            expected: (len, 1),
            actual: (v.len(), 1),
        });
    }
    Ok(())
}

fn check_finite(what: &'static str, m: &DMatrix<f64>) -> StateSpaceResult<()> {
    if m.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(StateSpaceError::Numeric {
            what: format!("{what} has non-finite entries"),
        })
    }
}

/// Continuous-time plant `x' = A x + B u`, `y = C x + D u`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantCoeffs {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    dims: Dims,
}

impl PlantCoeffs {
    /// Build a plant; dimensions are taken from `A` (states), `B` (inputs)
    /// and `C` (outputs).
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        d: DMatrix<f64>,
    ) -> StateSpaceResult<Self> {
        let states = a.nrows();
        if states == 0 {
            return Err(StateSpaceError::InvalidArg {
                what: "plant needs at least one state",
            });
        }
        let dims = Dims {
            states,
            inputs: b.ncols(),
            outputs: c.nrows(),
        };
        if dims.inputs == 0 || dims.outputs == 0 {
            return Err(StateSpaceError::InvalidArg {
                what: "plant needs at least one input and one output",
            });
        }
        check_shape("A", &a, states, states)?;
        check_shape("B", &b, states, dims.inputs)?;
        check_shape("C", &c, dims.outputs, states)?;
        check_shape("D", &d, dims.outputs, dims.inputs)?;
        for (what, m) in [("A", &a), ("B", &b), ("C", &c), ("D", &d)] {
            check_finite(what, m)?;
        }
        Ok(Self { a, b, c, d, dims })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    pub fn d(&self) -> &DMatrix<f64> {
        &self.d
    }

    /// `y = C x + D u`.
    pub fn output(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        &self.c * x + &self.d * u
    }
}

/// Feedback and feedforward gains with elementwise input limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCoeffs {
    k: DMatrix<f64>,
    kff: DMatrix<f64>,
    u_min: DVector<f64>,
    u_max: DVector<f64>,
}

impl ControllerCoeffs {
    pub fn new(
        k: DMatrix<f64>,
        kff: DMatrix<f64>,
        u_min: DVector<f64>,
        u_max: DVector<f64>,
    ) -> StateSpaceResult<Self> {
        check_shape("Kff", &kff, k.nrows(), k.ncols())?;
        check_len("u_min", &u_min, k.nrows())?;
        check_len("u_max", &u_max, k.nrows())?;
        check_finite("K", &k)?;
        check_finite("Kff", &kff)?;
        let ordered = u_min
            .iter()
            .zip(u_max.iter())
            .all(|(lo, hi)| !lo.is_nan() && !hi.is_nan() && lo <= hi);
        if !ordered {
            return Err(StateSpaceError::InvalidArg {
                what: "u_min must not exceed u_max",
            });
        }
        Ok(Self { k, kff, u_min, u_max })
    }

    /// Check against plant dimensions.
    pub fn validate(&self, dims: Dims) -> StateSpaceResult<()> {
        check_shape("K", &self.k, dims.inputs, dims.states)?;
        check_shape("Kff", &self.kff, dims.inputs, dims.states)
    }

    pub fn k(&self) -> &DMatrix<f64> {
        &self.k
    }

    pub fn kff(&self) -> &DMatrix<f64> {
        &self.kff
    }

    pub fn u_min(&self) -> &DVector<f64> {
        &self.u_min
    }

    pub fn u_max(&self) -> &DVector<f64> {
        &self.u_max
    }

    /// Clamp `u` into `[u_min, u_max]` in place. Returns true if any element
    /// was limited.
    pub fn clamp(&self, u: &mut DVector<f64>) -> bool {
        let mut limited = false;
        for ((v, lo), hi) in u.iter_mut().zip(self.u_min.iter()).zip(self.u_max.iter()) {
            let clamped = v.clamp(*lo, *hi);
            limited |= clamped != *v;
            *v = clamped;
        }
        limited
    }
}

/// Continuous noise covariances and the steady-state error covariance the
/// observer gain is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverCoeffs {
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    p_steady: DMatrix<f64>,
}

impl ObserverCoeffs {
    pub fn new(q: DMatrix<f64>, r: DMatrix<f64>, p_steady: DMatrix<f64>) -> StateSpaceResult<Self> {
        check_shape("Q", &q, q.nrows(), q.nrows())?;
        check_shape("R", &r, r.nrows(), r.nrows())?;
        check_shape("P_ss", &p_steady, q.nrows(), q.nrows())?;
        for (what, m) in [("Q", &q), ("R", &r), ("P_ss", &p_steady)] {
            check_finite(what, m)?;
        }
        Ok(Self { q, r, p_steady })
    }

    pub fn validate(&self, dims: Dims) -> StateSpaceResult<()> {
        check_shape("Q", &self.q, dims.states, dims.states)?;
        check_shape("R", &self.r, dims.outputs, dims.outputs)?;
        check_shape("P_ss", &self.p_steady, dims.states, dims.states)
    }

    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn p_steady(&self) -> &DMatrix<f64> {
        &self.p_steady
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, v)
    }

    #[test]
    fn plant_dims_from_matrices() {
        let plant = PlantCoeffs::new(
            DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]),
            DMatrix::from_row_slice(2, 1, &[0.0, 1.0]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            DMatrix::zeros(1, 1),
        )
        .unwrap();
        assert_eq!(
            plant.dims(),
            Dims {
                states: 2,
                inputs: 1,
                outputs: 1
            }
        );
    }

    #[test]
    fn plant_shape_mismatch_rejected() {
        let err = PlantCoeffs::new(
            DMatrix::zeros(2, 2),
            DMatrix::zeros(3, 1),
            DMatrix::zeros(1, 2),
            DMatrix::zeros(1, 1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            StateSpaceError::DimensionMismatch {
                what: "B",
                expected: (2, 1),
                actual: (3, 1)
            }
        );
    }

    #[test]
    fn non_finite_plant_rejected() {
        let err = PlantCoeffs::new(scalar(f64::NAN), scalar(1.0), scalar(1.0), scalar(0.0));
        assert!(matches!(err, Err(StateSpaceError::Numeric { .. })));
    }

    #[test]
    fn controller_limits_must_be_ordered() {
        let bad = ControllerCoeffs::new(
            scalar(1.0),
            scalar(0.0),
            DVector::from_element(1, 1.0),
            DVector::from_element(1, -1.0),
        );
        assert!(matches!(bad, Err(StateSpaceError::InvalidArg { .. })));
    }

    #[test]
    fn controller_validated_against_plant() {
        let ctrl = ControllerCoeffs::new(
            DMatrix::zeros(1, 3),
            DMatrix::zeros(1, 3),
            DVector::from_element(1, -1.0),
            DVector::from_element(1, 1.0),
        )
        .unwrap();
        let dims = Dims {
            states: 2,
            inputs: 1,
            outputs: 1,
        };
        assert!(ctrl.validate(dims).is_err());
    }

    #[test]
    fn clamp_reports_saturation() {
        let ctrl = ControllerCoeffs::new(
            DMatrix::zeros(2, 1),
            DMatrix::zeros(2, 1),
            DVector::from_vec(vec![-1.0, -2.0]),
            DVector::from_vec(vec![1.0, 2.0]),
        )
        .unwrap();
        let mut u = DVector::from_vec(vec![0.5, 3.0]);
        assert!(ctrl.clamp(&mut u));
        assert_eq!(u, DVector::from_vec(vec![0.5, 2.0]));
        assert!(!ctrl.clamp(&mut u));
    }

    #[test]
    fn observer_shapes() {
        assert!(
            ObserverCoeffs::new(DMatrix::zeros(2, 2), scalar(1.0), DMatrix::zeros(2, 1)).is_err()
        );
        let obs =
            ObserverCoeffs::new(DMatrix::zeros(2, 2), scalar(1.0), DMatrix::zeros(2, 2)).unwrap();
        let dims = Dims {
            states: 2,
            inputs: 1,
            outputs: 2,
        };
        assert!(obs.validate(dims).is_err());
    }
}
