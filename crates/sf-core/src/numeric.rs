use crate::SfError;

/// Longest accepted period: one day.
pub const MAX_PERIOD_S: f64 = 86_400.0;

pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, SfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SfError::NonFinite { what, value: v })
    }
}

/// Validate a period in seconds: strictly positive and at most
/// [`MAX_PERIOD_S`].
pub fn ensure_period(period_s: f64) -> Result<f64, SfError> {
    let period_s = ensure_finite(period_s, "period")?;
    if period_s <= 0.0 {
        return Err(SfError::InvalidArg {
            what: "period must be positive",
        });
    }
    if period_s > MAX_PERIOD_S {
        return Err(SfError::InvalidArg {
            what: "period exceeds one day",
        });
    }
    Ok(period_s)
}

/// Reduce `value` modulo `span` to the representative with the smallest
/// magnitude. Values landing exactly on `span / 2` resolve to `+span / 2`.
///
/// Used for continuous (wrap-around) inputs such as angles.
pub fn wrap_to_span(value: f64, span: f64) -> f64 {
    if span <= 0.0 || !span.is_finite() {
        return value;
    }
    let half = span / 2.0;
    let r = value.rem_euclid(span);
    if r > half { r - span } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(f64::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn period_must_be_positive() {
        assert!(ensure_period(0.02).is_ok());
        assert!(ensure_period(0.0).is_err());
        assert!(ensure_period(-1.0).is_err());
        assert!(ensure_period(f64::INFINITY).is_err());
        assert!(ensure_period(MAX_PERIOD_S).is_ok());
        assert!(ensure_period(1e20).is_err());
    }

    #[test]
    fn wrap_picks_smallest_magnitude() {
        assert!((wrap_to_span(350.0, 360.0) + 10.0).abs() < 1e-12);
        assert!((wrap_to_span(-350.0, 360.0) - 10.0).abs() < 1e-12);
        assert!((wrap_to_span(340.0, 360.0) + 20.0).abs() < 1e-12);
        assert!((wrap_to_span(10.0, 360.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn wrap_tie_resolves_positive() {
        assert_eq!(wrap_to_span(180.0, 360.0), 180.0);
        assert_eq!(wrap_to_span(-180.0, 360.0), 180.0);
        assert_eq!(wrap_to_span(540.0, 360.0), 180.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn wrapped_value_stays_within_half_span(v in -1.0e4f64..1.0e4, span in 0.1f64..1.0e3) {
            let w = wrap_to_span(v, span);
            prop_assert!(w > -span / 2.0 - 1e-9);
            prop_assert!(w <= span / 2.0 + 1e-9);
        }

        #[test]
        fn wrapped_value_is_congruent(v in -1.0e4f64..1.0e4, span in 0.1f64..1.0e3) {
            let w = wrap_to_span(v, span);
            let k = (v - w) / span;
            prop_assert!((k - k.round()).abs() < 1e-6);
        }
    }
}
