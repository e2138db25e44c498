//! Math utilities.
use std::f64::consts::{PI, TAU};

use tracing::trace;

/// Default bracket width at which [`find_root`] stops bisecting.
pub const ROOT_EPSILON: f64 = 1e-4;
/// Default largest `|f(max) - f(min)|` accepted over the final bracket.
pub const ROOT_RANGE_EPSILON: f64 = 0.1;
/// Bisection steps after which [`find_root`] gives up narrowing.
const ROOT_MAX_ITERATIONS: usize = 200;

/// Reduce `angle` into `[min, min + τ)` by whole turns.
///
/// The result is not the representative closest to `angle`; callers only
/// rely on it having the same sine and cosine.
pub fn clamp(angle: f64, min: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let mut res = angle - TAU * ((angle - min) / TAU).floor();
    // floor() can land one ulp outside the interval.
    if res < min {
        res += TAU;
    }
    if res >= min + TAU {
        res -= TAU;
    }
    res
}

/// [`clamp`] into `[0, τ)`.
pub fn clamp_positive(angle: f64) -> f64 {
    clamp(angle, 0.0)
}

/// [`clamp`] into `[-π, π)`.
pub fn clamp_signed(angle: f64) -> f64 {
    clamp(angle, -PI)
}

/// Bisection root finder.
///
/// Requires `f(min)` and `f(max)` to have opposite signs, otherwise returns
/// `None` without evaluating further. Once the bracket is narrower than
/// `epsilon`, the midpoint is only accepted if `f` changed by less than
/// `range_epsilon` across the bracket. This rejects the jump of a wrapped
/// angle from `+π` to `-π`, which looks like a sign change but is not a
/// zero.
///
/// Bisection also stops once the bracket is down to adjacent floats, which
/// for large `min` can be wider than `epsilon`.
pub fn find_root(
    f: impl Fn(f64) -> f64,
    min: f64,
    max: f64,
    epsilon: f64,
    range_epsilon: f64,
) -> Option<f64> {
    let (mut lo, mut hi) = (min, max);
    let mut f_lo = f(lo);
    let mut f_hi = f(hi);
    if f_lo.is_nan() || f_hi.is_nan() {
        return None;
    }
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return None;
    }

    for _ in 0..ROOT_MAX_ITERATIONS {
        if hi - lo < epsilon {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let f_mid = f(mid);
        if f_mid.is_nan() {
            return None;
        }
        if f_mid == 0.0 {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
            f_hi = f_mid;
        }
    }

    if (f_hi - f_lo).abs() < range_epsilon {
        Some(0.5 * (lo + hi))
    } else {
        trace!(lo, hi, f_lo, f_hi, "rejected discontinuity");
        None
    }
}

#[test]
fn clamp_keeps_trig() {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let turns = rng.gen_range(-50i32..50) as f64;
        let angle = rng.gen_range(-TAU..TAU) + turns * TAU;
        let min = rng.gen_range(-10.0..10.0);
        let res = clamp(angle, min);
        assert!(res >= min && res < min + TAU, "{angle} -> {res} not in [{min}, {min}+τ)");
        assert!((res.sin() - angle.sin()).abs() < 1e-9);
        assert!((res.cos() - angle.cos()).abs() < 1e-9);
    }
    assert_eq!(clamp_positive(-TAU), 0.0);
    assert!((clamp_positive(-3.0 * TAU + 1.0) - 1.0).abs() < 1e-12);
}

#[test]
fn find_root_linear() {
    let root = find_root(|x| x - 5.0, 0.0, 10.0, ROOT_EPSILON, ROOT_RANGE_EPSILON);
    assert!((root.unwrap() - 5.0).abs() < ROOT_EPSILON);

    let root = find_root(|x| 3.0 - x, 0.0, 10.0, ROOT_EPSILON, ROOT_RANGE_EPSILON);
    assert!((root.unwrap() - 3.0).abs() < ROOT_EPSILON);
}

#[test]
fn find_root_same_sign() {
    let calls = std::cell::Cell::new(0);
    let res = find_root(
        |x| {
            calls.set(calls.get() + 1);
            x * x + 1.0
        },
        -1.0,
        1.0,
        ROOT_EPSILON,
        ROOT_RANGE_EPSILON,
    );
    assert_eq!(res, None);
    assert_eq!(calls.get(), 2);
}

#[test]
fn find_root_at_large_times() {
    // Adjacent floats near 1e12 are further apart than ROOT_EPSILON.
    let base = 1e12;
    let root = find_root(|x| x - base - 3.3, base, base + 10.0, ROOT_EPSILON, ROOT_RANGE_EPSILON);
    assert!((root.unwrap() - base - 3.3).abs() < 1e-3);

    // Floats near 4e17 are 64 apart, so allow that much change across the
    // final bracket.
    let root = find_root(|x| x - 4e17, 0.0, 1e18, ROOT_EPSILON, 1e3);
    assert!((root.unwrap() - 4e17).abs() < 1e3);
}

#[test]
fn find_root_rejects_wrap() {
    // A wrapped angle crossing π flips sign without passing through zero.
    let res = find_root(
        |x| clamp_signed(x + PI - 1.0),
        0.0,
        2.0,
        ROOT_EPSILON,
        ROOT_RANGE_EPSILON,
    );
    assert_eq!(res, None);
}
