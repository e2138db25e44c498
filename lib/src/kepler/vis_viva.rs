//! Closed-form speeds and burns from the vis-viva equation.
//!
//! All radii are in metres from the centre of the orbited body, all
//! gravitational parameters in `m^3/s^2`.

use std::f64::consts::{PI, TAU};

use super::orbits::Orbit;
use crate::time::UT;

/// Speed at periapsis of the ellipse with the given apsides.
pub fn speed_at_periapsis(mu: f64, apoapsis_r: f64, periapsis_r: f64) -> f64 {
    libm::sqrt(2.0 * mu * apoapsis_r / (periapsis_r * (apoapsis_r + periapsis_r)))
}

/// Speed at apoapsis of the ellipse with the given apsides.
pub fn speed_at_apoapsis(mu: f64, apoapsis_r: f64, periapsis_r: f64) -> f64 {
    libm::sqrt(2.0 * mu * periapsis_r / (apoapsis_r * (apoapsis_r + periapsis_r)))
}

/// Period of the ellipse with the given apsides.
pub fn orbital_period(mu: f64, apoapsis_r: f64, periapsis_r: f64) -> f64 {
    let a = 0.5 * (apoapsis_r + periapsis_r);
    TAU * libm::sqrt(a.powi(3) / mu)
}

/// Prograde delta-V at `time` that raises the opposite apsis to `target_r`.
///
/// The burn point becomes periapsis, so `target_r` should be at least the
/// current radius.
pub fn burn_to_new_ap(orbit: &Orbit, time: UT, target_r: f64) -> f64 {
    let r = orbit.radius_at(time);
    speed_at_periapsis(orbit.mu, target_r, r) - orbit.speed_at_radius(r)
}

/// Prograde delta-V at `time` that lowers the opposite apsis to `target_r`.
/// Negative.
///
/// The burn point becomes apoapsis, so `target_r` should be at most the
/// current radius.
pub fn burn_to_new_pe(orbit: &Orbit, time: UT, target_r: f64) -> f64 {
    let r = orbit.radius_at(time);
    speed_at_apoapsis(orbit.mu, r, target_r) - orbit.speed_at_radius(r)
}

/// Periapsis speed of the hyperbola leaving with excess speed `v_inf`
/// from an infinitely large sphere of influence.
pub fn speed_to_escape(mu: f64, periapsis_r: f64, v_inf: f64) -> f64 {
    libm::sqrt(v_inf.powi(2) + 2.0 * mu / periapsis_r)
}

/// Periapsis speed needed to cross the sphere of influence at radius `soi`
/// with speed `v_soi`.
pub fn speed_to_exit_soi(mu: f64, soi: f64, periapsis_r: f64, v_soi: f64) -> f64 {
    libm::sqrt(v_soi.powi(2) + 2.0 * mu / periapsis_r - 2.0 * mu / soi)
}

/// Eccentricity of the escape hyperbola with periapsis `periapsis_r` and
/// excess speed `v_inf`.
pub fn escape_eccentricity(mu: f64, periapsis_r: f64, v_inf: f64) -> f64 {
    let a = -mu / v_inf.powi(2);
    1.0 - periapsis_r / a
}

/// True anomaly of the outbound asymptote of the escape hyperbola.
pub fn asymptote_true_anomaly(mu: f64, periapsis_r: f64, v_inf: f64) -> f64 {
    libm::acos(-1.0 / escape_eccentricity(mu, periapsis_r, v_inf))
}

/// Angle from the burn point, in the direction of motion, to the direction
/// a quarter turn past the escape asymptote.
///
/// Tends to `π` for very fast escapes (a straight line) and `π/2` for a
/// barely-escaping parabola.
pub fn ejection_angle(mu: f64, periapsis_r: f64, v_inf: f64) -> f64 {
    1.5 * PI - asymptote_true_anomaly(mu, periapsis_r, v_inf)
}

#[cfg(test)]
const KERBIN_MU: f64 = 3.5316e12;

#[test]
fn circular_apsis_speeds_agree() {
    let r = 700_000.0;
    let pe = speed_at_periapsis(KERBIN_MU, r, r);
    let ap = speed_at_apoapsis(KERBIN_MU, r, r);
    assert!((pe - ap).abs() < 1e-9);
    assert!((pe - libm::sqrt(KERBIN_MU / r)).abs() < 1e-9);
}

#[test]
fn hohmann_speeds() {
    let (r1, r2) = (700_000.0, 12_000_000.0);
    let pe = speed_at_periapsis(KERBIN_MU, r2, r1);
    let ap = speed_at_apoapsis(KERBIN_MU, r2, r1);
    // Angular momentum is conserved between the apsides.
    assert!((pe * r1 - ap * r2).abs() / (pe * r1) < 1e-12);
    let period = orbital_period(KERBIN_MU, r2, r1);
    let a: f64 = 0.5 * (r1 + r2);
    assert!((period - TAU * (a.powi(3) / KERBIN_MU).sqrt()).abs() < 1e-6);
}

#[test]
fn exit_soi_converges_to_escape() {
    let (r, v) = (700_000.0, 950.0);
    let finite = speed_to_exit_soi(KERBIN_MU, 8.4159e7, r, v);
    let huge = speed_to_exit_soi(KERBIN_MU, 1e30, r, v);
    let escape = speed_to_escape(KERBIN_MU, r, v);
    assert!(finite < escape);
    assert!((huge - escape).abs() < 1e-9);
}

#[test]
fn ejection_angle_limits() {
    let r = 700_000.0;
    let fast = ejection_angle(KERBIN_MU, r, 1e7);
    let slow = ejection_angle(KERBIN_MU, r, 1e-3);
    assert!((fast - PI).abs() < 1e-3);
    assert!((slow - 0.5 * PI).abs() < 1e-3);
}

#[test]
fn burns_raise_and_lower() {
    let orbit = Orbit::circular("Kerbin", KERBIN_MU, 8.4159e7, 700_000.0, 0.0, 0.0, 0.0, UT::default());
    let up = burn_to_new_ap(&orbit, UT::default(), 12_000_000.0);
    let expected = speed_at_periapsis(KERBIN_MU, 12_000_000.0, 700_000.0) - libm::sqrt(KERBIN_MU / 700_000.0);
    assert!((up - expected).abs() < 1e-6);
    let down = burn_to_new_pe(&orbit, UT::default(), 600_000.0);
    let expected = speed_at_apoapsis(KERBIN_MU, 700_000.0, 600_000.0) - libm::sqrt(KERBIN_MU / 700_000.0);
    assert!(down < 0.0);
    assert!((down - expected).abs() < 1e-6);
    assert!(burn_to_new_pe(&orbit, UT::default(), 700_000.0).abs() < 1e-6);
    assert!(burn_to_new_ap(&orbit, UT::default(), 700_000.0).abs() < 1e-6);
}
