//! Phase angles and transfer timing between two orbits about the same body.

use std::f64::consts::PI;

use super::{orbits::Orbit, vis_viva, OrbitError};
use crate::{
    math::{self, clamp_positive, clamp_signed},
    time::UT,
};

/// `+1` for orbits travelling counter-clockwise seen from the reference
/// frame's north, `-1` for retrograde ones.
pub fn orbit_direction(orbit: &Orbit) -> f64 {
    libm::cos(orbit.i).signum()
}

/// Angle of the orbiter from the reference direction, in `[0, τ)`.
///
/// Retrograde orbits run their argument of periapsis and true anomaly
/// backwards relative to the reference direction, so both are negated for
/// them. Without that, angles of a prograde and a retrograde orbit can't be
/// compared.
pub fn absolute_phase_angle(orbit: &Orbit, t: UT) -> f64 {
    let dir = orbit_direction(orbit);
    clamp_positive(orbit.lan + dir * orbit.argpe + dir * orbit.true_anomaly_at(t))
}

/// Inverse of [`absolute_phase_angle`]: the true anomaly at which the orbit
/// sits at absolute `angle`.
pub fn true_anomaly_at_phase_angle(orbit: &Orbit, angle: f64) -> f64 {
    let dir = orbit_direction(orbit);
    let ta = dir * (angle - orbit.lan) - orbit.argpe;
    if orbit.is_elliptic() {
        clamp_positive(ta)
    } else {
        clamp_signed(ta)
    }
}

pub fn radius_at_phase_angle(orbit: &Orbit, angle: f64) -> f64 {
    orbit.radius_at_true_anomaly(true_anomaly_at_phase_angle(orbit, angle))
}

/// The occurrence of absolute `angle` on `orbit` closest to `around`, i.e.
/// within half a period either side of it.
pub fn time_at_phase_angle_near(orbit: &Orbit, angle: f64, around: UT) -> Result<UT, OrbitError> {
    let ta = true_anomaly_at_phase_angle(orbit, angle);
    let after = if orbit.is_elliptic() {
        around.add_seconds(-0.5 * orbit.period())
    } else {
        around
    };
    orbit.time_of_true_anomaly(ta, after)
}

/// Half the period of the transfer ellipse between the origin's radius at
/// `depart` and the destination's radius at the arrival phase angle.
///
/// The arrival angle defaults to directly opposite the departure point.
pub fn transfer_travel_time(
    origin: &Orbit,
    destination: &Orbit,
    depart: UT,
    arrival_angle: Option<f64>,
) -> f64 {
    let r1 = origin.radius_at(depart);
    let arrival_angle = arrival_angle.unwrap_or_else(|| {
        absolute_phase_angle(origin, depart) + orbit_direction(origin) * PI
    });
    let r2 = radius_at_phase_angle(destination, arrival_angle);
    0.5 * vis_viva::orbital_period(origin.mu, r1.max(r2), r1.min(r2))
}

/// Destination-minus-origin phase angle that makes a transfer departing at
/// `depart` meet the destination on arrival.
///
/// The transfer covers half a turn in the origin's direction while the
/// destination moves on at its own signed rate.
pub fn optimal_phase_angle(origin: &Orbit, destination: &Orbit, depart: UT) -> f64 {
    let travel = transfer_travel_time(origin, destination, depart, None);
    let dest_rate = orbit_direction(destination) * destination.mean_motion();
    clamp_positive(orbit_direction(origin) * PI - dest_rate * travel)
}

/// Signed angle by which a transfer departing at `t` misses the destination,
/// in `[-π, π)`. Zero at a transfer window.
pub fn arrival_phase_error(origin: &Orbit, destination: &Orbit, t: UT) -> f64 {
    let arrival_angle = absolute_phase_angle(origin, t) + orbit_direction(origin) * PI;
    let travel = transfer_travel_time(origin, destination, t, Some(arrival_angle));
    let dest_angle = absolute_phase_angle(destination, t.add_seconds(travel));
    clamp_signed(dest_angle - arrival_angle)
}

/// Searches successive windows for a transfer burn time.
///
/// Each item is the result of one [`math::find_root`] call over the current
/// window of [`arrival_phase_error`]; after a miss the window slides forward
/// by its own width. The iterator never ends, so callers must cap it, e.g.
/// with `take(n).find_map(|t| t)`.
pub struct BurnTimeSearch<'a> {
    origin: &'a Orbit,
    destination: &'a Orbit,
    start: f64,
    width: f64,
}

pub fn burn_time_search<'a>(
    origin: &'a Orbit,
    destination: &'a Orbit,
    search_start: UT,
    search_end: UT,
) -> BurnTimeSearch<'a> {
    let start = search_start.as_seconds_f64();
    BurnTimeSearch {
        origin,
        destination,
        start,
        width: (search_end.as_seconds_f64() - start).max(1.0),
    }
}

impl Iterator for BurnTimeSearch<'_> {
    type Item = Option<UT>;

    fn next(&mut self) -> Option<Self::Item> {
        let (origin, destination) = (self.origin, self.destination);
        let root = math::find_root(
            |t| arrival_phase_error(origin, destination, UT::new_seconds(t)),
            self.start,
            self.start + self.width,
            math::ROOT_EPSILON,
            math::ROOT_RANGE_EPSILON,
        );
        self.start += self.width;
        Some(root.and_then(UT::try_new_seconds))
    }
}

#[cfg(test)]
fn jool_moon(radius: f64, ta: f64, i: f64) -> Orbit {
    Orbit::circular("Jool", 2.8253e14, 2.4559852e9, radius, i, 0.0, ta, UT::default())
}

#[test]
fn retrograde_phase_runs_backwards() {
    let pro = jool_moon(27_184_000.0, 0.5, 0.0);
    let retro = jool_moon(27_184_000.0, 0.5, PI);
    let t0 = UT::default();
    let t1 = UT::new_seconds(1000.0);
    let dp = clamp_signed(absolute_phase_angle(&pro, t1) - absolute_phase_angle(&pro, t0));
    let dr = clamp_signed(absolute_phase_angle(&retro, t1) - absolute_phase_angle(&retro, t0));
    assert!(dp > 0.0);
    assert!(dr < 0.0);
    assert!((dp + dr).abs() < 1e-9);
    // The phase angle agrees with the inertial position for both senses.
    for orbit in [&pro, &retro] {
        let sv = orbit.state_vectors_at(t1);
        let angle = libm::atan2(sv.position[1], sv.position[0]);
        assert!(clamp_signed(angle - absolute_phase_angle(orbit, t1)).abs() < 1e-9);
    }
}

#[test]
fn phase_angle_inverse() {
    let orbit = Orbit {
        e: 0.2,
        argpe: 0.7,
        lan: 2.0,
        ..jool_moon(27_184_000.0, 1.0, 0.1)
    };
    let t = UT::new_seconds(5000.0);
    let angle = absolute_phase_angle(&orbit, t);
    let back = time_at_phase_angle_near(&orbit, angle, t).unwrap();
    assert!((back.as_seconds_f64() - t.as_seconds_f64()).abs() < 1e-3);
}

#[test]
fn circular_travel_time_is_half_period() {
    let (r1, r2) = (27_184_000.0, 68_500_000.0);
    let inner = jool_moon(r1, 0.0, 0.0);
    let outer = jool_moon(r2, 2.0, 0.0);
    let expected = 0.5 * vis_viva::orbital_period(inner.mu, r2, r1);
    for t in [0.0, 1e4, 3.3e5] {
        let travel = transfer_travel_time(&inner, &outer, UT::new_seconds(t), None);
        assert!((travel - expected).abs() < 1e-6 * expected);
    }
}

#[test]
fn search_finds_window() {
    let inner = jool_moon(27_184_000.0, 0.0, 0.0);
    let outer = jool_moon(68_500_000.0, 2.0, 0.0);
    let t = burn_time_search(&inner, &outer, UT::default(), UT::new_seconds(20_000.0))
        .take(200)
        .find_map(|t| t)
        .unwrap();
    assert!(arrival_phase_error(&inner, &outer, t).abs() < 1e-3);
    let optimal = optimal_phase_angle(&inner, &outer, t);
    let current = absolute_phase_angle(&outer, t) - absolute_phase_angle(&inner, t);
    assert!(clamp_signed(optimal - current).abs() < 1e-3);
}
