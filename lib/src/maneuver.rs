use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    kepler::orbits::{Orbit, StateVector},
    time::UT,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BurnKind {
    Ejection,
    PlaneChange,
    Capture,
}

/// A single impulsive burn.
///
/// Recomputation produces a new `BurnPlan`; existing ones are never edited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BurnPlan {
    /// Time of ignition, or `None` if the burn works at any time.
    pub time: Option<UT>,
    /// Delta-V vector in the Frenet frame: prograde, normal, radial (`m/s`).
    pub deltav: Vector3<f64>,
    pub kind: BurnKind,
}

impl BurnPlan {
    pub fn new(time: Option<UT>, prograde: f64, normal: f64, radial: f64, kind: BurnKind) -> Self {
        Self {
            time,
            deltav: Vector3::new(prograde, normal, radial),
            kind,
        }
    }

    pub fn prograde(&self) -> f64 {
        self.deltav[0]
    }

    pub fn normal(&self) -> f64 {
        self.deltav[1]
    }

    pub fn radial(&self) -> f64 {
        self.deltav[2]
    }

    /// Total delta-V (`m/s`).
    pub fn total(&self) -> f64 {
        self.deltav.norm()
    }

    /// Has the ignition time already gone by at `now`?
    pub fn is_expired(&self, now: UT) -> bool {
        self.time.is_some_and(|t| t < now)
    }

    /// Delta-V in the inertial frame for a burn at `tig_vector`.
    pub fn deltav_bci(&self, tig_vector: &StateVector) -> Vector3<f64> {
        frenet(tig_vector) * self.deltav
    }
}

/// Returns the Frenet frame to IJK conversion matrix for the given
/// state vector.
pub fn frenet(sv: &StateVector) -> Matrix3<f64> {
    let t = sv.velocity.normalize();
    let n = sv.position.cross(&sv.velocity).normalize();
    let b = t.cross(&n);
    Matrix3::from_columns(&[t, n, b])
}

/// Delta-V at `t` that turns the horizontal velocity of `orbit` into the
/// plane of `target`, keeping its magnitude and the radial component.
///
/// Components are in the Frenet frame of `orbit` at `t`. Zero when the
/// planes already match.
pub fn delta_v_to_match_planes(orbit: &Orbit, target: &Orbit, t: UT) -> Vector3<f64> {
    let sv = orbit.state_vectors_at(t);
    let r_hat = sv.position.normalize();
    let v_radial = sv.velocity.dot(&r_hat) * r_hat;
    let v_horizontal = sv.velocity - v_radial;

    let mut dir = target.normal().cross(&r_hat);
    if dir.norm() < 1e-12 {
        // Position is along the target's pole; no horizontal direction lies
        // in its plane.
        return Vector3::zeros();
    }
    dir.normalize_mut();
    if dir.dot(&v_horizontal) < 0.0 {
        dir = -dir;
    }

    let new_velocity = v_radial + v_horizontal.norm() * dir;
    frenet(&sv).transpose() * (new_velocity - sv.velocity)
}

/// Magnitude of [`delta_v_to_match_planes`].
pub fn plane_change_delta_v(orbit: &Orbit, target: &Orbit, t: UT) -> f64 {
    delta_v_to_match_planes(orbit, target, t).norm()
}

#[cfg(test)]
fn minmus_orbit(i: f64, lan: f64) -> Orbit {
    Orbit {
        body: "Kerbin".into(),
        mu: 3.5316e12,
        soi: 8.4159e7,
        p: 47_000_000.0,
        e: 0.0,
        i,
        lan,
        argpe: 0.6,
        epoch: UT::default(),
        ta: 0.9,
    }
}

#[test]
fn matching_planes_need_nothing() {
    let a = minmus_orbit(0.1, 1.2);
    let b = Orbit {
        p: 12_000_000.0,
        ta: 2.0,
        ..minmus_orbit(0.1, 1.2)
    };
    for t in [0.0, 1e4, 7.7e5] {
        assert!(plane_change_delta_v(&a, &b, UT::new_seconds(t)) < 1e-9);
    }
}

#[test]
fn plane_change_at_node() {
    let a = minmus_orbit(0.0, 0.0);
    let b = minmus_orbit(0.2, 0.0);
    let asc = a.ascending_node_true_anomaly(&b).unwrap();
    let t = a.time_of_true_anomaly(asc, UT::default()).unwrap();
    let dv = delta_v_to_match_planes(&a, &b, t);
    let v = a.speed_at_radius(a.radius_at(t));
    // Rotating a circular velocity by i costs 2 v sin(i / 2).
    assert!((dv.norm() - 2.0 * v * libm::sin(0.1)).abs() < 1e-6 * v);
    // Mostly normal, with a small retrograde part.
    assert!(dv[1].abs() > dv[0].abs());
    assert!(dv[0] < 0.0);
    assert!(dv[2].abs() < 1e-6 * v);
}

#[test]
fn frenet_is_prograde_normal_radial() {
    let sv = minmus_orbit(0.0, 0.0).sv_bci();
    let m = frenet(&sv);
    let radial: Vector3<f64> = m.column(2).into_owned();
    assert!((radial - sv.position.normalize()).norm() < 1e-9);
    let burn = BurnPlan::new(None, 3.0, 4.0, 0.0, BurnKind::Ejection);
    assert_eq!(burn.total(), 5.0);
    assert!(!burn.is_expired(UT::new_seconds(1e9)));
}
