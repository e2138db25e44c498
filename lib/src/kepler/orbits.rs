//! Keplerian orbits.

use std::{
    f64::consts::{self, TAU},
    sync::Arc,
};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use super::OrbitError;
use crate::{
    math::{clamp_positive, clamp_signed},
    time::UT,
};

/// Newton iterations allowed when solving Kepler's equation.
const KEPLER_MAXITER: u64 = 64;
const KEPLER_TOL: f64 = 1e-12;

/// A Keplerian orbit about a named body.
///
/// Elliptic orbits keep `ta` in `[0, τ)`, hyperbolic ones in `[-π, π)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    /// Name of the body being orbited.
    pub body: Arc<str>,
    /// Standard gravitational parameter of `body` (`m^3/s^2`).
    pub mu: f64,
    /// Sphere of influence radius of `body` (`m`).
    pub soi: f64,
    /// Semi-latus rectum (`m`).
    pub p: f64,
    /// Eccentricity (dimensionless).
    pub e: f64,
    /// Inclination (radians).
    pub i: f64,
    /// Longitude of ascending node (radians).
    pub lan: f64,
    /// Argument of periapsis (radians).
    pub argpe: f64,
    /// The epoch at true anomaly.
    #[serde(default)]
    pub epoch: UT,
    /// True anomaly at `epoch` (radians).
    pub ta: f64,
}

impl Orbit {
    /// A circular orbit of the given radius, at true anomaly `ta` at `epoch`.
    #[allow(clippy::too_many_arguments)]
    pub fn circular(
        body: impl Into<Arc<str>>,
        mu: f64,
        soi: f64,
        radius: f64,
        i: f64,
        lan: f64,
        ta: f64,
        epoch: UT,
    ) -> Self {
        Orbit {
            body: body.into(),
            mu,
            soi,
            p: radius,
            e: 0.0,
            i,
            lan,
            argpe: 0.0,
            epoch,
            ta: clamp_positive(ta),
        }
    }

    pub fn is_elliptic(&self) -> bool {
        self.e < 1.0
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.p / (1.0 + self.e)
    }

    pub fn apoapsis_radius(&self) -> f64 {
        if self.is_elliptic() {
            self.p / (1.0 - self.e)
        } else {
            f64::INFINITY
        }
    }

    /// Semi-major axis, negative for hyperbolic orbits.
    pub fn semimajor_axis(&self) -> f64 {
        self.p / (1.0 - self.e.powi(2))
    }

    pub fn mean_motion(&self) -> f64 {
        libm::sqrt(self.mu / self.semimajor_axis().abs().powi(3))
    }

    /// Orbital period, infinite for hyperbolic orbits.
    pub fn period(&self) -> f64 {
        if self.is_elliptic() {
            TAU / self.mean_motion()
        } else {
            f64::INFINITY
        }
    }

    /// Will this orbit leave the sphere of influence of its body?
    pub fn escapes(&self) -> bool {
        !self.is_elliptic() || self.apoapsis_radius() > self.soi
    }

    pub fn radius_at_true_anomaly(&self, ta: f64) -> f64 {
        self.p / (1.0 + self.e * libm::cos(ta))
    }

    pub fn radius_at(&self, t: UT) -> f64 {
        self.radius_at_true_anomaly(self.true_anomaly_at(t))
    }

    /// Speed at radius `r` from the vis-viva equation.
    pub fn speed_at_radius(&self, r: f64) -> f64 {
        libm::sqrt(self.mu * (2.0 / r - 1.0 / self.semimajor_axis()))
    }

    pub fn mean_anomaly_at_epoch(&self) -> f64 {
        // `ta` at epoch is always reachable by construction.
        ta_to_ma(self.ta, self.e).unwrap_or(0.0)
    }

    pub fn mean_anomaly_at(&self, t: UT) -> f64 {
        self.mean_anomaly_at_epoch() + self.mean_motion() * (t - self.epoch).as_seconds_f64()
    }

    pub fn true_anomaly_at(&self, t: UT) -> f64 {
        let ma = self.mean_anomaly_at(t);
        if self.is_elliptic() {
            let ea = ma_to_ea(clamp_positive(ma), self.e, KEPLER_TOL, KEPLER_MAXITER);
            clamp_positive(ea_to_ta(ea, self.e))
        } else {
            let ha = ma_to_ha(ma, self.e, KEPLER_TOL, KEPLER_MAXITER);
            ha_to_ta(ha, self.e)
        }
    }

    /// This orbit with its epoch moved to `t`.
    #[must_use]
    pub fn at(&self, t: UT) -> Orbit {
        Orbit {
            epoch: t,
            ta: self.true_anomaly_at(t),
            ..self.clone()
        }
    }

    pub fn state_vectors_at(&self, t: UT) -> StateVector {
        self.at(t).sv_bci()
    }

    /// The first time at or after `after` when this orbit passes through
    /// true anomaly `ta`.
    pub fn time_of_true_anomaly(&self, ta: f64, after: UT) -> Result<UT, OrbitError> {
        let n = self.mean_motion();
        let ma = ta_to_ma(ta, self.e)?;
        if self.is_elliptic() {
            let ma_after = clamp_positive(self.mean_anomaly_at(after));
            let dma = clamp_positive(ma - ma_after);
            Ok(after.add_seconds(dma / n))
        } else {
            let t = self
                .epoch
                .add_seconds((ma - self.mean_anomaly_at_epoch()) / n);
            if t < after {
                Err(OrbitError::Passed { ta })
            } else {
                Ok(t)
            }
        }
    }

    /// Unit angular momentum vector.
    pub fn normal(&self) -> Vector3<f64> {
        self.pqw_ijk_matrix().column(2).into_owned()
    }

    /// True anomaly at which this orbit points along `dir`.
    pub fn true_anomaly_of_direction(&self, dir: &Vector3<f64>) -> f64 {
        let mat = self.pqw_ijk_matrix();
        let p = mat.column(0).into_owned();
        let q = mat.column(1).into_owned();
        let ta = libm::atan2(dir.dot(&q), dir.dot(&p));
        if self.is_elliptic() {
            clamp_positive(ta)
        } else {
            ta
        }
    }

    /// True anomaly at which this orbit rises through the plane of `other`.
    ///
    /// `None` if the planes coincide.
    pub fn ascending_node_true_anomaly(&self, other: &Orbit) -> Option<f64> {
        let line = other.normal().cross(&self.normal());
        if line.norm() < 1e-12 {
            return None;
        }
        Some(self.true_anomaly_of_direction(&line))
    }

    /// True anomaly at which this orbit descends through the plane of `other`.
    pub fn descending_node_true_anomaly(&self, other: &Orbit) -> Option<f64> {
        let asc = self.ascending_node_true_anomaly(other)?;
        Some(if self.is_elliptic() {
            clamp_positive(asc + consts::PI)
        } else {
            clamp_signed(asc + consts::PI)
        })
    }

    /// Calculate the position and velocity in the perifocal
    /// coordinate system PQW at an orbit's current true anomaly.
    fn sv_pqw(&self) -> (Vector3<f64>, Vector3<f64>) {
        let r = self.radius_at_true_anomaly(self.ta);
        let rv = r * libm::cos(self.ta) * Vector3::new(1.0, 0.0, 0.0)
            + r * libm::sin(self.ta) * Vector3::new(0.0, 1.0, 0.0);
        let vv = libm::sqrt(self.mu / self.p)
            * (-libm::sin(self.ta) * Vector3::new(1.0, 0.0, 0.0)
                + (self.e + libm::cos(self.ta)) * Vector3::new(0.0, 1.0, 0.0));
        (rv, vv)
    }

    fn pqw_ijk_matrix(&self) -> Matrix3<f64> {
        let m11 = libm::cos(self.lan) * libm::cos(self.argpe)
            - libm::sin(self.lan) * libm::sin(self.argpe) * libm::cos(self.i);
        let m12 = -libm::cos(self.lan) * libm::sin(self.argpe)
            - libm::sin(self.lan) * libm::cos(self.argpe) * libm::cos(self.i);
        let m13 = libm::sin(self.lan) * libm::sin(self.i);
        let m21 = libm::sin(self.lan) * libm::cos(self.argpe)
            + libm::cos(self.lan) * libm::sin(self.argpe) * libm::cos(self.i);
        let m22 = -libm::sin(self.lan) * libm::sin(self.argpe)
            + libm::cos(self.lan) * libm::cos(self.argpe) * libm::cos(self.i);
        let m23 = -libm::cos(self.lan) * libm::sin(self.i);
        let m31 = libm::sin(self.argpe) * libm::sin(self.i);
        let m32 = libm::cos(self.argpe) * libm::sin(self.i);
        let m33 = libm::cos(self.i);

        Matrix3::new(m11, m12, m13, m21, m22, m23, m31, m32, m33)
    }

    /// Calculate the position and velocity in the body-centered
    /// inertial frame at an orbit's current true anomaly.
    pub fn sv_bci(&self) -> StateVector {
        let (rv, vv) = self.sv_pqw();
        let mat = self.pqw_ijk_matrix();
        StateVector {
            body: self.body.clone(),
            mu: self.mu,
            soi: self.soi,
            position: mat * rv,
            velocity: mat * vv,
            time: self.epoch,
        }
    }
}

/// Position and velocity relative to a body, in the shared inertial frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub body: Arc<str>,
    pub mu: f64,
    pub soi: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub time: UT,
}

impl StateVector {
    /// Convert this state vector into an [`Orbit`].
    ///
    /// Recommended tolerance (`tol`): `1e-8`.
    pub fn into_orbit(self, tol: f64) -> Orbit {
        let mu = self.mu;
        let rv = self.position;
        let r = rv.norm();
        let vv = self.velocity;
        let v = vv.norm();
        let hv = rv.cross(&vv);
        let h = hv.norm();
        let nv = Vector3::new(0.0, 0.0, 1.0).cross(&hv);
        let ev = 1.0 / mu * ((v.powi(2) - mu / r) * rv - rv.dot(&vv) * vv);
        let p = h.powi(2) / mu;
        let e = ev.norm();
        let i = libm::acos(hv[2] / h);

        let circular = e < tol;
        let equatorial = i.abs() < tol || (consts::PI - i).abs() < tol;
        // Retrograde equatorial orbits measure longitudes clockwise.
        let sense = if hv[2] < 0.0 { -1.0 } else { 1.0 };

        let (lan, argpe, ta) = if equatorial && !circular {
            (
                0.0,
                // Longitude of periapsis
                sense * libm::atan2(ev[1], ev[0]),
                libm::atan2(hv.dot(&ev.cross(&rv)) / h, rv.dot(&ev)),
            )
        } else if !equatorial && circular {
            (
                libm::atan2(nv[1], nv[0]),
                0.0,
                // Argument of latitude
                libm::atan2(rv.dot(&hv.cross(&nv)) / h, rv.dot(&nv)),
            )
        } else if equatorial && circular {
            (
                0.0,
                0.0,
                // True longitude
                sense * libm::atan2(rv[1], rv[0]),
            )
        } else {
            let a = p / (1.0 - e.powi(2));
            let mua = mu * a;

            let ta = if a > 0.0 {
                let e_se = rv.dot(&vv) / libm::sqrt(mua);
                let e_ce = r * vv.dot(&vv) / mu - 1.0;
                ea_to_ta(libm::atan2(e_se, e_ce), e)
            } else {
                let e_sh = rv.dot(&vv) / libm::sqrt(-mua);
                let e_ch = r * vv.norm_squared() / mu - 1.0;
                ha_to_ta(libm::log((e_ch + e_sh) / (e_ch - e_sh)) / 2.0, e)
            };

            let lan = libm::atan2(nv[1], nv[0]);
            let px = rv.dot(&nv);
            let py = (rv.dot(&hv.cross(&nv))) / h;
            let argpe = libm::atan2(py, px) - ta;

            (lan, argpe, ta)
        };

        let ta = if e < 1.0 {
            clamp_positive(ta)
        } else {
            clamp_signed(ta)
        };
        Orbit {
            body: self.body,
            mu,
            soi: self.soi,
            p,
            e,
            i,
            lan: clamp_positive(lan),
            argpe: clamp_positive(argpe),
            epoch: self.time,
            ta,
        }
    }
}

/// Elliptic true anomaly to eccentric anomaly, in `[0, τ)`.
pub fn ta_to_ea(ta: f64, e: f64) -> f64 {
    clamp_positive(
        2.0 * libm::atan(libm::sqrt((1.0 - e) / (1.0 + e)) * libm::tan(clamp_signed(ta) / 2.0)),
    )
}

pub fn ea_to_ma(ea: f64, e: f64) -> f64 {
    ea - e * libm::sin(ea)
}

pub fn ea_to_ta(ea: f64, e: f64) -> f64 {
    let beta = e / (1.0 + libm::sqrt(1.0 - e.powi(2)));
    ea + 2.0 * libm::atan2(beta * libm::sin(ea), 1.0 - beta * libm::cos(ea))
}

/// Hyperbolic true anomaly to hyperbolic anomaly.
///
/// Fails if `ta` lies beyond the asymptotes, where the orbit never goes.
pub fn ta_to_ha(ta: f64, e: f64) -> Result<f64, OrbitError> {
    let ta = clamp_signed(ta);
    let limit = libm::acos(-1.0 / e);
    if ta.abs() >= limit {
        return Err(OrbitError::Unreachable { ta, limit });
    }
    Ok(2.0 * libm::atanh(libm::sqrt((e - 1.0) / (e + 1.0)) * libm::tan(ta / 2.0)))
}

pub fn ha_to_ma(ha: f64, e: f64) -> f64 {
    e * libm::sinh(ha) - ha
}

pub fn ha_to_ta(ha: f64, e: f64) -> f64 {
    2.0 * libm::atan(libm::sqrt((e + 1.0) / (e - 1.0)) * libm::tanh(ha / 2.0))
}

/// True anomaly to mean anomaly for any non-parabolic orbit.
pub fn ta_to_ma(ta: f64, e: f64) -> Result<f64, OrbitError> {
    if e < 1.0 {
        Ok(ea_to_ma(ta_to_ea(ta, e), e))
    } else {
        Ok(ha_to_ma(ta_to_ha(ta, e)?, e))
    }
}

/// Solve Kepler's equation for the eccentric anomaly.
///
/// Returns the last Newton iterate if `maxiter` is exhausted.
pub fn ma_to_ea(ma: f64, e: f64, tol: f64, maxiter: u64) -> f64 {
    let mut ea = if e > 0.8 {
        consts::PI
    } else if -consts::PI < ma && ma < 0.0 || ma > consts::PI {
        ma - e
    } else {
        ma + e
    };

    for _ in 0..maxiter {
        let ea_new = ea + (ma - ea + e * libm::sin(ea)) / (1.0 - e * libm::cos(ea));
        if (ea_new - ea).abs() < tol {
            return ea_new;
        }
        ea = ea_new;
    }
    ea
}

/// Solve the hyperbolic Kepler equation `M = e sinh H - H`.
pub fn ma_to_ha(ma: f64, e: f64, tol: f64, maxiter: u64) -> f64 {
    let mut ha = ma.signum() * libm::log(2.0 * ma.abs() / e + 1.8);
    for _ in 0..maxiter {
        let ha_new = ha - (e * libm::sinh(ha) - ha - ma) / (e * libm::cosh(ha) - 1.0);
        if (ha_new - ha).abs() < tol {
            return ha_new;
        }
        ha = ha_new;
    }
    ha
}

#[cfg(test)]
fn kerbin_orbit(e: f64, i: f64) -> Orbit {
    Orbit {
        body: "Kerbin".into(),
        mu: 3.5316e12,
        soi: 8.4159e7,
        // 700 km periapsis
        p: 700_000.0 * (1.0 + e),
        e,
        i,
        lan: 0.3,
        argpe: 1.1,
        epoch: UT::new_seconds(0.0),
        ta: 0.4,
    }
}

#[test]
fn anomaly_round_trip() {
    for e in [0.0, 0.1, 0.5, 0.9] {
        for ta in [0.0, 0.5, 2.0, 3.1, 4.0, 6.0] {
            let ma = ta_to_ma(ta, e).unwrap();
            let ea = ma_to_ea(clamp_positive(ma), e, 1e-12, 64);
            assert!((clamp_positive(ea_to_ta(ea, e)) - ta).abs() < 1e-8, "e={e} ta={ta}");
        }
    }
    for ta in [-1.5, -0.3, 0.0, 0.7, 1.5] {
        let e = 2.5;
        let ma = ta_to_ma(ta, e).unwrap();
        let ha = ma_to_ha(ma, e, 1e-12, 64);
        assert!((ha_to_ta(ha, e) - ta).abs() < 1e-8);
    }
}

#[test]
fn hyperbolic_unreachable() {
    // Asymptote of e = 2 lies at acos(-1/2) = 2π/3.
    assert!(matches!(
        ta_to_ha(2.5, 2.0),
        Err(OrbitError::Unreachable { .. })
    ));
    let mut orbit = kerbin_orbit(0.0, 0.0);
    orbit.e = 2.0;
    orbit.p = 1_400_000.0;
    orbit.ta = -0.5;
    assert!(orbit
        .time_of_true_anomaly(2.5, orbit.epoch)
        .is_err());
    assert!(matches!(
        orbit.time_of_true_anomaly(-1.0, orbit.epoch),
        Err(OrbitError::Passed { .. })
    ));
    let t = orbit.time_of_true_anomaly(0.0, orbit.epoch).unwrap();
    assert!(t > orbit.epoch);
    assert!(orbit.true_anomaly_at(t).abs() < 1e-6);
}

#[test]
fn state_vector_round_trip() {
    for (e, i) in [(0.1, 0.2), (0.3, 2.5), (1.4, 0.7)] {
        let orbit = kerbin_orbit(e, i);
        let back = orbit.sv_bci().into_orbit(1e-8);
        assert!((back.p - orbit.p).abs() / orbit.p < 1e-9);
        assert!((back.e - orbit.e).abs() < 1e-9);
        assert!((back.i - orbit.i).abs() < 1e-9);
        assert!((clamp_signed(back.lan - orbit.lan)).abs() < 1e-9);
        assert!((clamp_signed(back.argpe - orbit.argpe)).abs() < 1e-9);
        assert!((clamp_signed(back.ta - orbit.ta)).abs() < 1e-9);
    }
}

#[test]
fn time_of_true_anomaly_matches_propagation() {
    let orbit = kerbin_orbit(0.2, 0.1);
    let after = UT::new_seconds(1000.0);
    let t = orbit.time_of_true_anomaly(3.0, after).unwrap();
    assert!(t >= after);
    assert!(t.as_seconds_f64() - after.as_seconds_f64() < orbit.period());
    assert!((orbit.true_anomaly_at(t) - 3.0).abs() < 1e-6);
}

#[test]
fn nodes_between_inclined_orbits() {
    let a = kerbin_orbit(0.0, 0.0);
    let b = Orbit {
        lan: 1.0,
        i: 0.3,
        ..kerbin_orbit(0.0, 0.0)
    };
    let asc = b.ascending_node_true_anomaly(&a).unwrap();
    let mut at_node = b.clone();
    at_node.ta = asc;
    let sv = at_node.sv_bci();
    // On the node the position lies in the other plane, climbing out of it.
    assert!(sv.position.dot(&a.normal()).abs() < 1e-3);
    assert!(sv.velocity.dot(&a.normal()) > 0.0);
    assert!(b.ascending_node_true_anomaly(&b).is_none());
}
