//! Patched-conic trajectory prediction.
//!
//! Only escapes are followed: a patch that leaves its body's sphere of
//! influence continues about the parent body. Encounters with other bodies
//! are not detected.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::orbits::{Orbit, StateVector};
use crate::{bodies::SolarSystem, time::UT};

/// One conic of a predicted trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub orbit: Orbit,
    pub start: UT,
    /// When the orbit leaves its body's sphere of influence, if it does.
    pub end: Option<UT>,
}

/// Time at which `orbit` next crosses its body's sphere of influence on the
/// way out, at or after `after`.
pub fn soi_exit_time(orbit: &Orbit, after: UT) -> Option<UT> {
    if !orbit.escapes() || !orbit.soi.is_finite() {
        return None;
    }
    let cos_ta = (orbit.p / orbit.soi - 1.0) / orbit.e;
    if !(-1.0..=1.0).contains(&cos_ta) {
        return None;
    }
    let ta = libm::acos(cos_ta);
    orbit.time_of_true_anomaly(ta, after).ok()
}

/// Predict the patches of `orbit` from `start`, at most `max_patches` long.
pub fn predict(system: &SolarSystem, orbit: Orbit, start: UT, max_patches: usize) -> Vec<Patch> {
    let mut patches = Vec::new();
    let mut orbit = orbit;
    let mut start = start;
    while patches.len() < max_patches {
        let end = soi_exit_time(&orbit, start);
        patches.push(Patch {
            orbit: orbit.clone(),
            start,
            end,
        });
        let Some(end) = end else {
            break;
        };
        let Some(next) = escape_to_parent(system, &orbit, end) else {
            break;
        };
        trace!(from = %orbit.body, to = %next.body, at = %end, "soi exit");
        orbit = next;
        start = end;
    }
    patches
}

/// Re-express `orbit` at time `t` about the parent of its body.
fn escape_to_parent(system: &SolarSystem, orbit: &Orbit, t: UT) -> Option<Orbit> {
    let body_orbit = system.get(&orbit.body)?.orbit.as_ref()?;
    let local = orbit.state_vectors_at(t);
    let body = body_orbit.state_vectors_at(t);
    let sv = StateVector {
        body: body_orbit.body.clone(),
        mu: body_orbit.mu,
        soi: body_orbit.soi,
        position: local.position + body.position,
        velocity: local.velocity + body.velocity,
        time: t,
    };
    Some(sv.into_orbit(1e-8))
}

#[test]
fn exit_time_hits_soi() {
    let mut orbit = Orbit::circular("Mun", 6.5138398e10, 2_429_559.1, 300_000.0, 0.0, 0.0, 0.0, UT::default());
    assert_eq!(soi_exit_time(&orbit, UT::default()), None);
    orbit.e = 1.3;
    orbit.p = 300_000.0 * 2.3;
    let t = soi_exit_time(&orbit, UT::default()).unwrap();
    assert!((orbit.radius_at(t) - orbit.soi).abs() / orbit.soi < 1e-6);
}
