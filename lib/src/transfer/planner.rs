//! Ejection and plane-change burns for a single transfer.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use color_eyre::eyre::{self, OptionExt};
use tracing::{trace, warn};

use super::TransferPlan;
use crate::{
    config::PlannerConfig,
    host::{Endpoint, Host, Snapshot},
    kepler::{
        orbits::Orbit,
        phase::{self, orbit_direction},
        vis_viva,
    },
    maneuver::{self, BurnKind, BurnPlan},
    math::{clamp_positive, clamp_signed},
    time::UT,
};

/// Periapsis clearance kept above the surface when returning to a body with
/// no atmosphere, and above the atmosphere otherwise.
const RETURN_CLEARANCE: f64 = 10_000.0;
const RETURN_MIN_ALTITUDE: f64 = 30_000.0;
/// Orbits below this eccentricity can return to their parent at any time.
const RETURN_CIRCULAR_E: f64 = 0.01;

/// Solves burns against one snapshot.
#[derive(Copy, Clone, Debug)]
pub struct Planner<'a> {
    snapshot: &'a Snapshot,
    config: &'a PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(snapshot: &'a Snapshot, config: &'a PlannerConfig) -> Self {
        Self { snapshot, config }
    }

    /// Recompute the ejection burn of `plan`.
    ///
    /// A stored plane change that would now happen before departure is
    /// dropped.
    pub fn update_ejection(&self, plan: &mut TransferPlan) -> eyre::Result<()> {
        let burn = self.ejection_burn(&plan.origin, &plan.destination)?;
        let stale = match (&burn, &plan.plane_change) {
            (Some(ejection), Some(plane_change)) => match (ejection.time, plane_change.time) {
                (Some(e), Some(p)) => e > p,
                _ => false,
            },
            (None, _) => true,
            _ => false,
        };
        if stale {
            plan.plane_change = None;
        }
        plan.ejection = burn;
        Ok(())
    }

    /// Recompute the plane-change burn of `plan` from its ejection burn.
    pub fn update_plane_change(&self, host: &dyn Host, plan: &mut TransferPlan) -> eyre::Result<()> {
        plan.plane_change = match &plan.ejection {
            Some(ejection) => self.plane_change_burn(host, &plan.origin, &plan.destination, ejection)?,
            None => None,
        };
        Ok(())
    }

    /// The burn that starts the transfer from `origin` to `destination`.
    ///
    /// `Ok(None)` when there is nothing to solve or no solution, including
    /// an origin without an orbit; errors are reserved for an inconsistent
    /// system.
    pub fn ejection_burn(
        &self,
        origin: &Endpoint,
        destination: &Endpoint,
    ) -> eyre::Result<Option<BurnPlan>> {
        if self.snapshot.situation(origin).is_grounded() {
            return Ok(None);
        }
        let Some(orbit) = self.snapshot.orbit_of(origin) else {
            trace!(%origin, "origin has no orbit");
            return Ok(None);
        };
        self.solve(origin, orbit, destination)
    }

    fn solve(
        &self,
        origin: &Endpoint,
        orbit: &Orbit,
        destination: &Endpoint,
    ) -> eyre::Result<Option<BurnPlan>> {
        let home = Endpoint::Body(orbit.body.clone());
        if !orbit.is_elliptic() {
            if orbit.ta < 0.0 && *destination == home {
                return Ok(self.capture(orbit));
            }
            return Ok(None);
        }
        if *destination == home {
            return self.return_to_parent(orbit);
        }
        match self.immediate_destination(&orbit.body, destination) {
            Some((imm, _)) if imm == *origin => Ok(None),
            Some((_, imm_orbit)) => Ok(self.hohmann(orbit, imm_orbit)),
            None => self.fold_in(orbit, destination),
        }
    }

    /// The body or object in `destination`'s chain of parents that orbits
    /// `reference`, with its orbit.
    fn immediate_destination(
        &self,
        reference: &str,
        destination: &Endpoint,
    ) -> Option<(Endpoint, &'a Orbit)> {
        let mut endpoint = destination.clone();
        loop {
            let orbit = self.snapshot.orbit_of(&endpoint)?;
            if &*orbit.body == reference {
                return Some((endpoint, orbit));
            }
            endpoint = Endpoint::Body(orbit.body.clone());
        }
    }

    /// Transfer between two orbits about the same body.
    fn hohmann(&self, origin: &Orbit, destination: &Orbit) -> Option<BurnPlan> {
        if !destination.is_elliptic() {
            trace!(body = %destination.body, "destination is not on a closed orbit");
            return None;
        }
        let now = self.snapshot.now;
        let rate = orbit_direction(origin) * origin.mean_motion();
        let rel_rate = orbit_direction(destination) * destination.mean_motion() - rate;
        if rel_rate.abs() < f64::EPSILON * rate.abs() {
            trace!("orbits share a period; no transfer window");
            return None;
        }

        let optimal = phase::optimal_phase_angle(origin, destination, now);
        let current =
            phase::absolute_phase_angle(destination, now) - phase::absolute_phase_angle(origin, now);
        let wait = clamp_positive(rel_rate.signum() * (optimal - current)) / rel_rate.abs();
        let Some(estimate) = now.checked_add_seconds(wait) else {
            trace!(wait, "no representable transfer window");
            return None;
        };

        let synodic = TAU / rel_rate.abs();
        let half_window = synodic / 8.0;
        let search_start = if estimate.add_seconds(-half_window) > now {
            estimate.add_seconds(-half_window)
        } else {
            now
        };
        let refined = phase::burn_time_search(
            origin,
            destination,
            search_start,
            estimate.add_seconds(half_window),
        )
        .take(self.config.burn_search_slides)
        .find_map(|t| t)
        .filter(|t| (t.as_seconds_f64() - estimate.as_seconds_f64()).abs() < synodic / 4.0);
        let time = refined.unwrap_or(estimate);

        let arrival_angle =
            phase::absolute_phase_angle(origin, time) + orbit_direction(origin) * PI;
        let travel = phase::transfer_travel_time(origin, destination, time, Some(arrival_angle));
        let target_r = phase::radius_at_phase_angle(destination, arrival_angle);
        let dv = if origin.semimajor_axis() < destination.semimajor_axis() {
            vis_viva::burn_to_new_ap(origin, time, target_r)
        } else {
            vis_viva::burn_to_new_pe(origin, time, target_r)
        };
        trace!(
            body = %origin.body,
            burn = %time,
            arrival = %time.add_seconds(travel),
            refined = refined.is_some(),
            "transfer window"
        );
        Some(BurnPlan::new(Some(time), dv, 0.0, 0.0, BurnKind::Ejection))
    }

    /// Escape from `orbit` so as to leave its body's sphere of influence in
    /// the direction the body's own ejection burn asks for.
    fn fold_in(&self, orbit: &Orbit, destination: &Endpoint) -> eyre::Result<Option<BurnPlan>> {
        let body = self
            .snapshot
            .system
            .get(&orbit.body)
            .ok_or_eyre("orbit is about an unknown body")?;
        let Some(body_orbit) = body.orbit.as_ref() else {
            return Ok(None);
        };
        let body_endpoint = Endpoint::Body(body.name.clone());
        let Some(parent_burn) = self.solve(&body_endpoint, body_orbit, destination)? else {
            return Ok(None);
        };

        let now = self.snapshot.now;
        let v_soi = parent_burn.total();
        let retrograde = parent_burn.prograde() < 0.0;
        let dir = orbit_direction(orbit);
        let mut time = parent_burn.time.unwrap_or(now);
        let mut converged = false;
        for _ in 0..self.config.ejection_iterations {
            let r = orbit.radius_at(time);
            let body_velocity = body_orbit.state_vectors_at(time).velocity;
            let mut exit = libm::atan2(body_velocity[1], body_velocity[0]);
            if retrograde {
                exit += PI;
            }
            let midnight = exit + dir * FRAC_PI_2;
            let angle = midnight + dir * vis_viva::ejection_angle(orbit.mu, r, v_soi);
            let Ok(next) = phase::time_at_phase_angle_near(orbit, clamp_positive(angle), time) else {
                return Ok(None);
            };
            let step = (next.as_seconds_f64() - time.as_seconds_f64()).abs();
            time = next;
            if step < self.config.ejection_tolerance {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(
                body = %orbit.body,
                destination = %destination,
                iterations = self.config.ejection_iterations,
                "ejection time did not converge"
            );
        }

        if time < now {
            let period = orbit.period();
            let behind = now.as_seconds_f64() - time.as_seconds_f64();
            time = time.add_seconds(libm::ceil(behind / period) * period);
        }

        let r = orbit.radius_at(time);
        let dv = vis_viva::speed_to_exit_soi(orbit.mu, orbit.soi, r, v_soi) - orbit.speed_at_radius(r);
        trace!(body = %orbit.body, burn = %time, v_soi, dv, "folded ejection");
        Ok(Some(BurnPlan::new(Some(time), dv, 0.0, 0.0, BurnKind::Ejection)))
    }

    /// Lower periapsis into the atmosphere, or near the surface, of the body
    /// being orbited.
    fn return_to_parent(&self, orbit: &Orbit) -> eyre::Result<Option<BurnPlan>> {
        let body = self
            .snapshot
            .system
            .get(&orbit.body)
            .ok_or_eyre("orbit is about an unknown body")?;
        let target_pe =
            body.radius + (body.atmosphere_depth + RETURN_CLEARANCE).max(RETURN_MIN_ALTITUDE);
        if orbit.periapsis_radius() <= target_pe {
            return Ok(None);
        }
        let now = self.snapshot.now;
        let time = if orbit.e < RETURN_CIRCULAR_E {
            None
        } else {
            Some(orbit.time_of_true_anomaly(PI, now)?)
        };
        let dv = vis_viva::burn_to_new_pe(orbit, time.unwrap_or(now), target_pe);
        Ok(Some(BurnPlan::new(time, dv, 0.0, 0.0, BurnKind::Ejection)))
    }

    /// Circularise at the next periapsis of an inbound hyperbola.
    fn capture(&self, orbit: &Orbit) -> Option<BurnPlan> {
        let time = orbit.time_of_true_anomaly(0.0, self.snapshot.now).ok()?;
        let r = orbit.periapsis_radius();
        let dv = libm::sqrt(orbit.mu / r) - orbit.speed_at_radius(r);
        Some(BurnPlan::new(Some(time), dv, 0.0, 0.0, BurnKind::Capture))
    }

    /// The burn at the first node with the destination's plane after
    /// `ejection`, on the previewed trajectory.
    pub fn plane_change_burn(
        &self,
        host: &dyn Host,
        origin: &Endpoint,
        destination: &Endpoint,
        ejection: &BurnPlan,
    ) -> eyre::Result<Option<BurnPlan>> {
        let orbit = self
            .snapshot
            .orbit_of(origin)
            .ok_or_eyre("origin has no orbit")?;
        let Some(target) = self.snapshot.orbit_of(destination) else {
            return Ok(None);
        };
        let patches = host.preview_trajectory(orbit, ejection, self.config.max_preview_patches)?;
        let Some(patch) = patches.iter().find(|p| p.orbit.body == target.body) else {
            trace!(destination = %destination, "preview never reaches the destination's body");
            return Ok(None);
        };

        let departure = ejection.time.unwrap_or(self.snapshot.now);
        let after = patch.start.max(departure);
        let node_time = |ta: Option<f64>| -> Option<UT> {
            let t = patch.orbit.time_of_true_anomaly(ta?, after).ok()?;
            (t > departure && patch.end.map_or(true, |end| t <= end)).then_some(t)
        };
        let asc = node_time(patch.orbit.ascending_node_true_anomaly(target));
        let desc = node_time(patch.orbit.descending_node_true_anomaly(target));
        let Some(time) = asc.into_iter().chain(desc).min() else {
            return Ok(None);
        };

        let deltav = maneuver::delta_v_to_match_planes(&patch.orbit, target, time);
        if deltav.norm() < self.config.plane_change_threshold {
            return Ok(None);
        }
        trace!(
            destination = %destination,
            at = %time,
            dv = deltav.norm(),
            node = clamp_signed(patch.orbit.true_anomaly_at(time)),
            "plane change"
        );
        Ok(Some(BurnPlan {
            time: Some(time),
            deltav,
            kind: BurnKind::PlaneChange,
        }))
    }
}

#[cfg(test)]
mod fixtures {
    use std::sync::Arc;

    use crate::{
        bodies::{Body, SolarSystem},
        host::{Craft, Endpoint, Situation, Snapshot},
        kepler::orbits::Orbit,
        time::UT,
    };

    pub const JOOL_MU: f64 = 2.8252800e14;
    pub const JOOL_SOI: f64 = 2.4559852e9;

    fn body(name: &str, parent: Option<&str>, mu: f64, radius: f64, soi: f64, orbit: Option<Orbit>) -> Body {
        Body {
            name: name.into(),
            mu,
            radius,
            soi,
            atmosphere_depth: 0.0,
            has_surface: true,
            parent: parent.map(Into::into),
            satellites: Vec::new(),
            orbit,
        }
    }

    pub fn moon_orbit(radius: f64, ta: f64, i: f64) -> Orbit {
        Orbit::circular("Jool", JOOL_MU, JOOL_SOI, radius, i, 0.0, ta, UT::default())
    }

    /// A gas giant with two moons.
    pub fn jool_system(inner_i: f64, outer_i: f64) -> SolarSystem {
        let mut jool = body("Jool", None, JOOL_MU, 6_000_000.0, f64::INFINITY, None);
        jool.has_surface = false;
        let laythe = body(
            "Laythe",
            Some("Jool"),
            1.962e12,
            500_000.0,
            3_723_645.8,
            Some(moon_orbit(27_184_000.0, 0.0, inner_i)),
        );
        let tylo = body(
            "Tylo",
            Some("Jool"),
            2.825e12,
            600_000.0,
            10_856_518.0,
            Some(moon_orbit(68_500_000.0, 2.5, outer_i)),
        );
        SolarSystem::from_bodies([jool, laythe, tylo]).unwrap()
    }

    pub fn snapshot(system: SolarSystem, craft: Option<Craft>) -> Snapshot {
        Snapshot {
            now: UT::default(),
            system: Arc::new(system),
            craft,
            objects: Vec::new(),
            target: None,
        }
    }

    pub fn craft_around(body: &str, mu: f64, soi: f64, radius: f64, i: f64) -> Craft {
        Craft {
            name: "Probe".into(),
            situation: Situation::Orbiting,
            body: body.into(),
            orbit: Some(Orbit::circular(body, mu, soi, radius, i, 0.0, 1.0, UT::default())),
        }
    }

    pub fn probe() -> Endpoint {
        Endpoint::Object("Probe".into())
    }
}

#[cfg(test)]
use crate::host::{Craft, Situation, TrackedObject};
#[cfg(test)]
use fixtures::*;

#[test]
fn moon_to_moon_window() {
    let snap = snapshot(jool_system(0.0, 0.0), None);
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let laythe = Endpoint::Body("Laythe".into());
    let tylo = Endpoint::Body("Tylo".into());
    let burn = planner.ejection_burn(&laythe, &tylo).unwrap().unwrap();
    let time = burn.time.unwrap();
    let inner = snap.orbit_of(&laythe).unwrap();
    let outer = snap.orbit_of(&tylo).unwrap();
    assert!(time > snap.now);
    assert!(time.as_seconds_f64() < outer.period());
    assert!(burn.prograde() > 0.0);
    assert!(phase::arrival_phase_error(inner, outer, time).abs() < 1e-2);

    // The reverse transfer lowers the orbit instead.
    let back = planner.ejection_burn(&tylo, &laythe).unwrap().unwrap();
    assert!(back.prograde() < 0.0);
    assert!(phase::arrival_phase_error(outer, inner, back.time.unwrap()).abs() < 1e-2);
}

#[test]
fn opposite_directions_still_meet() {
    let snap = snapshot(jool_system(0.0, PI), None);
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let laythe = Endpoint::Body("Laythe".into());
    let tylo = Endpoint::Body("Tylo".into());
    let inner = snap.orbit_of(&laythe).unwrap();
    let outer = snap.orbit_of(&tylo).unwrap();
    for (from, to, a, b) in [(&laythe, &tylo, inner, outer), (&tylo, &laythe, outer, inner)] {
        let burn = planner.ejection_burn(from, to).unwrap().unwrap();
        let time = burn.time.unwrap();
        assert!(time > snap.now);
        assert!(phase::arrival_phase_error(a, b, time).abs() < 1e-2);
    }
}

#[test]
fn escape_from_moon_orbit() {
    let craft = craft_around("Laythe", 1.962e12, 3_723_645.8, 600_000.0, 0.0);
    let snap = snapshot(jool_system(0.0, 0.0), Some(craft));
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let tylo = Endpoint::Body("Tylo".into());
    let burn = planner.ejection_burn(&probe(), &tylo).unwrap().unwrap();
    let time = burn.time.unwrap();
    assert!(time >= snap.now);
    let orbit = snap.orbit_of(&probe()).unwrap();

    // Leaves around the moon's own window, fast enough to carry its transfer
    // speed out of the sphere of influence.
    let parent = planner
        .ejection_burn(&Endpoint::Body("Laythe".into()), &tylo)
        .unwrap()
        .unwrap();
    let lead = parent.time.unwrap().as_seconds_f64() - time.as_seconds_f64();
    assert!(lead.abs() < orbit.period());
    let r = orbit.radius_at(time);
    let exit = vis_viva::speed_to_exit_soi(orbit.mu, orbit.soi, r, parent.total());
    assert!((burn.prograde() - (exit - orbit.speed_at_radius(r))).abs() < 1e-6);
    assert!(burn.prograde() > 0.0);

    // Nothing to do for the body the craft already orbits.
    let laythe = Endpoint::Body("Laythe".into());
    assert!(planner.ejection_burn(&laythe, &laythe).unwrap().is_none());
}

#[test]
fn return_lowers_periapsis() {
    let craft = craft_around("Laythe", 1.962e12, 3_723_645.8, 900_000.0, 0.0);
    let snap = snapshot(jool_system(0.0, 0.0), Some(craft));
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let burn = planner
        .ejection_burn(&probe(), &Endpoint::Body("Laythe".into()))
        .unwrap()
        .unwrap();
    // Circular, so any time will do.
    assert_eq!(burn.time, None);
    assert!(burn.prograde() < 0.0);
}

#[test]
fn grounded_and_escaping_craft_have_no_ejection() {
    let mut craft = craft_around("Laythe", 1.962e12, 3_723_645.8, 600_000.0, 0.0);
    craft.situation = Situation::Landed;
    let snap = snapshot(jool_system(0.0, 0.0), Some(craft.clone()));
    let config = PlannerConfig::default();
    let tylo = Endpoint::Body("Tylo".into());
    assert!(Planner::new(&snap, &config).ejection_burn(&probe(), &tylo).unwrap().is_none());

    // No orbit to burn from is no solution, not a failure.
    let lost = Craft {
        situation: Situation::Flying,
        orbit: None,
        ..craft.clone()
    };
    let snap = snapshot(jool_system(0.0, 0.0), Some(lost));
    assert!(Planner::new(&snap, &config).ejection_burn(&probe(), &tylo).unwrap().is_none());

    craft.situation = Situation::Escaping;
    if let Some(orbit) = &mut craft.orbit {
        orbit.e = 1.5;
        orbit.p = 600_000.0 * 2.5;
        orbit.ta = 0.3;
    }
    let snap = snapshot(jool_system(0.0, 0.0), Some(craft.clone()));
    let planner = Planner::new(&snap, &config);
    assert!(planner.ejection_burn(&probe(), &tylo).unwrap().is_none());
    assert!(planner
        .ejection_burn(&probe(), &Endpoint::Body("Laythe".into()))
        .unwrap()
        .is_none());

    // Inbound, a capture is offered instead.
    if let Some(orbit) = &mut craft.orbit {
        orbit.ta = -0.3;
    }
    let snap = snapshot(jool_system(0.0, 0.0), Some(craft));
    let planner = Planner::new(&snap, &config);
    let capture = planner
        .ejection_burn(&probe(), &Endpoint::Body("Laythe".into()))
        .unwrap()
        .unwrap();
    assert_eq!(capture.kind, BurnKind::Capture);
    assert!(capture.prograde() < 0.0);
    assert!(capture.time.unwrap() > snap.now);
}

#[test]
fn inclined_destination_needs_plane_change() {
    use crate::host::{Host, StaticHost};

    let system = jool_system(0.0, 0.15);
    let host = StaticHost::new(system.clone());
    let snap = snapshot(system, None);
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let mut plan = TransferPlan::new(
        0,
        Endpoint::Body("Laythe".into()),
        Endpoint::Body("Tylo".into()),
    );
    planner.update_ejection(&mut plan).unwrap();
    planner.update_plane_change(&host, &mut plan).unwrap();
    let ejection = plan.ejection.as_ref().unwrap();
    let plane_change = plan.plane_change.as_ref().unwrap();
    assert_eq!(plane_change.kind, BurnKind::PlaneChange);
    assert!(plane_change.time.unwrap() > ejection.time.unwrap());
    assert!(plane_change.normal().abs() > config.plane_change_threshold);
    assert!(host.maneuvers().is_empty());
    assert_eq!(host.now(), UT::default());

    // Coplanar moons need none.
    let flat = jool_system(0.0, 0.0);
    let host = StaticHost::new(flat.clone());
    let snap = snapshot(flat, None);
    let planner = Planner::new(&snap, &config);
    planner.update_ejection(&mut plan).unwrap();
    planner.update_plane_change(&host, &mut plan).unwrap();
    assert!(plan.ejection.is_some());
    assert!(plan.plane_change.is_none());
}

#[test]
fn later_ejection_drops_earlier_plane_change() {
    let snap = snapshot(jool_system(0.0, 0.0), None);
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let mut plan = TransferPlan::new(
        0,
        Endpoint::Body("Laythe".into()),
        Endpoint::Body("Tylo".into()),
    );
    plan.plane_change = Some(BurnPlan::new(Some(snap.now), 0.0, 50.0, 0.0, BurnKind::PlaneChange));
    planner.update_ejection(&mut plan).unwrap();
    let ejection = plan.ejection.clone().unwrap();
    assert!(ejection.time.unwrap() > snap.now);
    assert!(plan.plane_change.is_none());

    // One still ahead of the ejection survives.
    let after = ejection.time.unwrap().add_seconds(1e6);
    let kept = BurnPlan::new(Some(after), 0.0, 50.0, 0.0, BurnKind::PlaneChange);
    plan.plane_change = Some(kept.clone());
    planner.update_ejection(&mut plan).unwrap();
    assert_eq!(plan.ejection, Some(ejection));
    assert_eq!(plan.plane_change, Some(kept));
}

#[test]
fn open_orbit_destination_has_no_window() {
    let mut snap = snapshot(jool_system(0.0, 0.0), None);
    snap.now = UT::new_seconds(100_000.0);
    let mut comet = moon_orbit(27_184_000.0, 0.3, 0.0);
    comet.e = 1.5;
    comet.p = 27_184_000.0 * 2.5;
    snap.objects.push(TrackedObject {
        name: "Comet".into(),
        orbit: comet,
    });
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let comet = Endpoint::Object("Comet".into());
    let laythe = Endpoint::Body("Laythe".into());
    assert!(planner.ejection_burn(&laythe, &comet).unwrap().is_none());

    // Nor from a craft that has to leave Laythe first.
    snap.craft = Some(craft_around("Laythe", 1.962e12, 3_723_645.8, 600_000.0, 0.0));
    let planner = Planner::new(&snap, &config);
    assert!(planner.ejection_burn(&probe(), &comet).unwrap().is_none());
}

#[test]
fn twin_orbits_terminate() {
    let mut snap = snapshot(jool_system(0.0, 0.0), None);
    snap.objects.push(TrackedObject {
        name: "Twin".into(),
        orbit: moon_orbit(27_184_000.0 * (1.0 + 3e-15), 1.0, 0.0),
    });
    let config = PlannerConfig::default();
    let planner = Planner::new(&snap, &config);
    let laythe = Endpoint::Body("Laythe".into());
    let twin = Endpoint::Object("Twin".into());
    // The synodic period is around 1e18 s; the search must still finish.
    if let Some(burn) = planner.ejection_burn(&laythe, &twin).unwrap() {
        assert!(burn.time.unwrap() >= snap.now);
    }
}
