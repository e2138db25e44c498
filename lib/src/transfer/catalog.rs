//! The list of transfers available from one origin.

use std::{f64::consts::FRAC_PI_2, sync::Arc};

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{planner::Planner, TransferPlan};
use crate::{
    config::PlannerConfig,
    host::{Endpoint, Host, Snapshot},
    time::UT,
};

/// Conditions that limit or prevent enumeration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFlags {
    /// Leaving the reference body on a hyperbola; nothing can be planned.
    pub hyperbolic_outbound: bool,
    /// Too close to a polar orbit for phase angles to mean anything.
    pub inclination_out_of_range: bool,
    /// On the surface. Destinations are listed, but without burns.
    pub landed: bool,
    /// Neither landed nor in orbit.
    pub no_orbit: bool,
}

impl CatalogFlags {
    /// Did classification stop enumeration?
    pub fn blocks_transfers(&self) -> bool {
        self.hyperbolic_outbound || self.inclination_out_of_range || self.no_orbit
    }
}

#[derive(Clone, Debug)]
pub struct TransferCatalog {
    origin: Endpoint,
    snapshot: Snapshot,
    transfers: Vec<TransferPlan>,
    flags: CatalogFlags,
    target_found: bool,
}

impl TransferCatalog {
    /// Enumerate the destinations reachable from `origin`. Burns are not
    /// computed yet.
    pub fn new(snapshot: Snapshot, origin: Endpoint, config: &PlannerConfig) -> Self {
        let mut catalog = Self {
            origin,
            snapshot,
            transfers: Vec::new(),
            flags: CatalogFlags::default(),
            target_found: false,
        };
        catalog.enumerate(config);
        debug!(
            origin = %catalog.origin,
            transfers = catalog.transfers.len(),
            flags = ?catalog.flags,
            "catalog built"
        );
        catalog
    }

    fn enumerate(&mut self, config: &PlannerConfig) {
        let snapshot = &self.snapshot;
        let origin = &self.origin;
        self.flags.landed = snapshot.situation(origin).is_grounded();

        if let Some(orbit) = snapshot.orbit_of(origin) {
            if !orbit.is_elliptic() {
                if orbit.ta >= 0.0 {
                    self.flags.hyperbolic_outbound = true;
                } else {
                    let home = Endpoint::Body(orbit.body.clone());
                    let mut plan = TransferPlan::new(0, origin.clone(), home);
                    plan.transfer_parent = Some(orbit.body.clone());
                    self.transfers.push(plan);
                }
                return;
            }
            if (orbit.i - FRAC_PI_2).abs() < config.polar_inclination_margin {
                self.flags.inclination_out_of_range = true;
                return;
            }
        } else if !self.flags.landed {
            self.flags.no_orbit = true;
            return;
        }

        let Some(start) = snapshot.reference_body(origin) else {
            self.flags.no_orbit = true;
            return;
        };

        let mut destinations = Vec::new();
        let mut came_from = origin.clone();
        for level in snapshot.system.lineage(&start) {
            if level.has_surface && level.name != start {
                destinations.push(Endpoint::Body(level.name.clone()));
            }

            let mut siblings: Vec<(OrderedFloat<f64>, Endpoint)> = snapshot
                .system
                .satellites(&level.name)
                .filter_map(|b| {
                    let orbit = b.orbit.as_ref()?;
                    Some((OrderedFloat(orbit.semimajor_axis()), Endpoint::Body(b.name.clone())))
                })
                .collect();
            if config.include_tracked_objects {
                siblings.extend(
                    snapshot
                        .objects
                        .iter()
                        .filter(|o| o.orbit.body == level.name)
                        .map(|o| (OrderedFloat(o.orbit.semimajor_axis()), Endpoint::Object(o.name.clone()))),
                );
            }
            // Stable, so bodies stay ahead of objects on equal orbits.
            siblings.sort_by_key(|(sma, _)| *sma);
            destinations.extend(
                siblings
                    .into_iter()
                    .map(|(_, e)| e)
                    .filter(|e| *e != came_from && e != origin),
            );

            came_from = Endpoint::Body(level.name.clone());
        }

        if let Some(target) = &snapshot.target {
            if target != origin && snapshot.orbit_of(target).is_some() {
                self.target_found = destinations.contains(target);
                destinations.insert(0, target.clone());
            }
        }

        let origin_chain: Vec<Arc<str>> = snapshot
            .system
            .lineage(&start)
            .map(|b| b.name.clone())
            .collect();
        self.transfers = destinations
            .into_iter()
            .enumerate()
            .map(|(index, destination)| {
                let mut plan = TransferPlan::new(index, origin.clone(), destination);
                plan.transfer_parent = transfer_parent(snapshot, &origin_chain, &plan.destination);
                plan
            })
            .collect();
    }

    /// Compute every ejection burn. Failures are logged and leave that
    /// transfer without a burn.
    pub fn compute_ejection_burns(&mut self, config: &PlannerConfig) {
        let planner = Planner::new(&self.snapshot, config);
        for plan in &mut self.transfers {
            if let Err(error) = planner.update_ejection(plan) {
                warn!(destination = %plan.destination, %error, "ejection burn failed");
                plan.ejection = None;
                plan.plane_change = None;
            }
        }
    }

    /// Compute every plane-change burn from the ejection burns.
    ///
    /// On failure the host's maneuvers are cleared, in case a preview left
    /// something behind.
    pub fn compute_plane_change_burns(&mut self, host: &dyn Host, config: &PlannerConfig) {
        let planner = Planner::new(&self.snapshot, config);
        for plan in &mut self.transfers {
            if let Err(error) = planner.update_plane_change(host, plan) {
                warn!(destination = %plan.destination, %error, "plane change failed");
                plan.plane_change = None;
                host.clear_maneuvers();
            }
        }
    }

    /// Does any ejection burn lie before `now`?
    pub fn has_expired(&self, now: UT) -> bool {
        self.transfers.iter().any(|p| p.is_expired(now))
    }

    /// Recompute the transfers whose ejection burn has passed against a
    /// fresh `snapshot`. Returns how many were recomputed.
    pub fn refresh_expired(
        &mut self,
        snapshot: Snapshot,
        host: &dyn Host,
        config: &PlannerConfig,
    ) -> usize {
        self.snapshot = snapshot;
        let now = self.snapshot.now;
        let planner = Planner::new(&self.snapshot, config);
        let mut refreshed = 0;
        for plan in self.transfers.iter_mut().filter(|p| p.is_expired(now)) {
            refreshed += 1;
            if let Err(error) = planner.update_ejection(plan) {
                warn!(destination = %plan.destination, %error, "ejection burn failed");
                plan.ejection = None;
                plan.plane_change = None;
                continue;
            }
            if config.generate_plane_change_burns {
                if let Err(error) = planner.update_plane_change(host, plan) {
                    warn!(destination = %plan.destination, %error, "plane change failed");
                    plan.plane_change = None;
                    host.clear_maneuvers();
                }
            }
        }
        if refreshed > 0 {
            debug!(refreshed, at = %now, "expired burns recomputed");
        }
        refreshed
    }

    pub fn origin(&self) -> &Endpoint {
        &self.origin
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Transfers in discovery order.
    pub fn transfers(&self) -> &[TransferPlan] {
        &self.transfers
    }

    pub fn flags(&self) -> CatalogFlags {
        self.flags
    }

    /// Was the host's target among the enumerated destinations?
    pub fn target_found(&self) -> bool {
        self.target_found
    }

    /// Solved transfers, cheapest first; ties keep discovery order.
    pub fn by_delta_v(&self, config: &PlannerConfig) -> Vec<&TransferPlan> {
        self.transfers
            .iter()
            .filter_map(|p| Some((OrderedFloat(p.total_delta_v(config)?), p)))
            .sorted_by_key(|(dv, _)| *dv)
            .map(|(_, p)| p)
            .collect()
    }
}

/// The innermost body shared by the origin's chain of reference bodies and
/// the destination's chain of parents.
fn transfer_parent(
    snapshot: &Snapshot,
    origin_chain: &[Arc<str>],
    destination: &Endpoint,
) -> Option<Arc<str>> {
    let first = match destination {
        Endpoint::Body(name) => name.clone(),
        Endpoint::Object(_) => snapshot.reference_body(destination)?,
    };
    snapshot
        .system
        .lineage(&first)
        .map(|b| b.name.clone())
        .find(|name| origin_chain.contains(name))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, f64::consts::FRAC_PI_2, sync::Arc};

    use super::*;
    use crate::{
        bodies::{Body, SolarSystem},
        host::{Craft, Situation, TrackedObject},
        kepler::orbits::Orbit,
    };

    const KERBOL_MU: f64 = 1.1723328e18;
    const KERBIN_MU: f64 = 3.5316e12;
    const KERBIN_SOI: f64 = 84_159_286.0;

    fn body(name: &str, parent: Option<(&str, f64, f64)>, surface: bool) -> Body {
        Body {
            name: name.into(),
            mu: 1e11,
            radius: 200_000.0,
            soi: 2e6,
            atmosphere_depth: 0.0,
            has_surface: surface,
            parent: parent.map(|(p, _, _)| p.into()),
            satellites: Vec::new(),
            orbit: parent.map(|(p, mu, r)| {
                Orbit::circular(p, mu, f64::INFINITY, r, 0.0, 0.0, 0.0, UT::default())
            }),
        }
    }

    fn system() -> SolarSystem {
        let mut kerbin = body("Kerbin", Some(("Kerbol", KERBOL_MU, 13_599_840_256.0)), true);
        kerbin.mu = KERBIN_MU;
        kerbin.radius = 600_000.0;
        kerbin.soi = KERBIN_SOI;
        SolarSystem::from_bodies([
            body("Kerbol", None, false),
            body("Moho", Some(("Kerbol", KERBOL_MU, 5_263_138_304.0)), true),
            kerbin,
            body("Duna", Some(("Kerbol", KERBOL_MU, 20_726_155_264.0)), true),
            body("Minmus", Some(("Kerbin", KERBIN_MU, 47_000_000.0)), true),
            body("Mun", Some(("Kerbin", KERBIN_MU, 12_000_000.0)), true),
        ])
        .unwrap()
    }

    fn snapshot(craft_body: &str, i: f64) -> Snapshot {
        let orbit = Orbit::circular(craft_body, KERBIN_MU, KERBIN_SOI, 700_000.0, i, 0.0, 0.0, UT::default());
        Snapshot {
            now: UT::default(),
            system: Arc::new(system()),
            craft: Some(Craft {
                name: "Probe".into(),
                situation: Situation::Orbiting,
                body: craft_body.into(),
                orbit: Some(orbit),
            }),
            objects: Vec::new(),
            target: None,
        }
    }

    fn probe() -> Endpoint {
        Endpoint::Object("Probe".into())
    }

    fn names(catalog: &TransferCatalog) -> Vec<&str> {
        catalog.transfers().iter().map(|p| &**p.destination.name()).collect()
    }

    #[test]
    fn walks_outward_from_low_orbit() {
        let catalog = TransferCatalog::new(snapshot("Kerbin", 0.0), probe(), &PlannerConfig::default());
        assert_eq!(names(&catalog), ["Mun", "Minmus", "Moho", "Duna"]);
        assert!(!catalog.flags().blocks_transfers());
        let parents: Vec<_> = catalog
            .transfers()
            .iter()
            .map(|p| p.transfer_parent.as_deref())
            .collect();
        assert_eq!(parents, [Some("Kerbin"), Some("Kerbin"), Some("Kerbol"), Some("Kerbol")]);
        for (i, plan) in catalog.transfers().iter().enumerate() {
            assert_eq!(plan.index, i);
        }
    }

    #[test]
    fn body_origin_skips_itself_and_returns_home() {
        let mut snap = snapshot("Kerbin", 0.0);
        snap.craft = None;
        let mun = Endpoint::Body("Mun".into());
        let catalog = TransferCatalog::new(snap, mun.clone(), &PlannerConfig::default());
        let dests: HashSet<_> = catalog.transfers().iter().map(|p| p.destination.clone()).collect();
        assert!(!dests.contains(&mun));
        assert_eq!(dests.len(), catalog.transfers().len());
        assert_eq!(names(&catalog), ["Minmus", "Moho", "Duna"]);

        // From Mun orbit, Kerbin itself is a destination.
        let mut snap = snapshot("Mun", 0.0);
        if let Some(craft) = &mut snap.craft {
            craft.orbit = Some(Orbit::circular("Mun", 6.5138398e10, 2_429_559.1, 250_000.0, 0.0, 0.0, 0.0, UT::default()));
        }
        let catalog = TransferCatalog::new(snap, probe(), &PlannerConfig::default());
        assert_eq!(names(&catalog), ["Kerbin", "Minmus", "Moho", "Duna"]);
    }

    #[test]
    fn objects_sorted_in_and_target_first() {
        let mut snap = snapshot("Kerbin", 0.0);
        snap.objects.push(TrackedObject {
            name: "Rock".into(),
            orbit: Orbit::circular("Kerbin", KERBIN_MU, KERBIN_SOI, 30_000_000.0, 0.1, 0.0, 0.0, UT::default()),
        });
        snap.target = Some(Endpoint::Body("Duna".into()));
        let catalog = TransferCatalog::new(snap.clone(), probe(), &PlannerConfig::default());
        assert_eq!(names(&catalog), ["Duna", "Mun", "Rock", "Minmus", "Moho", "Duna"]);
        assert!(catalog.target_found());

        let config = PlannerConfig {
            include_tracked_objects: false,
            ..PlannerConfig::default()
        };
        snap.target = Some(Endpoint::Object("Rock".into()));
        let catalog = TransferCatalog::new(snap, probe(), &config);
        assert_eq!(names(&catalog), ["Rock", "Mun", "Minmus", "Moho", "Duna"]);
        assert!(!catalog.target_found());
    }

    #[test]
    fn classification_stops_enumeration() {
        let config = PlannerConfig::default();
        let polar = TransferCatalog::new(snapshot("Kerbin", FRAC_PI_2 - 0.1), probe(), &config);
        assert!(polar.flags().inclination_out_of_range);
        assert!(polar.transfers().is_empty());

        let mut snap = snapshot("Kerbin", 0.0);
        if let Some(orbit) = snap.craft.as_mut().and_then(|c| c.orbit.as_mut()) {
            orbit.e = 1.2;
            orbit.p = 700_000.0 * 2.2;
            orbit.ta = 0.5;
        }
        let outbound = TransferCatalog::new(snap.clone(), probe(), &config);
        assert!(outbound.flags().hyperbolic_outbound);
        assert!(outbound.transfers().is_empty());

        if let Some(orbit) = snap.craft.as_mut().and_then(|c| c.orbit.as_mut()) {
            orbit.ta = -0.5;
        }
        let mut inbound = TransferCatalog::new(snap, probe(), &config);
        assert_eq!(names(&inbound), ["Kerbin"]);
        inbound.compute_ejection_burns(&config);
        assert!(inbound.transfers()[0].ejection.is_some());

        let mut snap = snapshot("Kerbin", 0.0);
        if let Some(craft) = &mut snap.craft {
            craft.situation = Situation::Landed;
            craft.orbit = None;
        }
        let mut landed = TransferCatalog::new(snap.clone(), probe(), &config);
        assert!(landed.flags().landed);
        assert!(!landed.transfers().is_empty());
        landed.compute_ejection_burns(&config);
        assert!(landed.transfers().iter().all(|p| p.ejection.is_none()));

        if let Some(craft) = &mut snap.craft {
            craft.situation = Situation::Flying;
        }
        let lost = TransferCatalog::new(snap, probe(), &config);
        assert!(lost.flags().no_orbit);
        assert!(lost.transfers().is_empty());
    }
}
