//! What the planner needs from the game, and an in-process stand-in.

use std::{fmt, sync::Arc};

use color_eyre::eyre::{self, OptionExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::debug;

pub use crate::kepler::patched::Patch;
use crate::{
    bodies::SolarSystem,
    kepler::{orbits::Orbit, patched},
    maneuver::BurnPlan,
    time::UT,
};

/// One end of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// A celestial body of the fixed hierarchy.
    Body(Arc<str>),
    /// A vessel or tracked object, identified by name.
    Object(Arc<str>),
}

impl Endpoint {
    pub fn name(&self) -> &Arc<str> {
        match self {
            Self::Body(name) | Self::Object(name) => name,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Situation {
    Prelaunch,
    Landed,
    Splashed,
    Flying,
    SubOrbital,
    Orbiting,
    Escaping,
    Docked,
}

impl Situation {
    /// Sitting on a surface.
    pub fn is_grounded(self) -> bool {
        matches!(self, Self::Prelaunch | Self::Landed | Self::Splashed)
    }
}

/// The controlled vessel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Craft {
    pub name: Arc<str>,
    pub situation: Situation,
    /// Body the craft is on or around.
    pub body: Arc<str>,
    pub orbit: Option<Orbit>,
}

/// A small body or vessel outside the fixed hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub name: Arc<str>,
    pub orbit: Orbit,
}

/// A read-only view of the game valid for one computation pass.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub now: UT,
    pub system: Arc<SolarSystem>,
    pub craft: Option<Craft>,
    pub objects: Vec<TrackedObject>,
    pub target: Option<Endpoint>,
}

impl Snapshot {
    /// Current orbit of `endpoint`, if it has one.
    pub fn orbit_of(&self, endpoint: &Endpoint) -> Option<&Orbit> {
        match endpoint {
            Endpoint::Body(name) => self.system.get(name)?.orbit.as_ref(),
            Endpoint::Object(name) => match &self.craft {
                Some(craft) if craft.name == *name => craft.orbit.as_ref(),
                _ => self.object(name).map(|o| &o.orbit),
            },
        }
    }

    /// The body `endpoint` orbits or sits on.
    pub fn reference_body(&self, endpoint: &Endpoint) -> Option<Arc<str>> {
        match endpoint {
            Endpoint::Body(name) => self.system.get(name)?.parent.clone(),
            Endpoint::Object(name) => match &self.craft {
                Some(craft) if craft.name == *name => Some(craft.body.clone()),
                _ => self.object(name).map(|o| o.orbit.body.clone()),
            },
        }
    }

    /// Bodies of the hierarchy are always orbiting.
    pub fn situation(&self, endpoint: &Endpoint) -> Situation {
        match (endpoint, &self.craft) {
            (Endpoint::Object(name), Some(craft)) if craft.name == *name => craft.situation,
            _ => Situation::Orbiting,
        }
    }

    pub fn object(&self, name: &str) -> Option<&TrackedObject> {
        self.objects.iter().find(|o| &*o.name == name)
    }

    /// The craft as an endpoint.
    pub fn craft_endpoint(&self) -> Option<Endpoint> {
        self.craft.as_ref().map(|c| Endpoint::Object(c.name.clone()))
    }

    /// Resolve a bare name, preferring bodies over objects.
    pub fn find_endpoint(&self, name: &str) -> Option<Endpoint> {
        if let Some(body) = self.system.get(name) {
            return Some(Endpoint::Body(body.name.clone()));
        }
        let craft = self.craft.as_ref().filter(|c| &*c.name == name).map(|c| &c.name);
        craft
            .or_else(|| self.object(name).map(|o| &o.name))
            .map(|n| Endpoint::Object(n.clone()))
    }
}

/// Capabilities the game provides.
pub trait Host: Send + Sync {
    /// Current world time.
    fn now(&self) -> UT;

    fn snapshot(&self) -> eyre::Result<Snapshot>;

    /// Patches that would follow from burning `burn` on `orbit`.
    ///
    /// Must not change anything the game shows or keeps; dropping the result
    /// is all it takes to forget the preview.
    fn preview_trajectory(
        &self,
        orbit: &Orbit,
        burn: &BurnPlan,
        max_patches: usize,
    ) -> eyre::Result<Vec<Patch>>;

    /// Make `burn` a persistent maneuver on the craft.
    fn commit_maneuver(&self, burn: &BurnPlan) -> eyre::Result<()>;

    /// Remove every maneuver from the craft.
    fn clear_maneuvers(&self);
}

#[derive(Clone, Debug, Default)]
struct HostState {
    now: UT,
    craft: Option<Craft>,
    objects: Vec<TrackedObject>,
    target: Option<Endpoint>,
    maneuvers: Vec<BurnPlan>,
}

/// A host over a fixed Keplerian system with a settable clock.
#[derive(Debug)]
pub struct StaticHost {
    system: Arc<SolarSystem>,
    state: RwLock<HostState>,
}

impl StaticHost {
    pub fn new(system: impl Into<Arc<SolarSystem>>) -> Self {
        Self {
            system: system.into(),
            state: RwLock::default(),
        }
    }

    pub fn system(&self) -> &Arc<SolarSystem> {
        &self.system
    }

    pub fn set_time(&self, now: UT) {
        self.state.write().now = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state.write();
        state.now = state.now + by;
    }

    pub fn set_craft(&self, craft: Option<Craft>) {
        self.state.write().craft = craft;
    }

    pub fn add_object(&self, object: TrackedObject) {
        self.state.write().objects.push(object);
    }

    pub fn set_target(&self, target: Option<Endpoint>) {
        self.state.write().target = target;
    }

    /// Maneuvers committed so far.
    pub fn maneuvers(&self) -> Vec<BurnPlan> {
        self.state.read().maneuvers.clone()
    }
}

impl Host for StaticHost {
    fn now(&self) -> UT {
        self.state.read().now
    }

    fn snapshot(&self) -> eyre::Result<Snapshot> {
        let state = self.state.read();
        Ok(Snapshot {
            now: state.now,
            system: self.system.clone(),
            craft: state.craft.clone(),
            objects: state.objects.clone(),
            target: state.target.clone(),
        })
    }

    fn preview_trajectory(
        &self,
        orbit: &Orbit,
        burn: &BurnPlan,
        max_patches: usize,
    ) -> eyre::Result<Vec<Patch>> {
        let t = burn.time.unwrap_or_else(|| self.now());
        let mut sv = orbit.state_vectors_at(t);
        eyre::ensure!(
            sv.position.iter().chain(sv.velocity.iter()).all(|x| x.is_finite()),
            "orbit about {} has no finite state at {t}",
            orbit.body
        );
        sv.velocity += burn.deltav_bci(&sv);
        let after = sv.into_orbit(1e-8);
        Ok(patched::predict(&self.system, after, t, max_patches))
    }

    fn commit_maneuver(&self, burn: &BurnPlan) -> eyre::Result<()> {
        let mut state = self.state.write();
        state.craft.as_ref().ok_or_eyre("no craft to plan a maneuver on")?;
        debug!(time = ?burn.time, dv = burn.total(), "committing maneuver");
        state.maneuvers.push(burn.clone());
        Ok(())
    }

    fn clear_maneuvers(&self) {
        self.state.write().maneuvers.clear();
    }
}

#[cfg(test)]
fn kerbin_system() -> SolarSystem {
    use crate::bodies::Body;

    let kerbol = Body {
        name: "Kerbol".into(),
        mu: 1.1723328e18,
        radius: 261_600_000.0,
        soi: f64::INFINITY,
        atmosphere_depth: 600_000.0,
        has_surface: false,
        parent: None,
        satellites: Vec::new(),
        orbit: None,
    };
    let kerbin = Body {
        name: "Kerbin".into(),
        mu: 3.5316e12,
        radius: 600_000.0,
        soi: 84_159_286.0,
        atmosphere_depth: 70_000.0,
        has_surface: true,
        parent: Some("Kerbol".into()),
        satellites: Vec::new(),
        orbit: Some(Orbit::circular(
            "Kerbol",
            1.1723328e18,
            f64::INFINITY,
            13_599_840_256.0,
            0.0,
            0.0,
            3.14,
            UT::default(),
        )),
    };
    SolarSystem::from_bodies([kerbol, kerbin]).unwrap()
}

#[test]
fn preview_follows_escape() {
    use crate::maneuver::BurnKind;

    let host = StaticHost::new(kerbin_system());
    let orbit = Orbit::circular("Kerbin", 3.5316e12, 84_159_286.0, 700_000.0, 0.0, 0.0, 0.0, UT::default());
    let stay = BurnPlan::new(Some(UT::new_seconds(10.0)), 100.0, 0.0, 0.0, BurnKind::Ejection);
    let patches = host.preview_trajectory(&orbit, &stay, 4).unwrap();
    assert_eq!(patches.len(), 1);
    assert!(patches[0].end.is_none());

    let leave = BurnPlan::new(Some(UT::new_seconds(10.0)), 1200.0, 0.0, 0.0, BurnKind::Ejection);
    let patches = host.preview_trajectory(&orbit, &leave, 4).unwrap();
    assert_eq!(patches.len(), 2);
    assert_eq!(&*patches[1].orbit.body, "Kerbol");
    assert_eq!(Some(patches[1].start), patches[0].end);
    // Previews leave no trace.
    assert!(host.maneuvers().is_empty());
}

#[test]
fn snapshot_resolves_endpoints() {
    let host = StaticHost::new(kerbin_system());
    host.set_craft(Some(Craft {
        name: "Probe".into(),
        situation: Situation::Landed,
        body: "Kerbin".into(),
        orbit: None,
    }));
    let snap = host.snapshot().unwrap();
    let probe = snap.find_endpoint("Probe").unwrap();
    assert_eq!(probe, Endpoint::Object("Probe".into()));
    assert_eq!(snap.reference_body(&probe).as_deref(), Some("Kerbin"));
    assert!(snap.situation(&probe).is_grounded());
    assert!(snap.orbit_of(&probe).is_none());
    let kerbin = snap.find_endpoint("Kerbin").unwrap();
    assert_eq!(snap.reference_body(&kerbin).as_deref(), Some("Kerbol"));
    assert!(host.commit_maneuver(&BurnPlan::new(None, 1.0, 0.0, 0.0, crate::maneuver::BurnKind::Capture)).is_ok());
    assert_eq!(host.maneuvers().len(), 1);
    host.clear_maneuvers();
    assert!(host.maneuvers().is_empty());
}
