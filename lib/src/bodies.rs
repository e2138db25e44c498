//! Definitions of celestial bodies.

use std::{collections::HashMap, sync::Arc};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::kepler::orbits::Orbit;

/// A celestial body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Name of this body as displayed in KSP
    pub name: Arc<str>,
    /// Standard gravitational parameter (`m^3/s^2`)
    pub mu: f64,
    /// Equatorial radius (`m`)
    pub radius: f64,
    /// Radius of this body's sphere of influence (`m`)
    pub soi: f64,
    /// Height of the top of the atmosphere above `radius` (`m`), zero if
    /// there is none.
    #[serde(default)]
    pub atmosphere_depth: f64,
    /// Can this body be landed on?
    #[serde(default)]
    pub has_surface: bool,
    /// The name of the parent body of this body, if any.
    pub parent: Option<Arc<str>>,
    /// Names of bodies orbiting this body, innermost first.
    ///
    /// Derived from `parent` when the system is built.
    #[serde(default)]
    pub satellites: Vec<Arc<str>>,
    /// Orbit about `parent`.
    pub orbit: Option<Orbit>,
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("body {body} names unknown parent {parent}")]
    UnknownParent { body: Arc<str>, parent: Arc<str> },
    #[error("body {0} has a parent but no orbit")]
    MissingOrbit(Arc<str>),
    #[error("orbit of {body} is about {about}, not its parent {parent}")]
    OrbitMismatch {
        body: Arc<str>,
        about: Arc<str>,
        parent: Arc<str>,
    },
    #[error("system must have exactly one root body, found {0}")]
    Roots(usize),
}

/// A tree of bodies keyed by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Body>", into = "Vec<Body>")]
pub struct SolarSystem {
    pub bodies: HashMap<Arc<str>, Arc<Body>>,
}

impl SolarSystem {
    /// Build a system from a flat list of bodies, linking satellites from
    /// their `parent` and ordering them by semi-major axis.
    pub fn from_bodies(bodies: impl IntoIterator<Item = Body>) -> Result<Self, SystemError> {
        let mut bodies: HashMap<Arc<str>, Body> =
            bodies.into_iter().map(|b| (b.name.clone(), b)).collect();

        let mut children: HashMap<Arc<str>, Vec<(OrderedFloat<f64>, Arc<str>)>> = HashMap::new();
        let mut roots = 0;
        for body in bodies.values() {
            let Some(parent) = &body.parent else {
                roots += 1;
                continue;
            };
            if !bodies.contains_key(parent) {
                return Err(SystemError::UnknownParent {
                    body: body.name.clone(),
                    parent: parent.clone(),
                });
            }
            let orbit = body
                .orbit
                .as_ref()
                .ok_or_else(|| SystemError::MissingOrbit(body.name.clone()))?;
            if orbit.body != *parent {
                return Err(SystemError::OrbitMismatch {
                    body: body.name.clone(),
                    about: orbit.body.clone(),
                    parent: parent.clone(),
                });
            }
            children
                .entry(parent.clone())
                .or_default()
                .push((OrderedFloat(orbit.semimajor_axis()), body.name.clone()));
        }
        if roots != 1 {
            return Err(SystemError::Roots(roots));
        }

        for (name, body) in &mut bodies {
            let mut sats = children.remove(name).unwrap_or_default();
            sats.sort();
            body.satellites = sats.into_iter().map(|(_, s)| s).collect();
        }

        Ok(SolarSystem {
            bodies: bodies
                .into_iter()
                .map(|(name, body)| (name, Arc::new(body)))
                .collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Body>> {
        self.bodies.get(name)
    }

    pub fn satellites<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Arc<Body>> + 'a {
        self.get(name)
            .into_iter()
            .flat_map(move |b| b.satellites.iter().filter_map(move |s| self.get(s)))
    }

    /// `name` followed by each of its ancestors up to the root.
    pub fn lineage<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Arc<Body>> + 'a {
        let mut next = self.get(name);
        std::iter::from_fn(move || {
            let cur = next?;
            next = cur.parent.as_deref().and_then(|p| self.get(p));
            Some(cur)
        })
    }

    /// Is `body` equal to or orbiting (at any depth) `ancestor`?
    pub fn is_within(&self, body: &str, ancestor: &str) -> bool {
        self.lineage(body).any(|b| &*b.name == ancestor)
    }
}

impl TryFrom<Vec<Body>> for SolarSystem {
    type Error = SystemError;

    fn try_from(value: Vec<Body>) -> Result<Self, Self::Error> {
        Self::from_bodies(value)
    }
}

impl From<SolarSystem> for Vec<Body> {
    fn from(value: SolarSystem) -> Self {
        let mut bodies: Vec<Body> = value.bodies.into_values().map(|b| (*b).clone()).collect();
        bodies.sort_by(|a, b| a.name.cmp(&b.name));
        bodies
    }
}
