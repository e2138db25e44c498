//! Planner settings.

use std::{f64::consts::TAU, path::Path, time::Duration as StdDuration};

use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use time::Duration;

/// Feature toggles and tunables for catalog construction and the load
/// scheduler. Never changed after construction; pass a new value instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Look for plane-change burns after the ejection burns are known.
    pub generate_plane_change_burns: bool,
    /// Count the plane-change burn towards a transfer's total delta-V.
    pub include_plane_change_delta_v: bool,
    /// Offer tracked objects (asteroids, comets, vessels) as destinations.
    pub include_tracked_objects: bool,
    /// Origins whose inclination lies within this many radians of polar are
    /// rejected.
    pub polar_inclination_margin: f64,
    /// Seconds of world time before a load for an unchanged origin may run
    /// again.
    pub throttle_interval: f64,
    /// Real-time milliseconds between burn expiry checks.
    pub poll_interval_ms: u64,
    /// Plane-change burns below this many `m/s` are dropped.
    pub plane_change_threshold: f64,
    /// Upper bound on fold-in iterations for nested ejection burns.
    pub ejection_iterations: usize,
    /// Seconds between successive fold-in iterations considered converged.
    pub ejection_tolerance: f64,
    /// Windows tried when refining a transfer window with a root search.
    pub burn_search_slides: usize,
    /// Patches requested from a trajectory preview.
    pub max_preview_patches: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            generate_plane_change_burns: true,
            include_plane_change_delta_v: true,
            include_tracked_objects: true,
            polar_inclination_margin: TAU / 12.0,
            throttle_interval: 5.0,
            poll_interval_ms: 1000,
            plane_change_threshold: 0.05,
            ejection_iterations: 6,
            ejection_tolerance: 1e-3,
            burn_search_slides: 32,
            max_preview_patches: 4,
        }
    }
}

impl PlannerConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> eyre::Result<Self> {
        let config: Self = toml::from_str(text)?;
        eyre::ensure!(
            config.throttle_interval.is_finite() && config.throttle_interval >= 0.0,
            "throttle_interval must be a non-negative number of seconds"
        );
        eyre::ensure!(config.ejection_iterations > 0, "ejection_iterations must be at least 1");
        Ok(config)
    }

    /// The throttle interval as world-time duration.
    pub fn throttle(&self) -> Duration {
        Duration::seconds_f64(self.throttle_interval)
    }

    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = PlannerConfig::from_toml(
        "generate_plane_change_burns = false\nthrottle_interval = 2.5\n",
    )
    .unwrap();
    assert!(!config.generate_plane_change_burns);
    assert_eq!(config.throttle(), Duration::seconds_f64(2.5));
    assert_eq!(config.ejection_iterations, 6);
    assert_eq!(config.plane_change_threshold, 0.05);
    assert_eq!(config.poll_interval(), StdDuration::from_secs(1));
}

#[test]
fn rejects_bad_values() {
    assert!(PlannerConfig::from_toml("throttle_interval = -1.0").is_err());
    assert!(PlannerConfig::from_toml("ejection_iterations = 0").is_err());
    assert!(PlannerConfig::from_toml("no_such_key = [").is_err());
}
