//! Transfers between an origin and every destination reachable from it.

use std::sync::Arc;

use color_eyre::eyre::{self, OptionExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::PlannerConfig,
    host::{Endpoint, Host},
    maneuver::BurnPlan,
    time::UT,
};

pub mod catalog;
pub mod planner;

pub use catalog::{CatalogFlags, TransferCatalog};
pub use planner::Planner;

/// The burns that take the origin to one destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferPlan {
    /// Position in discovery order, used as the default sort key.
    pub index: usize,
    pub origin: Endpoint,
    pub destination: Endpoint,
    /// Body about which the transfer orbit is reckoned.
    pub transfer_parent: Option<Arc<str>>,
    /// `None` while unsolved or if there is no solution.
    pub ejection: Option<BurnPlan>,
    /// `None` if not needed or not computed.
    pub plane_change: Option<BurnPlan>,
}

impl TransferPlan {
    pub fn new(index: usize, origin: Endpoint, destination: Endpoint) -> Self {
        Self {
            index,
            origin,
            destination,
            transfer_parent: None,
            ejection: None,
            plane_change: None,
        }
    }

    /// Total delta-V of the transfer, if it has been solved.
    pub fn total_delta_v(&self, config: &PlannerConfig) -> Option<f64> {
        let ejection = self.ejection.as_ref()?.total();
        let plane_change = if config.include_plane_change_delta_v {
            self.plane_change.as_ref().map_or(0.0, BurnPlan::total)
        } else {
            0.0
        };
        Some(ejection + plane_change)
    }

    /// Has the ejection burn's time gone by?
    pub fn is_expired(&self, now: UT) -> bool {
        self.ejection.as_ref().is_some_and(|b| b.is_expired(now))
    }
}

/// Turn the burns of `plan` into maneuvers on the craft.
pub fn commit_plan(host: &dyn Host, plan: &TransferPlan, config: &PlannerConfig) -> eyre::Result<()> {
    let ejection = plan
        .ejection
        .as_ref()
        .ok_or_eyre("transfer has no ejection burn")?;
    host.commit_maneuver(ejection)?;
    if config.generate_plane_change_burns {
        if let Some(plane_change) = &plan.plane_change {
            host.commit_maneuver(plane_change)?;
        }
    }
    info!(destination = %plan.destination, "committed transfer");
    Ok(())
}

#[test]
fn delta_v_honours_plane_change_toggle() {
    use crate::maneuver::BurnKind;

    let mut plan = TransferPlan::new(0, Endpoint::Body("Mun".into()), Endpoint::Body("Minmus".into()));
    let mut config = PlannerConfig::default();
    assert_eq!(plan.total_delta_v(&config), None);
    plan.ejection = Some(BurnPlan::new(Some(UT::new_seconds(50.0)), 300.0, 0.0, 0.0, BurnKind::Ejection));
    plan.plane_change = Some(BurnPlan::new(Some(UT::new_seconds(900.0)), 0.0, 40.0, 0.0, BurnKind::PlaneChange));
    assert_eq!(plan.total_delta_v(&config), Some(340.0));
    config.include_plane_change_delta_v = false;
    assert_eq!(plan.total_delta_v(&config), Some(300.0));
    assert!(plan.is_expired(UT::new_seconds(60.0)));
    assert!(!plan.is_expired(UT::new_seconds(40.0)));
}
