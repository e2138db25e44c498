use std::sync::Arc;

use kerbplan::{
    bodies::{Body, SolarSystem},
    config::PlannerConfig,
    host::{Craft, Endpoint, Host, Situation, StaticHost},
    kepler::orbits::Orbit,
    maneuver::BurnKind,
    time::UT,
    transfer::{commit_plan, TransferCatalog},
};

const JOOL_MU: f64 = 2.82528e14;

fn moon(name: &str, radius: f64, ta: f64) -> Body {
    Body {
        name: name.into(),
        mu: 2e12,
        radius: 500_000.0,
        soi: 3e6,
        atmosphere_depth: 0.0,
        has_surface: true,
        parent: Some("Jool".into()),
        satellites: Vec::new(),
        orbit: Some(Orbit::circular("Jool", JOOL_MU, f64::INFINITY, radius, 0.0, 0.0, ta, UT::default())),
    }
}

fn two_moons() -> SolarSystem {
    let jool = Body {
        name: "Jool".into(),
        mu: JOOL_MU,
        radius: 6_000_000.0,
        soi: f64::INFINITY,
        atmosphere_depth: 200_000.0,
        has_surface: true,
        parent: None,
        satellites: Vec::new(),
        orbit: None,
    };
    SolarSystem::from_bodies([
        jool,
        moon("Tylo", 68_500_000.0, 0.3),
        moon("Laythe", 27_184_000.0, 1.9),
    ])
    .unwrap()
}

#[test]
fn inner_moon_to_outer_moon() {
    let host = StaticHost::new(two_moons());
    let now = UT::new_seconds(123_456.0);
    host.set_time(now);
    let config = PlannerConfig::default();

    let mut catalog = TransferCatalog::new(
        host.snapshot().unwrap(),
        Endpoint::Body("Laythe".into()),
        &config,
    );
    catalog.compute_ejection_burns(&config);
    catalog.compute_plane_change_burns(&host, &config);

    let [plan] = catalog.transfers() else {
        panic!("expected one transfer, got {:?}", catalog.transfers());
    };
    assert_eq!(plan.destination, Endpoint::Body("Tylo".into()));
    assert_eq!(plan.transfer_parent.as_deref(), Some("Jool"));
    let ejection = plan.ejection.as_ref().unwrap();
    assert!(plan.total_delta_v(&config).unwrap() > 0.0);
    let time = ejection.time.unwrap();
    let tylo_period = catalog.snapshot().system.get("Tylo").unwrap().orbit.as_ref().unwrap().period();
    assert!(time > now);
    assert!(time < now.add_seconds(tylo_period));
    assert!(plan.plane_change.is_none());
    assert!(!catalog.has_expired(now));
    assert!(catalog.has_expired(time.add_seconds(1.0)));
}

fn kerbol() -> SolarSystem {
    ron::from_str(include_str!("../../demos/kerbol.ron")).unwrap()
}

fn low_kerbin_orbit(i: f64) -> Craft {
    let kerbin = Orbit::circular("Kerbin", 3.5316e12, 84_159_286.0, 700_000.0, i, 0.0, 0.4, UT::default());
    Craft {
        name: "Explorer".into(),
        situation: Situation::Orbiting,
        body: "Kerbin".into(),
        orbit: Some(kerbin),
    }
}

#[test]
fn stock_system_from_low_kerbin_orbit() {
    let system = kerbol();
    assert_eq!(system.bodies.len(), 17);
    let host = StaticHost::new(system);
    host.set_craft(Some(low_kerbin_orbit(0.0)));
    let config = PlannerConfig::default();
    let snapshot = host.snapshot().unwrap();
    let origin = snapshot.craft_endpoint().unwrap();

    let mut catalog = TransferCatalog::new(snapshot, origin, &config);
    catalog.compute_ejection_burns(&config);
    catalog.compute_plane_change_burns(&host, &config);

    let names: Vec<&str> = catalog
        .transfers()
        .iter()
        .map(|p| &**p.destination.name())
        .collect();
    assert_eq!(names, ["Mun", "Minmus", "Moho", "Eve", "Duna", "Dres", "Jool", "Eeloo"]);

    let now = catalog.snapshot().now;
    for plan in catalog.transfers() {
        let ejection = plan.ejection.as_ref().unwrap_or_else(|| panic!("no burn to {}", plan.destination));
        assert_eq!(ejection.kind, BurnKind::Ejection);
        assert!(ejection.time.unwrap() >= now);
        assert!(ejection.total() > 0.0);
    }

    let by_name = |name: &str| {
        catalog
            .transfers()
            .iter()
            .find(|p| &**p.destination.name() == name)
            .unwrap()
    };
    // Leaving Kerbin costs more than reaching its moons.
    assert!(by_name("Duna").ejection.as_ref().unwrap().total() > by_name("Mun").ejection.as_ref().unwrap().total());
    // Minmus is inclined; the Mun is not.
    assert!(by_name("Minmus").plane_change.is_some());
    assert!(by_name("Mun").plane_change.is_none());
    // Inward transfers still burn prograde; only the exit direction flips.
    assert!(by_name("Eve").ejection.as_ref().unwrap().prograde() > 0.0);

    let sorted = catalog.by_delta_v(&config);
    assert_eq!(sorted.len(), catalog.transfers().len());
    assert_eq!(&**sorted[0].destination.name(), "Mun");

    commit_plan(&host, by_name("Minmus"), &config).unwrap();
    assert_eq!(host.maneuvers().len(), 2);
}

#[test]
fn stock_system_from_the_mun() {
    let host = StaticHost::new(kerbol());
    host.set_craft(Some(Craft {
        name: "Lander".into(),
        situation: Situation::Orbiting,
        body: "Mun".into(),
        orbit: Some(Orbit::circular("Mun", 6.5138398e10, 2_429_559.1, 250_000.0, 0.0, 0.0, 0.0, UT::default())),
    }));
    host.set_target(Some(Endpoint::Body("Duna".into())));
    let config = PlannerConfig {
        generate_plane_change_burns: false,
        ..PlannerConfig::default()
    };
    let snapshot = host.snapshot().unwrap();
    let origin = snapshot.craft_endpoint().unwrap();
    let mut catalog = TransferCatalog::new(snapshot, origin, &config);
    catalog.compute_ejection_burns(&config);

    let names: Vec<&str> = catalog
        .transfers()
        .iter()
        .map(|p| &**p.destination.name())
        .collect();
    assert_eq!(
        names,
        ["Duna", "Kerbin", "Minmus", "Moho", "Eve", "Duna", "Dres", "Jool", "Eeloo"]
    );
    assert!(catalog.target_found());

    // Home to Kerbin means dropping out of the Mun's sphere of influence
    // against its orbit.
    let home = &catalog.transfers()[1];
    assert_eq!(home.transfer_parent.as_deref(), Some("Kerbin"));
    let burn = home.ejection.as_ref().unwrap();
    assert!(burn.time.is_some());
    assert!(burn.prograde() > 0.0);

    let duna = &catalog.transfers()[0];
    assert_eq!(duna.transfer_parent.as_deref(), Some("Kerbol"));
    assert_eq!(duna.ejection, catalog.transfers()[5].ejection);
}

#[test]
fn landed_craft_lists_destinations_without_burns() {
    let host = StaticHost::new(kerbol());
    host.set_craft(Some(Craft {
        name: "Rover".into(),
        situation: Situation::Landed,
        body: "Duna".into(),
        orbit: None,
    }));
    let config = PlannerConfig::default();
    let snapshot = host.snapshot().unwrap();
    let origin = snapshot.craft_endpoint().unwrap();
    let mut catalog = TransferCatalog::new(snapshot, origin.clone(), &config);
    catalog.compute_ejection_burns(&config);
    assert!(catalog.flags().landed);
    assert_eq!(&**catalog.transfers()[0].destination.name(), "Ike");
    assert!(catalog.transfers().iter().all(|p| p.ejection.is_none()));
    assert!(catalog.by_delta_v(&config).is_empty());
    assert!(commit_plan(&host, &catalog.transfers()[0], &config).is_err());
    assert_eq!(catalog.origin(), &origin);
    let _: Arc<SolarSystem> = catalog.snapshot().system.clone();
}
