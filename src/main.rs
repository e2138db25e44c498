use std::{path::PathBuf, sync::mpsc, sync::Arc, time::Duration as StdDuration};

use clap::Parser;
use color_eyre::eyre::{self, OptionExt, WrapErr};
use itertools::Itertools;
use kerbplan::{
    bodies::SolarSystem,
    config::PlannerConfig,
    host::{Craft, Host, Situation, StaticHost},
    kepler::orbits::Orbit,
    maneuver::BurnPlan,
    scheduler::{LoadCallbacks, LoadScheduler},
    time::UT,
    transfer::{commit_plan, TransferCatalog, TransferPlan},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Plan transfer burns to every destination reachable from an origin.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Solar system description (RON list of bodies)
    #[arg(long, default_value = "demos/kerbol.ron")]
    system: PathBuf,

    /// Planner settings (TOML); defaults apply to missing keys
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plan from this body instead of the craft
    #[arg(long)]
    origin: Option<String>,

    /// Body the craft orbits
    #[arg(long, default_value = "Kerbin")]
    craft_body: String,

    /// Altitude of the craft's circular orbit in km
    #[arg(long, default_value_t = 100.0)]
    altitude: f64,

    /// Inclination of the craft's orbit in degrees
    #[arg(long, default_value_t = 0.0)]
    inclination: f64,

    /// Name of the host's tracked target
    #[arg(long)]
    target: Option<String>,

    /// Universal time in seconds
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Commit the burns of the transfer with this index
    #[arg(long)]
    commit: Option<usize>,

    /// Seconds to wait for the planner
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let system: SolarSystem = ron::from_str(
        &std::fs::read_to_string(&cli.system)
            .wrap_err_with(|| format!("reading {}", cli.system.display()))?,
    )?;
    let config = match &cli.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };

    let host = Arc::new(StaticHost::new(system));
    let now = UT::try_new_seconds(cli.at).ok_or_eyre("--at must be finite")?;
    host.set_time(now);
    host.set_craft(Some(craft(host.system(), &cli, now)?));

    let snapshot = host.snapshot()?;
    let origin = match &cli.origin {
        Some(name) => snapshot
            .find_endpoint(name)
            .ok_or_else(|| eyre::eyre!("no body or object named {name}"))?,
        None => snapshot.craft_endpoint().ok_or_eyre("no craft")?,
    };
    if let Some(name) = &cli.target {
        let target = snapshot
            .find_endpoint(name)
            .ok_or_else(|| eyre::eyre!("no body or object named {name}"))?;
        host.set_target(Some(target));
    }

    let scheduler = LoadScheduler::new(host.clone(), config.clone())?;
    scheduler.on_display_opened();
    let (tx, rx) = mpsc::channel();
    let aborted = tx.clone();
    let started = scheduler.try_start_load(
        origin,
        LoadCallbacks::new()
            .on_full(move |catalog| {
                let _ = tx.send(Some(catalog));
            })
            .on_aborted(move || {
                let _ = aborted.send(None);
            }),
    );
    eyre::ensure!(started, "load was turned away");
    let catalog = rx
        .recv_timeout(StdDuration::from_secs(cli.timeout))
        .wrap_err("waiting for the planner")?
        .ok_or_eyre("load aborted")?;
    scheduler.on_display_closed();

    print_catalog(&catalog, &config);

    if let Some(index) = cli.commit {
        let plan = catalog
            .transfers()
            .iter()
            .find(|p| p.index == index)
            .ok_or_else(|| eyre::eyre!("no transfer with index {index}"))?;
        commit_plan(&*host, plan, &config)?;
        for burn in host.maneuvers() {
            println!("maneuver {}", describe(&burn));
        }
    }
    Ok(())
}

fn craft(system: &SolarSystem, cli: &Cli, now: UT) -> eyre::Result<Craft> {
    let body = system
        .get(&cli.craft_body)
        .ok_or_else(|| eyre::eyre!("no body named {}", cli.craft_body))?;
    let radius = body.radius + cli.altitude * 1000.0;
    eyre::ensure!(radius < body.soi, "{} km is outside the sphere of influence", cli.altitude);
    info!(body = %body.name, radius, "placing craft");
    Ok(Craft {
        name: "Craft".into(),
        situation: Situation::Orbiting,
        body: body.name.clone(),
        orbit: Some(Orbit::circular(
            body.name.clone(),
            body.mu,
            body.soi,
            radius,
            cli.inclination.to_radians(),
            0.0,
            0.0,
            now,
        )),
    })
}

fn print_catalog(catalog: &TransferCatalog, config: &PlannerConfig) {
    let flags = catalog.flags();
    if flags.hyperbolic_outbound {
        println!("escaping on a hyperbola; no transfers possible");
    }
    if flags.inclination_out_of_range {
        println!("orbit too close to polar for transfer planning");
    }
    if flags.no_orbit {
        println!("origin has no orbit");
    }
    if flags.landed {
        println!("origin is landed; launch first");
    }

    println!(
        "from {} at {:#}",
        catalog.origin(),
        catalog.snapshot().now
    );
    println!(
        "{:>3}  {:<10} {:<8} {:>22} {:>10} {:>10} {:>10}  plane change",
        "#", "to", "via", "burn at", "prograde", "normal", "total"
    );
    let rows = catalog
        .by_delta_v(config)
        .into_iter()
        .map(|plan| row(plan, config))
        .join("\n");
    println!("{rows}");

    let unsolved = catalog
        .transfers()
        .iter()
        .filter(|p| p.ejection.is_none())
        .map(|p| p.destination.to_string())
        .join(", ");
    if !unsolved.is_empty() {
        println!("no solution: {unsolved}");
    }
}

fn row(plan: &TransferPlan, config: &PlannerConfig) -> String {
    let Some(ejection) = &plan.ejection else {
        return String::new();
    };
    let when = ejection
        .time
        .map_or_else(|| "any time".to_owned(), |t| format!("{t:#}"));
    let plane_change = plan
        .plane_change
        .as_ref()
        .map_or_else(|| "-".to_owned(), describe);
    format!(
        "{:>3}  {:<10} {:<8} {:>22} {:>10.1} {:>10.1} {:>10.1}  {}",
        plan.index,
        plan.destination.to_string(),
        plan.transfer_parent.as_deref().unwrap_or("-"),
        when,
        ejection.prograde(),
        ejection.normal(),
        plan.total_delta_v(config).unwrap_or(f64::NAN),
        plane_change
    )
}

fn describe(burn: &BurnPlan) -> String {
    let when = burn
        .time
        .map_or_else(|| "any time".to_owned(), |t| format!("{t:#}"));
    format!(
        "{:?} at {when}: {:.1} m/s ({:.1}, {:.1}, {:.1})",
        burn.kind,
        burn.total(),
        burn.prograde(),
        burn.normal(),
        burn.radial()
    )
}
