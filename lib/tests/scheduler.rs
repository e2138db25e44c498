use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    time::Duration as StdDuration,
};

use color_eyre::eyre;
use kerbplan::{
    bodies::{Body, SolarSystem},
    config::PlannerConfig,
    host::{Endpoint, Host, Patch, Snapshot, StaticHost},
    kepler::orbits::Orbit,
    maneuver::BurnPlan,
    scheduler::{LoadCallbacks, LoadScheduler},
    time::UT,
    transfer::TransferCatalog,
};
use parking_lot::{Condvar, Mutex};
use time::Duration;

const WAIT: StdDuration = StdDuration::from_secs(30);

fn system() -> SolarSystem {
    let mu = 2.82528e14;
    let moon = |name: &str, radius: f64, ta: f64, i: f64| Body {
        name: name.into(),
        mu: 2e12,
        radius: 500_000.0,
        soi: 3e6,
        atmosphere_depth: 0.0,
        has_surface: true,
        parent: Some("Jool".into()),
        satellites: Vec::new(),
        orbit: Some(Orbit::circular("Jool", mu, f64::INFINITY, radius, i, 0.0, ta, UT::default())),
    };
    let jool = Body {
        name: "Jool".into(),
        mu,
        radius: 6_000_000.0,
        soi: f64::INFINITY,
        atmosphere_depth: 0.0,
        has_surface: false,
        parent: None,
        satellites: Vec::new(),
        orbit: None,
    };
    SolarSystem::from_bodies([
        jool,
        moon("Laythe", 27_184_000.0, 0.0, 0.0),
        moon("Vall", 43_152_000.0, 1.0, 0.0),
        moon("Tylo", 68_500_000.0, 2.0, 0.05),
    ])
    .unwrap()
}

fn laythe() -> Endpoint {
    Endpoint::Body("Laythe".into())
}

fn scheduler(config: PlannerConfig) -> (Arc<StaticHost>, LoadScheduler<StaticHost>) {
    let host = Arc::new(StaticHost::new(system()));
    let scheduler = LoadScheduler::new(host.clone(), config).unwrap();
    (host, scheduler)
}

fn flag() -> (Arc<AtomicBool>, impl FnOnce() + Send + 'static) {
    let flag = Arc::new(AtomicBool::new(false));
    let set = flag.clone();
    (flag, move || set.store(true, Ordering::SeqCst))
}

#[test]
fn nothing_loads_without_a_display() {
    let (_host, scheduler) = scheduler(PlannerConfig::default());
    let (aborted, on_aborted) = flag();
    assert!(!scheduler.try_start_load(laythe(), LoadCallbacks::new().on_aborted(on_aborted)));
    assert!(aborted.load(Ordering::SeqCst));
    assert!(scheduler.catalog().is_none());

    scheduler.on_display_opened();
    scheduler.on_display_closed();
    scheduler.on_display_closed();
    assert_eq!(scheduler.observers(), 0);
}

#[test]
fn partial_then_full() {
    let (_host, scheduler) = scheduler(PlannerConfig::default());
    scheduler.on_display_opened();
    let (tx, rx) = mpsc::channel();
    let tx_full = tx.clone();
    let callbacks = LoadCallbacks::new()
        .on_partial(move |c: Arc<TransferCatalog>| tx.send(("partial", c)).unwrap())
        .on_full(move |c: Arc<TransferCatalog>| tx_full.send(("full", c)).unwrap());
    assert!(scheduler.try_start_load(laythe(), callbacks));

    let (stage, partial) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(stage, "partial");
    assert!(partial.transfers().iter().all(|p| p.plane_change.is_none()));
    let (stage, full) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(stage, "full");
    assert_eq!(full.transfers().len(), 2);
    // Tylo is inclined.
    assert!(full.transfers()[1].plane_change.is_some());
    assert!(!scheduler.is_loading());
    assert_eq!(scheduler.catalog().unwrap().transfers(), full.transfers());
}

/// A host whose snapshots wait until the test lets them through, so a load
/// can be held in flight.
struct GatedHost {
    inner: StaticHost,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedHost {
    fn new(system: SolarSystem) -> Self {
        Self {
            inner: StaticHost::new(system),
            open: Mutex::new(false),
            opened: Condvar::new(),
        }
    }

    fn hold(&self) {
        *self.open.lock() = false;
    }

    fn release(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

impl Host for GatedHost {
    fn now(&self) -> UT {
        self.inner.now()
    }

    fn snapshot(&self) -> eyre::Result<Snapshot> {
        let mut open = self.open.lock();
        while !*open {
            if self.opened.wait_for(&mut open, WAIT).timed_out() {
                break;
            }
        }
        drop(open);
        self.inner.snapshot()
    }

    fn preview_trajectory(&self, orbit: &Orbit, burn: &BurnPlan, max_patches: usize) -> eyre::Result<Vec<Patch>> {
        self.inner.preview_trajectory(orbit, burn, max_patches)
    }

    fn commit_maneuver(&self, burn: &BurnPlan) -> eyre::Result<()> {
        self.inner.commit_maneuver(burn)
    }

    fn clear_maneuvers(&self) {
        self.inner.clear_maneuvers();
    }
}

#[test]
fn same_origin_is_throttled_only_while_loading() {
    let host = Arc::new(GatedHost::new(system()));
    let scheduler = LoadScheduler::new(host.clone(), PlannerConfig::default()).unwrap();
    scheduler.on_display_opened();
    let (tx, rx) = mpsc::channel();
    let start = |origin: Endpoint| {
        let (aborted, on_aborted) = flag();
        let tx = tx.clone();
        let accepted = scheduler.try_start_load(
            origin,
            LoadCallbacks::new()
                .on_full(move |c: Arc<TransferCatalog>| tx.send(c.origin().clone()).unwrap())
                .on_aborted(on_aborted),
        );
        assert_eq!(accepted, !aborted.load(Ordering::SeqCst));
        accepted
    };
    let tylo = || Endpoint::Body("Tylo".into());

    // The first load is held in flight; a repeat a second later is turned
    // away, a different origin is not.
    assert!(start(laythe()));
    assert!(scheduler.is_loading());
    host.inner.advance(Duration::seconds(1));
    assert!(!start(laythe()));
    assert!(start(tylo()));
    host.release();
    let origins: Vec<_> = (0..2).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(origins, [laythe(), tylo()]);

    // Nothing in flight: a refresh straight after a finished load goes ahead.
    assert!(start(tylo()));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), tylo());

    // In flight, but the last load of this origin finished moments ago.
    host.hold();
    assert!(start(tylo()));
    assert!(!start(tylo()));

    // Once the throttle interval has passed it is accepted even in flight.
    host.inner.advance(Duration::seconds(6));
    assert!(start(tylo()));
    host.release();
    for _ in 0..2 {
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), tylo());
    }
    assert!(rx.recv_timeout(StdDuration::from_millis(100)).is_err());
}

#[test]
fn poll_recomputes_expired_burns() {
    let config = PlannerConfig {
        poll_interval_ms: 20,
        generate_plane_change_burns: false,
        ..PlannerConfig::default()
    };
    let host = Arc::new(StaticHost::new(system()));
    let (reload_tx, reload_rx) = mpsc::channel();
    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = reloads.clone();
    let scheduler = LoadScheduler::with_reload_listener(host.clone(), config, move |c| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = reload_tx.send(c);
    })
    .unwrap();
    scheduler.on_display_opened();

    let (tx, rx) = mpsc::channel();
    assert!(scheduler.try_start_load(laythe(), LoadCallbacks::new().on_full(move |c| tx.send(c).unwrap())));
    let loaded = rx.recv_timeout(WAIT).unwrap();
    let first = loaded
        .transfers()
        .iter()
        .filter_map(|p| p.ejection.as_ref()?.time)
        .min()
        .unwrap();

    // Nothing has expired yet, so polls stay quiet.
    assert!(reload_rx.recv_timeout(StdDuration::from_millis(200)).is_err());

    let later = first.add_seconds(10.0);
    host.set_time(later);
    let reloaded = reload_rx.recv_timeout(WAIT).unwrap();
    assert!(!reloaded.has_expired(host.now()));
    for plan in reloaded.transfers() {
        assert!(plan.ejection.as_ref().unwrap().time.unwrap() >= later);
    }
    assert_eq!(reloaded.snapshot().now, later);

    // Fresh burns lie ahead; no further reloads.
    assert!(reload_rx.recv_timeout(StdDuration::from_millis(200)).is_err());
    assert_eq!(reloads.load(Ordering::SeqCst), 1);

    // With no display open the poll does nothing.
    scheduler.on_display_closed();
    let far = reloaded
        .transfers()
        .iter()
        .filter_map(|p| p.ejection.as_ref()?.time)
        .max()
        .unwrap();
    host.set_time(far.add_seconds(10.0));
    assert!(reload_rx.recv_timeout(StdDuration::from_millis(200)).is_err());
    drop(scheduler);
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}
