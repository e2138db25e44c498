//! Background recomputation of the transfer catalog.
//!
//! A single worker thread owns the catalog. Load requests reach it over a
//! channel, and the periodic expiry check is a timeout on the same channel,
//! so loads and polls never overlap. Finished catalogs are published as
//! immutable `Arc` snapshots.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, RecvTimeoutError, SendError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use color_eyre::eyre::{self, WrapErr};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::{
    config::PlannerConfig,
    host::{Endpoint, Host},
    time::UT,
    transfer::TransferCatalog,
};

pub type CatalogCallback = Box<dyn FnOnce(Arc<TransferCatalog>) + Send>;
pub type AbortCallback = Box<dyn FnOnce() + Send>;
/// Called from the worker whenever a poll recomputed expired burns.
pub type ReloadListener = Box<dyn Fn(Arc<TransferCatalog>) + Send>;

/// Notifications for one load request. All of them run on the worker
/// thread, except `on_aborted` for a request that is turned away, which runs
/// on the caller's.
#[derive(Default)]
pub struct LoadCallbacks {
    on_partial: Option<CatalogCallback>,
    on_full: Option<CatalogCallback>,
    on_aborted: Option<AbortCallback>,
}

impl LoadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ejection burns are ready.
    #[must_use]
    pub fn on_partial(mut self, f: impl FnOnce(Arc<TransferCatalog>) + Send + 'static) -> Self {
        self.on_partial = Some(Box::new(f));
        self
    }

    /// Plane-change burns are ready too.
    #[must_use]
    pub fn on_full(mut self, f: impl FnOnce(Arc<TransferCatalog>) + Send + 'static) -> Self {
        self.on_full = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_aborted(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_aborted = Some(Box::new(f));
        self
    }

    fn abort(self) {
        if let Some(f) = self.on_aborted {
            f();
        }
    }
}

enum Msg {
    Load {
        origin: Endpoint,
        callbacks: LoadCallbacks,
    },
    Shutdown,
}

#[derive(Debug, Default)]
struct LoadState {
    /// Accepted requests not yet finished.
    pending: usize,
    last_origin: Option<Endpoint>,
    /// World time the last load of `last_origin` finished.
    last_completed_at: Option<UT>,
}

#[derive(Debug, Default)]
struct Shared {
    observers: AtomicUsize,
    state: Mutex<LoadState>,
    catalog: RwLock<Option<Arc<TransferCatalog>>>,
}

impl Shared {
    fn publish(&self, catalog: &TransferCatalog) -> Arc<TransferCatalog> {
        let catalog = Arc::new(catalog.clone());
        *self.catalog.write() = Some(catalog.clone());
        catalog
    }

    fn finish(&self, origin: &Endpoint, at: Option<UT>) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.last_origin.as_ref() == Some(origin) {
            if let Some(at) = at {
                state.last_completed_at = Some(at);
            }
        }
    }
}

/// Throttled, single-flight recomputation of a [`TransferCatalog`].
pub struct LoadScheduler<H: Host + 'static> {
    host: Arc<H>,
    config: Arc<PlannerConfig>,
    shared: Arc<Shared>,
    tx: Sender<Msg>,
    worker: Option<JoinHandle<()>>,
}

impl<H: Host + 'static> LoadScheduler<H> {
    pub fn new(host: Arc<H>, config: PlannerConfig) -> eyre::Result<Self> {
        Self::spawn(host, config, None)
    }

    /// Like [`LoadScheduler::new`], with a listener for reloads nobody asked
    /// for.
    pub fn with_reload_listener(
        host: Arc<H>,
        config: PlannerConfig,
        listener: impl Fn(Arc<TransferCatalog>) + Send + 'static,
    ) -> eyre::Result<Self> {
        Self::spawn(host, config, Some(Box::new(listener)))
    }

    fn spawn(
        host: Arc<H>,
        config: PlannerConfig,
        listener: Option<ReloadListener>,
    ) -> eyre::Result<Self> {
        let config = Arc::new(config);
        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::channel();
        let worker = Worker {
            host: host.clone(),
            config: config.clone(),
            shared: shared.clone(),
            listener,
            catalog: None,
        };
        let handle = thread::Builder::new()
            .name("transfer-loader".into())
            .spawn(move || worker.run(&rx))
            .wrap_err("spawning loader thread")?;
        Ok(Self {
            host,
            config,
            shared,
            tx,
            worker: Some(handle),
        })
    }

    /// Ask for the catalog of `origin` to be rebuilt.
    ///
    /// Turned away, with `on_aborted` called before returning, when no
    /// display is open, or when a load of the same origin is already under
    /// way and the last one finished less than the throttle interval of world
    /// time ago. A new origin is always accepted.
    pub fn try_start_load(&self, origin: Endpoint, callbacks: LoadCallbacks) -> bool {
        if self.shared.observers.load(Ordering::SeqCst) == 0 {
            trace!(%origin, "load aborted: nothing observing");
            callbacks.abort();
            return false;
        }

        let now = self.host.now();
        {
            let mut state = self.shared.state.lock();
            let same_origin = state.last_origin.as_ref() == Some(&origin);
            let in_flight = state.pending > 0;
            // With nothing finished yet, the running load counts as recent.
            let recent = state
                .last_completed_at
                .map_or(true, |at| now - at < self.config.throttle());
            if same_origin && in_flight && recent {
                drop(state);
                trace!(%origin, "load aborted: throttled");
                callbacks.abort();
                return false;
            }
            if !same_origin {
                state.last_origin = Some(origin.clone());
                state.last_completed_at = None;
            }
            state.pending += 1;
        }

        debug!(%origin, "load queued");
        if let Err(SendError(msg)) = self.tx.send(Msg::Load { origin, callbacks }) {
            warn!("loader thread is gone");
            let mut state = self.shared.state.lock();
            state.pending = state.pending.saturating_sub(1);
            drop(state);
            if let Msg::Load { callbacks, .. } = msg {
                callbacks.abort();
            }
            return false;
        }
        true
    }

    pub fn on_display_opened(&self) {
        self.shared.observers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_display_closed(&self) {
        let _ = self
            .shared
            .observers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn observers(&self) -> usize {
        self.shared.observers.load(Ordering::SeqCst)
    }

    /// The most recently published catalog.
    pub fn catalog(&self) -> Option<Arc<TransferCatalog>> {
        self.shared.catalog.read().clone()
    }

    /// Is an accepted load still running or queued?
    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().pending > 0
    }
}

impl<H: Host + 'static> Drop for LoadScheduler<H> {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("loader thread panicked");
            }
        }
    }
}

struct Worker<H: Host + 'static> {
    host: Arc<H>,
    config: Arc<PlannerConfig>,
    shared: Arc<Shared>,
    listener: Option<ReloadListener>,
    catalog: Option<TransferCatalog>,
}

impl<H: Host + 'static> Worker<H> {
    fn run(mut self, rx: &mpsc::Receiver<Msg>) {
        let interval = self.config.poll_interval();
        let mut deadline = Instant::now() + interval;
        loop {
            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(Msg::Load { origin, callbacks }) => self.load(origin, callbacks),
                Ok(Msg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if Instant::now() >= deadline {
                self.poll();
                deadline = Instant::now() + interval;
            }
        }
        debug!("loader stopped");
    }

    fn load(&mut self, origin: Endpoint, callbacks: LoadCallbacks) {
        let snapshot = match self.host.snapshot() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%origin, %error, "snapshot failed");
                self.shared.finish(&origin, None);
                callbacks.abort();
                return;
            }
        };
        let mut catalog = TransferCatalog::new(snapshot, origin.clone(), &self.config);

        catalog.compute_ejection_burns(&self.config);
        let partial = self.shared.publish(&catalog);
        if let Some(f) = callbacks.on_partial {
            f(partial);
        }

        if self.config.generate_plane_change_burns {
            catalog.compute_plane_change_burns(&*self.host, &self.config);
        }
        let full = self.shared.publish(&catalog);
        self.shared.finish(&origin, Some(self.host.now()));
        debug!(%origin, transfers = catalog.transfers().len(), "load finished");
        self.catalog = Some(catalog);
        if let Some(f) = callbacks.on_full {
            f(full);
        }
    }

    /// Recompute burns whose time has passed.
    fn poll(&mut self) {
        if self.shared.observers.load(Ordering::SeqCst) == 0 {
            return;
        }
        let Some(catalog) = self.catalog.as_mut() else {
            return;
        };
        if !catalog.has_expired(self.host.now()) {
            return;
        }
        let snapshot = match self.host.snapshot() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "snapshot failed during poll");
                return;
            }
        };
        if catalog.refresh_expired(snapshot, &*self.host, &self.config) == 0 {
            return;
        }
        let published = self.shared.publish(catalog);
        if let Some(listener) = &self.listener {
            listener(published);
        }
    }
}
