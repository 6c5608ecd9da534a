//! Timer-driven fetch → diff → deliver loop.
//!
//! A [`PollScheduler`] owns one recurring poll timer and, in smoothed mode,
//! one drain timer. Both run as tokio tasks and serialize every mutation of
//! the snapshot store and pending queue through a single state lock. The
//! fetch itself happens outside the lock so the drain timer keeps firing
//! while a request is in flight.
//!
//! Poll ticks are not serialized against each other: when a fetch outlives
//! the poll interval the next tick starts another cycle alongside it. Each
//! cycle's flush/diff/enqueue step is still atomic under the lock.
//!
//! Every connect starts a new session. A cycle or drain tick that wakes up
//! after its session ended discards its work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::catalog::StationCatalog;
use crate::config::PipelineConfig;
use crate::delivery::{DeliveryMode, DeliveryScheduler};
use crate::diff::diff;
use crate::error::{PipelineError, Result};
use crate::model::StationSnapshot;
use crate::services::feed_api::StatusFetcher;
use crate::sink::ObservationSink;
use crate::snapshot::SnapshotStore;

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Leftover events from the previous cycle emitted before diffing.
    pub flushed: usize,
    pub new_entities: usize,
    pub changed_stations: usize,
    pub total_inventory_change: i64,
    pub unknown_stations: usize,
    /// Events waiting for smoothed delivery after this cycle.
    pub pending: usize,
    /// Period of the drain timer armed by this cycle, if any.
    pub drain_period: Option<Duration>,
}

/// What happened to a poll cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The pipeline was not connected, or disconnected while fetching.
    Skipped,
    /// The fetch failed; pipeline state was left untouched.
    Failed(PipelineError),
    Completed(CycleReport),
}

struct PipelineState {
    connected: bool,
    session: u64,
    snapshots: SnapshotStore,
    delivery: DeliveryScheduler,
    drain_task: Option<JoinHandle<()>>,
    /// Bumped whenever the drain timer is stopped; a drain loop from an
    /// older epoch must not touch the queue.
    drain_epoch: u64,
}

impl PipelineState {
    fn is_live(&self, session: u64) -> bool {
        self.connected && self.session == session
    }

    fn stop_drain(&mut self) -> Option<JoinHandle<()>> {
        self.drain_epoch += 1;
        let task = self.drain_task.take();
        if let Some(task) = &task {
            task.abort();
        }
        task
    }
}

struct Shared<S> {
    sink: S,
    cycles: AtomicU64,
    state: Mutex<PipelineState>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        // Every critical section leaves the state consistent, so a panic in
        // a sink does not invalidate it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drives the observation pipeline for one feed.
pub struct PollScheduler<F, S> {
    config: PipelineConfig,
    catalog: Arc<StationCatalog>,
    fetcher: Arc<F>,
    shared: Arc<Shared<S>>,
    poll_task: Option<JoinHandle<()>>,
}

impl<F, S> PollScheduler<F, S>
where
    F: StatusFetcher + 'static,
    S: ObservationSink + 'static,
{
    pub fn new(
        config: PipelineConfig,
        catalog: Arc<StationCatalog>,
        fetcher: Arc<F>,
        sink: S,
    ) -> Self {
        let state = PipelineState {
            connected: false,
            session: 0,
            snapshots: SnapshotStore::new(),
            delivery: DeliveryScheduler::new(config.mode(), config.poll_interval_secs()),
            drain_task: None,
            drain_epoch: 0,
        };

        Self {
            config,
            catalog,
            fetcher,
            shared: Arc::new(Shared {
                sink,
                cycles: AtomicU64::new(0),
                state: Mutex::new(state),
            }),
            poll_task: None,
        }
    }

    /// Starts polling. The first cycle runs immediately, then once per poll
    /// interval. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidState`] if already connected.
    pub fn connect(&mut self) -> Result<()> {
        let session = {
            let mut state = self.shared.lock();
            if state.connected {
                return Err(PipelineError::InvalidState("pipeline is already connected"));
            }
            state.connected = true;
            state.session += 1;
            state.session
        };
        self.shared.sink.on_connect();

        let task = tokio::spawn(poll_loop(
            self.shared.clone(),
            self.catalog.clone(),
            self.fetcher.clone(),
            self.config.poll_interval(),
            session,
        ));
        self.poll_task = Some(task);

        info!(
            session,
            interval_secs = self.config.poll_interval_secs(),
            mode = ?self.config.mode(),
            stations = self.catalog.len(),
            "Pipeline connected"
        );
        Ok(())
    }

    /// Stops both timers and clears the snapshot store and pending queue.
    /// Cycles still fetching when this returns discard their results.
    /// Calling it while disconnected does nothing.
    pub async fn disconnect(&mut self) {
        let poll_task = self.poll_task.take();
        if let Some(task) = &poll_task {
            task.abort();
        }

        let drain_task = {
            let mut state = self.shared.lock();
            let was_connected = state.connected;
            state.connected = false;
            let drain_task = state.stop_drain();
            state.delivery.clear();
            state.snapshots.clear();
            if was_connected {
                info!(session = state.session, "Pipeline disconnected");
            }
            drain_task
        };

        for task in [poll_task, drain_task].into_iter().flatten() {
            // Cancellation is the expected outcome.
            let _ = task.await;
        }
    }

    /// Runs one cycle right away, outside the poll timer.
    pub async fn poll_once(&self) -> CycleOutcome {
        let session = self.shared.lock().session;
        run_cycle(&self.shared, &self.catalog, self.fetcher.as_ref(), session).await
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn mode(&self) -> DeliveryMode {
        self.config.mode()
    }

    pub fn sink(&self) -> &S {
        &self.shared.sink
    }

    /// Number of events waiting for smoothed delivery.
    pub fn pending(&self) -> usize {
        self.shared.lock().delivery.pending()
    }

    /// Number of stations in the snapshot store.
    pub fn known_stations(&self) -> usize {
        self.shared.lock().snapshots.len()
    }

    /// Latest stored snapshot for `id`.
    pub fn snapshot(&self, id: &str) -> Option<StationSnapshot> {
        self.shared.lock().snapshots.get(id).cloned()
    }

    /// Sum of `bikes_available` across the snapshot store.
    pub fn total_bikes(&self) -> u64 {
        self.shared.lock().snapshots.total_bikes()
    }

    /// Cycles started since construction, including skipped and failed ones.
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Relaxed)
    }
}

impl<F, S> Drop for PollScheduler<F, S> {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        let mut state = self.shared.lock();
        state.connected = false;
        state.stop_drain();
    }
}

async fn poll_loop<F, S>(
    shared: Arc<Shared<S>>,
    catalog: Arc<StationCatalog>,
    fetcher: Arc<F>,
    period: Duration,
    session: u64,
) where
    F: StatusFetcher + 'static,
    S: ObservationSink + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let shared = shared.clone();
        let catalog = catalog.clone();
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            run_cycle(&shared, &catalog, fetcher.as_ref(), session).await;
        });
    }
}

async fn run_cycle<F, S>(
    shared: &Arc<Shared<S>>,
    catalog: &StationCatalog,
    fetcher: &F,
    session: u64,
) -> CycleOutcome
where
    F: StatusFetcher + ?Sized,
    S: ObservationSink + 'static,
{
    let cycle = shared.cycles.fetch_add(1, Ordering::Relaxed) + 1;
    let span = info_span!("poll_cycle", cycle, session);

    async move {
        if !shared.lock().is_live(session) {
            debug!("Pipeline not connected, skipping cycle");
            return CycleOutcome::Skipped;
        }

        let records = match fetcher.fetch_status().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Status fetch failed, waiting for next cycle");
                return CycleOutcome::Failed(e);
            }
        };

        let mut state = shared.lock();
        if !state.is_live(session) {
            debug!("Disconnected while fetching, discarding results");
            return CycleOutcome::Skipped;
        }

        state.stop_drain();
        let flushed = state.delivery.flush_leftovers(&shared.sink);

        let state = &mut *state;
        let delivery = &mut state.delivery;
        let outcome = diff(
            &records,
            catalog,
            &mut state.snapshots,
            |snapshot| shared.sink.on_new_entity(snapshot),
            |event| delivery.accept(event.clone(), &shared.sink),
        );
        if outcome.unknown_stations > 0 {
            warn!(
                unknown = outcome.unknown_stations,
                "Status records without station metadata were dropped"
            );
        }

        let mut report = CycleReport {
            cycle,
            flushed,
            new_entities: outcome.new_entities,
            changed_stations: outcome.changed_stations,
            total_inventory_change: outcome.total_inventory_change,
            unknown_stations: outcome.unknown_stations,
            ..Default::default()
        };

        report.drain_period = state.delivery.rearm();
        report.pending = state.delivery.pending();

        if let Some(period) = report.drain_period {
            let epoch = state.drain_epoch;
            state.drain_task = Some(tokio::spawn(
                drain_loop(shared.clone(), period, session, epoch).in_current_span(),
            ));
        }

        info!(
            new_stations = report.new_entities,
            changed = report.changed_stations,
            total_inventory_change = report.total_inventory_change,
            pending = report.pending,
            "Poll cycle complete"
        );
        CycleOutcome::Completed(report)
    }
    .instrument(span)
    .await
}

/// Emits one pending event per period until the queue is empty.
async fn drain_loop<S: ObservationSink>(
    shared: Arc<Shared<S>>,
    period: Duration,
    session: u64,
    epoch: u64,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let mut state = shared.lock();
        if !state.is_live(session) || state.drain_epoch != epoch {
            return;
        }
        state.delivery.drain_one(&shared.sink);
        if state.delivery.pending() == 0 {
            state.drain_task = None;
            return;
        }
    }
}
