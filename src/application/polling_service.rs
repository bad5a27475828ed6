// Polling service - keeps one dashboard snapshot fresh on fixed timers
use crate::application::telemetry_source::{Clock, TelemetrySource};
use crate::domain::dashboard::{DashboardSnapshot, LOAD_FAILED_BANNER};
use crate::infrastructure::config::PollingSettings;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingConfig {
    pub data_interval: Duration,
    pub clock_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            data_interval: Duration::from_secs(5),
            clock_interval: Duration::from_secs(1),
        }
    }
}

impl From<&PollingSettings> for PollingConfig {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            data_interval: Duration::from_millis(settings.data_interval_ms.max(1)),
            clock_interval: Duration::from_millis(settings.clock_interval_ms.max(1)),
        }
    }
}

/// Parts of the snapshot that are replaced independently.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Latest,
    SensorSeries,
    SensorStatus,
    Simulation,
    SimulationSeries,
}

const SLOT_COUNT: usize = 5;

/// Snapshot plus the generation last written to each slot. Every tick draws
/// a fresh generation; a response older than what a slot already holds is
/// dropped, so a slow request can never overwrite a newer one.
struct SnapshotStore {
    tx: watch::Sender<DashboardSnapshot>,
    next_generation: AtomicU64,
    applied: [AtomicU64; SLOT_COUNT],
}

impl SnapshotStore {
    fn new(initial: DashboardSnapshot) -> (Arc<Self>, watch::Receiver<DashboardSnapshot>) {
        let (tx, rx) = watch::channel(initial);
        let store = Self {
            tx,
            next_generation: AtomicU64::new(0),
            applied: Default::default(),
        };
        (Arc::new(store), rx)
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Runs under the channel's write lock, which serializes the check
    /// against concurrent writers.
    fn apply(&self, slot: Slot, generation: u64, update: impl FnOnce(&mut DashboardSnapshot)) -> bool {
        self.tx.send_if_modified(|snapshot| {
            let applied = &self.applied[slot as usize];
            if generation <= applied.load(Ordering::Relaxed) {
                tracing::debug!(
                    "Dropping stale {:?} response for {} (generation {})",
                    slot,
                    snapshot.client_id,
                    generation
                );
                return false;
            }
            applied.store(generation, Ordering::Relaxed);
            update(snapshot);
            true
        })
    }

    fn set_now(&self, now_ms: i64) {
        self.tx.send_modify(|snapshot| snapshot.now_ms = now_ms);
    }
}

/// Running pollers for one client. Dropping the handle aborts every timer
/// and every request still in flight.
pub struct PollingHandle {
    updates: watch::Receiver<DashboardSnapshot>,
    tasks: JoinSet<()>,
}

impl PollingHandle {
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.updates.clone()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.updates.borrow().clone()
    }

    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;
    }
}

pub struct PollingDataSource;

impl PollingDataSource {
    pub fn start(
        client_id: impl Into<String>,
        source: Arc<dyn TelemetrySource>,
        clock: Arc<dyn Clock>,
        config: PollingConfig,
    ) -> PollingHandle {
        let client_id: Arc<str> = Arc::from(client_id.into());
        let (store, updates) = SnapshotStore::new(DashboardSnapshot::new(client_id.as_ref(), clock.now_ms()));
        let mut tasks = JoinSet::new();

        tasks.spawn(poll_every(config.data_interval, {
            let (store, source, client_id) = (store.clone(), source.clone(), client_id.clone());
            move || poll_sensors(store.clone(), source.clone(), client_id.clone())
        }));

        tasks.spawn(poll_every(config.data_interval, {
            let (store, source, client_id) = (store.clone(), source.clone(), client_id.clone());
            move || poll_simulation(store.clone(), source.clone(), client_id.clone())
        }));

        tasks.spawn(poll_every(config.data_interval, {
            let (store, source, client_id) = (store.clone(), source.clone(), client_id.clone());
            move || poll_simulation_series(store.clone(), source.clone(), client_id.clone())
        }));

        tasks.spawn(poll_every(config.clock_interval, {
            let store = store.clone();
            move || {
                store.set_now(clock.now_ms());
                async {}
            }
        }));

        tracing::info!("Started polling for {}", client_id);
        PollingHandle { updates, tasks }
    }
}

/// Fires `tick` on every period without waiting for earlier ticks to finish.
/// In-flight work lives in a local `JoinSet`, so aborting this task aborts it too.
async fn poll_every<F, Fut>(period: Duration, mut tick: F)
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                in_flight.spawn(tick());
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!("Poll task panicked: {}", e);
                    }
                }
            }
        }
    }
}

/// Latest reading and windowed series are fetched together but fail
/// independently. The banner reflects the whole tick.
async fn poll_sensors(store: Arc<SnapshotStore>, source: Arc<dyn TelemetrySource>, client_id: Arc<str>) {
    let generation = store.next_generation();

    let latest = async {
        match source.latest_reading(&client_id).await {
            Ok(reading) => {
                store.apply(Slot::Latest, generation, |s| s.latest = reading);
                true
            }
            Err(e) => {
                tracing::warn!("Latest reading for {} failed: {:#}", client_id, e);
                false
            }
        }
    };
    let series = async {
        match source.sensor_series(&client_id).await {
            Ok(series) => {
                store.apply(Slot::SensorSeries, generation, |s| s.sensor_series = series);
                true
            }
            Err(e) => {
                tracing::warn!("Sensor series for {} failed: {:#}", client_id, e);
                false
            }
        }
    };

    let (latest_ok, series_ok) = tokio::join!(latest, series);
    store.apply(Slot::SensorStatus, generation, |s| {
        s.loading = false;
        s.error = if latest_ok && series_ok {
            None
        } else {
            Some(LOAD_FAILED_BANNER.to_string())
        };
    });
}

async fn poll_simulation(store: Arc<SnapshotStore>, source: Arc<dyn TelemetrySource>, client_id: Arc<str>) {
    let generation = store.next_generation();
    match source.latest_simulation(&client_id).await {
        Ok(result) => {
            store.apply(Slot::Simulation, generation, |s| s.simulation = result);
        }
        Err(e) => tracing::warn!("Simulation for {} failed: {:#}", client_id, e),
    }
}

async fn poll_simulation_series(store: Arc<SnapshotStore>, source: Arc<dyn TelemetrySource>, client_id: Arc<str>) {
    let generation = store.next_generation();
    match source.simulation_series(&client_id).await {
        Ok(series) => {
            store.apply(Slot::SimulationSeries, generation, |s| s.simulation_series = series);
        }
        Err(e) => tracing::warn!("Simulation series for {} failed: {:#}", client_id, e),
    }
}
