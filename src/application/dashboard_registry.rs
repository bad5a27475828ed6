// Registry of live dashboards, one poller and one mesh viewer per client
use crate::application::polling_service::{PollingConfig, PollingDataSource, PollingHandle};
use crate::application::telemetry_source::{Clock, TelemetrySource};
use crate::domain::dashboard::DashboardSnapshot;
use crate::domain::mesh::SimulationResult;
use crate::infrastructure::config::ViewerSettings;
use crate::rendering::color_ramp::ColorRamp;
use crate::rendering::mesh_scene::Frame;
use crate::rendering::mesh_viewer::{CameraCommand, FrameSlot, MeshViewer, SceneSource, ViewerError, ViewerOptions};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const MAX_CLIENT_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("invalid client id {0:?}")]
    InvalidClientId(String),
    #[error("too many live dashboards (limit {0})")]
    Full(usize),
}

pub fn viewer_options(settings: &ViewerSettings) -> ViewerOptions {
    ViewerOptions {
        viewport: (settings.width.max(1), settings.height.max(1)),
        refresh_hz: settings.refresh_hz.max(1),
        deformation_scale: settings.deformation_scale,
        show_undeformed: settings.show_undeformed,
        show_wireframe: settings.show_wireframe,
        interactive_camera: settings.interactive_camera,
        default_marker: settings.default_marker,
        ramp: ColorRamp::default(),
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Poller, mesh viewer and the task feeding one into the other.
pub struct LiveDashboard {
    polling: PollingHandle,
    forwarder: AbortOnDrop,
    viewer: MeshViewer,
    frames: FrameSlot,
    last_access: Mutex<Instant>,
}

impl LiveDashboard {
    pub fn start(
        client_id: &str,
        source: Arc<dyn TelemetrySource>,
        clock: Arc<dyn Clock>,
        polling: PollingConfig,
        viewer: ViewerOptions,
    ) -> Self {
        let polling = PollingDataSource::start(client_id, source, clock, polling);
        let (scene_tx, scene_rx) = watch::channel(None);
        let forwarder = AbortOnDrop(tokio::spawn(forward_meshes(polling.subscribe(), scene_tx)));
        let frames = FrameSlot::new();
        let viewer = MeshViewer::spawn(viewer, scene_rx, frames.clone());

        Self {
            polling,
            forwarder,
            viewer,
            frames,
            last_access: Mutex::new(Instant::now()),
        }
    }

    /// Marks the dashboard as in use, postponing idle eviction.
    pub fn touch(&self) {
        *self.last_access.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.polling.subscribe()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.polling.snapshot()
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frames.latest()
    }

    pub fn camera(&self, command: CameraCommand) -> Result<(), ViewerError> {
        self.viewer.send(command)
    }

    pub async fn shutdown(self) {
        let Self {
            polling,
            forwarder,
            viewer,
            ..
        } = self;
        drop(forwarder);
        polling.shutdown().await;
        viewer.shutdown().await;
    }
}

/// Hands the viewer a new scene only when what it should show actually
/// changes, so clock ticks and unchanged polls leave the camera alone. A
/// simulation that is not done shows its status instead of its mesh.
async fn forward_meshes(
    mut snapshots: watch::Receiver<DashboardSnapshot>,
    scene_tx: watch::Sender<Option<SceneSource>>,
) {
    loop {
        let replacement = {
            let snapshot = snapshots.borrow_and_update();
            let simulation = snapshot.simulation.as_ref();
            if shows(scene_tx.borrow().as_ref(), simulation) {
                None
            } else {
                Some(scene_source(simulation))
            }
        };
        if let Some(source) = replacement {
            scene_tx.send_replace(source);
        }

        if snapshots.changed().await.is_err() {
            break;
        }
    }
}

fn scene_source(simulation: Option<&SimulationResult>) -> Option<SceneSource> {
    let simulation = simulation?;
    if !simulation.is_done() {
        return Some(SceneSource::Pending(simulation.status.clone()));
    }
    simulation.mesh.clone().map(|mesh| SceneSource::Mesh(Arc::new(mesh)))
}

/// Whether `current` already is what `simulation` would produce.
fn shows(current: Option<&SceneSource>, simulation: Option<&SimulationResult>) -> bool {
    match (current, simulation) {
        (None, None) => true,
        (None, Some(sim)) => sim.is_done() && sim.mesh.is_none(),
        (Some(SceneSource::Pending(status)), Some(sim)) => !sim.is_done() && sim.status == *status,
        (Some(SceneSource::Mesh(mesh)), Some(sim)) => sim.is_done() && sim.mesh.as_ref() == Some(mesh.as_ref()),
        (Some(_), None) => false,
    }
}

pub struct DashboardRegistry {
    dashboards: Mutex<HashMap<String, Arc<LiveDashboard>>>,
    source: Arc<dyn TelemetrySource>,
    clock: Arc<dyn Clock>,
    polling: PollingConfig,
    viewer: ViewerOptions,
    max_dashboards: usize,
    idle_ttl: Duration,
}

impl DashboardRegistry {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        clock: Arc<dyn Clock>,
        polling: PollingConfig,
        viewer: ViewerOptions,
        max_dashboards: usize,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            dashboards: Mutex::new(HashMap::new()),
            source,
            clock,
            polling,
            viewer,
            max_dashboards,
            idle_ttl,
        }
    }

    /// Live dashboard for `client_id`, started on first use.
    pub fn get_or_start(&self, client_id: &str) -> Result<Arc<LiveDashboard>, RegistryError> {
        if !is_valid_client_id(client_id) {
            return Err(RegistryError::InvalidClientId(client_id.to_string()));
        }

        let mut dashboards = self.dashboards.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(dashboard) = dashboards.get(client_id) {
            dashboard.touch();
            return Ok(dashboard.clone());
        }
        if dashboards.len() >= self.max_dashboards {
            tracing::warn!("Refusing dashboard for {}: {} already live", client_id, dashboards.len());
            return Err(RegistryError::Full(self.max_dashboards));
        }

        let dashboard = Arc::new(LiveDashboard::start(
            client_id,
            self.source.clone(),
            self.clock.clone(),
            self.polling,
            self.viewer.clone(),
        ));
        dashboards.insert(client_id.to_string(), dashboard.clone());
        tracing::info!("Dashboard for {} is live ({} total)", client_id, dashboards.len());
        Ok(dashboard)
    }

    pub fn viewer_options(&self) -> &ViewerOptions {
        &self.viewer
    }

    pub fn len(&self) -> usize {
        self.dashboards.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops dashboards nobody has touched for the idle TTL and frees their
    /// slots. Returns how many were stopped.
    pub async fn evict_idle(&self) -> usize {
        let idle: Vec<(String, Arc<LiveDashboard>)> = {
            let mut dashboards = self.dashboards.lock().unwrap_or_else(|e| e.into_inner());
            let ids: Vec<String> = dashboards
                .iter()
                .filter(|(_, d)| d.idle_for() >= self.idle_ttl)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| dashboards.remove_entry(id)).collect()
        };

        let count = idle.len();
        for (client_id, dashboard) in idle {
            tracing::info!("Stopping idle dashboard for {}", client_id);
            stop(client_id, dashboard).await;
        }
        count
    }

    /// Runs `evict_idle` every `every` until the registry is dropped.
    pub fn spawn_sweeper(registry: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!("Evicted {} idle dashboards, {} still live", evicted, registry.len());
                }
            }
        })
    }

    /// Stops every dashboard.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(String, Arc<LiveDashboard>)> = {
            let mut dashboards = self.dashboards.lock().unwrap_or_else(|e| e.into_inner());
            dashboards.drain().collect()
        };

        for (client_id, dashboard) in drained {
            stop(client_id, dashboard).await;
        }
    }
}

/// A dashboard still shared with a request is torn down when its last
/// reference goes away.
async fn stop(client_id: String, dashboard: Arc<LiveDashboard>) {
    match Arc::try_unwrap(dashboard) {
        Ok(dashboard) => dashboard.shutdown().await,
        Err(_) => tracing::debug!("Dashboard for {} still referenced, dropping", client_id),
    }
}

fn is_valid_client_id(client_id: &str) -> bool {
    !client_id.is_empty()
        && client_id.len() <= MAX_CLIENT_ID_LEN
        && client_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
