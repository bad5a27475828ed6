// Mesh viewer - Render loop owning a camera, a scene and a drawing surface
use super::camera::OrbitCamera;
use super::color_ramp::ColorRamp;
use super::mesh_scene::{Frame, MeshScene};
use crate::domain::mesh::MeshDescriptor;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub viewport: (u32, u32),
    pub refresh_hz: u32,
    /// Multiplies per-vertex displacements when the mesh carries them.
    pub deformation_scale: f32,
    pub show_undeformed: bool,
    pub show_wireframe: bool,
    pub interactive_camera: bool,
    /// Used when the descriptor itself has no marker.
    pub default_marker: Option<[f32; 3]>,
    pub ramp: ColorRamp,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            viewport: (640, 220),
            refresh_hz: 30,
            deformation_scale: 50.0,
            show_undeformed: true,
            show_wireframe: false,
            interactive_camera: true,
            default_marker: None,
            ramp: ColorRamp::default(),
        }
    }
}

/// What the viewer is asked to show.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSource {
    Mesh(Arc<MeshDescriptor>),
    /// A simulation that has not finished; carries its status.
    Pending(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CameraCommand {
    Orbit { d_yaw: f32, d_pitch: f32 },
    Pan { dx: f32, dy: f32 },
    Zoom { factor: f32 },
    Fit,
    SetScale { factor: f32 },
    ShowReference { visible: bool },
    SetInteractive { enabled: bool },
}

impl CameraCommand {
    fn moves_camera(&self) -> bool {
        matches!(self, Self::Orbit { .. } | Self::Pan { .. } | Self::Zoom { .. })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ViewerError {
    #[error("camera is locked")]
    Locked,
    #[error("deformation scale must be positive, got {0}")]
    InvalidScale(f32),
    #[error("render loop has stopped")]
    Stopped,
}

/// Where frames go. `release` runs exactly once when the loop ends, however
/// it ends.
pub trait RenderSurface: Send + 'static {
    fn draw(&mut self, frame: &Frame);

    fn release(&mut self) {}
}

/// Surface that keeps only the most recent frame, for readers elsewhere.
#[derive(Clone)]
pub struct FrameSlot {
    tx: Arc<watch::Sender<Option<Arc<Frame>>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.tx.borrow().clone()
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for FrameSlot {
    fn draw(&mut self, frame: &Frame) {
        self.tx.send_replace(Some(Arc::new(frame.clone())));
    }

    fn release(&mut self) {
        self.tx.send_replace(None);
    }
}

struct SurfaceGuard<S: RenderSurface>(S);

impl<S: RenderSurface> Drop for SurfaceGuard<S> {
    fn drop(&mut self) {
        self.0.release();
    }
}

pub struct MeshViewer {
    commands: mpsc::UnboundedSender<CameraCommand>,
    interactive: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl MeshViewer {
    /// Starts the render loop. A new value on `scene_rx` rebuilds the scene
    /// and re-frames the camera.
    pub fn spawn<S: RenderSurface>(
        options: ViewerOptions,
        scene_rx: watch::Receiver<Option<SceneSource>>,
        surface: S,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let interactive = Arc::new(AtomicBool::new(options.interactive_camera));
        let task = tokio::spawn(render_loop(options, scene_rx, rx, surface));
        Self {
            commands: tx,
            interactive,
            task: Some(task),
        }
    }

    /// Queues a command for the next frame. Orbit, pan and zoom are refused
    /// while the camera is locked; locking itself takes effect immediately.
    pub fn send(&self, command: CameraCommand) -> Result<(), ViewerError> {
        if self.commands.is_closed() {
            return Err(ViewerError::Stopped);
        }
        match command {
            CameraCommand::SetInteractive { enabled } => {
                self.interactive.store(enabled, Ordering::SeqCst);
                return Ok(());
            }
            CameraCommand::SetScale { factor } if !(factor.is_finite() && factor > 0.0) => {
                return Err(ViewerError::InvalidScale(factor));
            }
            c if c.moves_camera() && !self.is_interactive() => return Err(ViewerError::Locked),
            _ => {}
        }
        self.commands.send(command).map_err(|_| ViewerError::Stopped)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }

    /// Stops the loop and waits until the surface has been released.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for MeshViewer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn render_loop<S: RenderSurface>(
    mut options: ViewerOptions,
    mut scene_rx: watch::Receiver<Option<SceneSource>>,
    mut commands: mpsc::UnboundedReceiver<CameraCommand>,
    surface: S,
) {
    let mut surface = SurfaceGuard(surface);
    let (w, h) = options.viewport;
    let mut camera = OrbitCamera::new(w as f32 / h.max(1) as f32);

    let mut source = scene_rx.borrow_and_update().clone();
    let mut scene = build_scene(source.as_ref(), &options);
    if let Some(bounds) = scene.bounds() {
        camera.frame(bounds);
    }

    let period = Duration::from_secs_f64(1.0 / options.refresh_hz.max(1) as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // a closed channel just means no more replacements; keep the last scene
        if scene_rx.has_changed().unwrap_or(false) {
            source = scene_rx.borrow_and_update().clone();
            scene = build_scene(source.as_ref(), &options);
            if let Some(bounds) = scene.bounds() {
                camera.frame(bounds);
            }
            if scene.is_placeholder() {
                tracing::debug!("Mesh cleared");
            } else {
                tracing::debug!("Mesh replaced: {} triangles", scene.triangle_count());
            }
        }

        while let Ok(command) = commands.try_recv() {
            match command {
                // display changes rebuild the scene but keep the user's view
                CameraCommand::SetScale { factor } => {
                    options.deformation_scale = factor;
                    scene = build_scene(source.as_ref(), &options);
                }
                CameraCommand::ShowReference { visible } => {
                    options.show_undeformed = visible;
                    scene = build_scene(source.as_ref(), &options);
                }
                other => apply(&mut camera, &scene, other),
            }
        }

        let frame = scene.project(&camera, &options);
        surface.0.draw(&frame);
    }
}

fn build_scene(source: Option<&SceneSource>, options: &ViewerOptions) -> MeshScene {
    match source {
        Some(SceneSource::Mesh(mesh)) => MeshScene::build(Some(mesh.as_ref()), options),
        Some(SceneSource::Pending(status)) => MeshScene::placeholder(format!("status: {}", status)),
        None => MeshScene::build(None, options),
    }
}

fn apply(camera: &mut OrbitCamera, scene: &MeshScene, command: CameraCommand) {
    match command {
        CameraCommand::Fit => {
            if let Some(bounds) = scene.bounds() {
                camera.frame(bounds);
            }
        }
        CameraCommand::Orbit { d_yaw, d_pitch } => camera.orbit(d_yaw, d_pitch),
        CameraCommand::Pan { dx, dy } => camera.pan(dx, dy),
        CameraCommand::Zoom { factor } => camera.zoom(factor),
        CameraCommand::SetScale { .. }
        | CameraCommand::ShowReference { .. }
        | CameraCommand::SetInteractive { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Recorder {
        draws: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
        last: Arc<Mutex<Option<Frame>>>,
    }

    impl RenderSurface for Recorder {
        fn draw(&mut self, frame: &Frame) {
            self.draws.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(frame.clone());
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl Recorder {
        fn last(&self) -> Frame {
            self.last.lock().unwrap().clone().expect("a frame was drawn")
        }
    }

    fn beam(length: f32) -> SceneSource {
        SceneSource::Mesh(Arc::new(MeshDescriptor::new(
            vec![0.0, 0.0, 0.0, length, 0.0, 0.0, length, 1.0, 0.0, 0.0, 1.0, 0.0],
            vec![0, 1, 2, 0, 2, 3],
        )))
    }

    fn sagging_beam() -> SceneSource {
        let mut mesh = MeshDescriptor::new(
            vec![0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 4.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            vec![0, 1, 2, 0, 2, 3],
        );
        mesh.displacements = Some(vec![0.0, 0.0, 0.0, 0.0, -0.01, 0.0, 0.0, -0.01, 0.0, 0.0, 0.0, 0.0]);
        SceneSource::Mesh(Arc::new(mesh))
    }

    fn all_inside(frame: &Frame) -> bool {
        frame.triangles.iter().all(|t| {
            t.points.iter().all(|p| {
                p.x >= 0.0 && p.y >= 0.0 && p.x <= frame.width as f32 && p.y <= frame.height as f32
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_draws_until_shutdown() {
        let (_tx, rx) = watch::channel(Some(beam(1.0)));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(recorder.draws.load(Ordering::SeqCst) >= 10);

        viewer.shutdown().await;
        assert!(recorder.released.load(Ordering::SeqCst));

        let drawn = recorder.draws.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(recorder.draws.load(Ordering::SeqCst), drawn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_surface() {
        let (_tx, rx) = watch::channel(None);
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        drop(viewer);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(recorder.released.load(Ordering::SeqCst));
        assert_eq!(recorder.last().placeholder.as_deref(), Some("no model"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mesh_replacement_reframes_camera() {
        let (tx, rx) = watch::channel(Some(beam(1.0)));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        // zoom way in so the old framing would clip anything larger
        viewer.send(CameraCommand::Zoom { factor: 0.01 }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        tx.send_replace(Some(beam(80.0)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let frame = recorder.last();
        assert_eq!(frame.triangles.len(), 2);
        assert!(all_inside(&frame));
        viewer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_camera_ignores_orbit_but_fits() {
        let options = ViewerOptions {
            interactive_camera: false,
            ..Default::default()
        };
        let (_tx, rx) = watch::channel(Some(beam(3.0)));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(options, rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = recorder.last();

        assert_eq!(
            viewer.send(CameraCommand::Orbit { d_yaw: 1.0, d_pitch: 0.3 }),
            Err(ViewerError::Locked)
        );
        assert_eq!(viewer.send(CameraCommand::Zoom { factor: 3.0 }), Err(ViewerError::Locked));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.last(), before);

        assert!(viewer.send(CameraCommand::Fit).is_ok());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.last(), before);
        viewer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_orbit_changes_frame() {
        let (_tx, rx) = watch::channel(Some(beam(3.0)));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = recorder.last();

        viewer.send(CameraCommand::Orbit { d_yaw: 0.8, d_pitch: 0.2 }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_ne!(recorder.last(), before);

        viewer.send(CameraCommand::Fit).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.last(), before);
        viewer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_can_be_toggled_while_running() {
        let (_tx, rx) = watch::channel(Some(beam(3.0)));
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, Recorder::default());
        assert!(viewer.is_interactive());

        viewer.send(CameraCommand::SetInteractive { enabled: false }).unwrap();
        assert!(!viewer.is_interactive());
        assert_eq!(viewer.send(CameraCommand::Pan { dx: 0.1, dy: 0.0 }), Err(ViewerError::Locked));

        viewer.send(CameraCommand::SetInteractive { enabled: true }).unwrap();
        assert!(viewer.send(CameraCommand::Pan { dx: 0.1, dy: 0.0 }).is_ok());
        viewer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scale_change_rebuilds_scene_and_keeps_view() {
        let (_tx, rx) = watch::channel(Some(sagging_beam()));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        viewer.send(CameraCommand::Orbit { d_yaw: 0.6, d_pitch: 0.2 }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let orbited = recorder.last();

        // same factor: the rebuilt scene must not snap the camera back
        viewer.send(CameraCommand::SetScale { factor: 50.0 }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.last(), orbited);

        viewer.send(CameraCommand::SetScale { factor: 1.0 }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let rescaled = recorder.last();
        assert_ne!(rescaled.triangles, orbited.triangles);
        assert_eq!(rescaled.reference, orbited.reference);

        assert_eq!(
            viewer.send(CameraCommand::SetScale { factor: 0.0 }),
            Err(ViewerError::InvalidScale(0.0))
        );
        viewer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_toggle_keeps_view() {
        let (_tx, rx) = watch::channel(Some(sagging_beam()));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = recorder.last();
        assert_eq!(before.reference.len(), 2);

        viewer.send(CameraCommand::ShowReference { visible: false }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let hidden = recorder.last();
        assert!(hidden.reference.is_empty());
        assert_eq!(hidden.triangles, before.triangles);

        viewer.send(CameraCommand::ShowReference { visible: true }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.last(), before);
        viewer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_simulation_shows_status() {
        let (tx, rx) = watch::channel(Some(SceneSource::Pending("running".to_string())));
        let recorder = Recorder::default();
        let viewer = MeshViewer::spawn(ViewerOptions::default(), rx, recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let frame = recorder.last();
        assert_eq!(frame.placeholder.as_deref(), Some("status: running"));
        assert!(frame.triangles.is_empty());

        tx.send_replace(Some(beam(2.0)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(recorder.last().placeholder.is_none());
        viewer.shutdown().await;
    }

    #[test]
    fn test_frame_slot_keeps_latest_and_clears_on_release() {
        let mut slot = FrameSlot::new();
        assert!(slot.latest().is_none());
        slot.draw(&Frame {
            width: 10,
            height: 10,
            ..Default::default()
        });
        assert_eq!(slot.latest().map(|f| f.width), Some(10));
        slot.release();
        assert!(slot.latest().is_none());
    }

    #[test]
    fn test_camera_command_json() {
        let cmd: CameraCommand =
            serde_json::from_str(r#"{"action":"orbit","d_yaw":0.5,"d_pitch":-0.1}"#).unwrap();
        assert_eq!(cmd, CameraCommand::Orbit { d_yaw: 0.5, d_pitch: -0.1 });
        let fit: CameraCommand = serde_json::from_str(r#"{"action":"fit"}"#).unwrap();
        assert_eq!(fit, CameraCommand::Fit);
        let scale: CameraCommand = serde_json::from_str(r#"{"action":"set_scale","factor":10}"#).unwrap();
        assert_eq!(scale, CameraCommand::SetScale { factor: 10.0 });
        let lock: CameraCommand =
            serde_json::from_str(r#"{"action":"set_interactive","enabled":false}"#).unwrap();
        assert_eq!(lock, CameraCommand::SetInteractive { enabled: false });
    }
}
