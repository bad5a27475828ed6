// Orbit camera and bounding-sphere framing
use glam::{Mat4, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Extra room left around the framed sphere.
const FRAME_MARGIN: f32 = 1.1;
const DEFAULT_YAW_DEG: f32 = 45.0;
const DEFAULT_PITCH_DEG: f32 = 30.0;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.017;
const MIN_RADIUS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Bounding-box centre with the farthest point as radius.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f32, f32::max);
        Some(Self { center, radius })
    }

    pub fn merge(self, other: BoundingSphere) -> BoundingSphere {
        let offset = other.center - self.center;
        let gap = offset.length();
        if gap + other.radius <= self.radius {
            return self;
        }
        if gap + self.radius <= other.radius {
            return other;
        }
        let radius = (gap + self.radius + other.radius) * 0.5;
        let center = self.center + offset.normalize_or_zero() * (radius - self.radius);
        BoundingSphere { center, radius }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    /// Radians around the vertical axis.
    pub yaw: f32,
    /// Radians above the horizontal plane.
    pub pitch: f32,
    pub distance: f32,
    pub fov_y: f32,
    pub aspect: f32,
}

impl OrbitCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: DEFAULT_YAW_DEG.to_radians(),
            pitch: DEFAULT_PITCH_DEG.to_radians(),
            distance: 5.0,
            fov_y: 45_f32.to_radians(),
            aspect: if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 },
        }
    }

    /// Reset to the default viewing angle at a distance where the whole
    /// sphere fits in both the horizontal and the vertical field of view.
    pub fn frame(&mut self, sphere: BoundingSphere) {
        let radius = sphere.radius.max(MIN_RADIUS);
        self.target = sphere.center;
        self.yaw = DEFAULT_YAW_DEG.to_radians();
        self.pitch = DEFAULT_PITCH_DEG.to_radians();
        self.distance = radius / self.limiting_half_fov().sin() * FRAME_MARGIN;
    }

    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        if d_yaw.is_finite() {
            self.yaw += d_yaw;
        }
        if d_pitch.is_finite() {
            self.pitch = (self.pitch + d_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
    }

    /// Moves the target in screen space; one unit spans half the view height.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let forward = (self.target - self.eye()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        let scale = self.distance * (self.fov_y * 0.5).tan();
        self.target += (right * dx + up * dy) * scale;
    }

    /// `factor < 1` moves closer.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).max(MIN_RADIUS);
        }
    }

    pub fn eye(&self) -> Vec3 {
        let dir = Vec3::new(
            self.pitch.cos() * self.yaw.cos(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.sin(),
        );
        self.target + dir * self.distance
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        let near = (self.distance * 0.01).max(1e-4);
        let far = self.distance * 100.0;
        Mat4::perspective_rh(self.fov_y, self.aspect, near, far) * self.view()
    }

    fn limiting_half_fov(&self) -> f32 {
        let half_y = self.fov_y * 0.5;
        let half_x = (half_y.tan() * self.aspect).atan();
        half_y.min(half_x)
    }
}

/// Normalised device coordinates, or `None` behind the camera.
pub fn project(view_projection: &Mat4, point: Vec3) -> Option<Vec3> {
    let clip = *view_projection * point.extend(1.0);
    (clip.w > 1e-6).then(|| clip.truncate() / clip.w)
}
