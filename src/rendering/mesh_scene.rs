// Renderable scene built from a mesh descriptor, and its projected frame
use super::camera::{project, BoundingSphere, OrbitCamera};
use super::color_ramp::{Rgb, FLAT_COLOR};
use super::mesh_viewer::ViewerOptions;
use crate::domain::mesh::MeshDescriptor;
use glam::{Vec2, Vec3};
use std::collections::BTreeSet;

const AMBIENT: f32 = 0.35;
const MARKER_WORLD_FRACTION: f32 = 0.03;

#[derive(Debug, Clone, PartialEq)]
pub struct MeshScene {
    positions: Vec<Vec3>,
    reference: Option<Vec<Vec3>>,
    triangles: Vec<[u32; 3]>,
    colors: Vec<Rgb>,
    marker: Option<Vec3>,
    bounds: Option<BoundingSphere>,
    placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameTriangle {
    pub points: [Vec2; 3],
    pub fill: Rgb,
    pub depth: f32,
}

/// One projected image of the scene, in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Back to front.
    pub triangles: Vec<FrameTriangle>,
    pub reference: Vec<[Vec2; 3]>,
    pub edges: Vec<[Vec2; 2]>,
    pub marker: Option<(Vec2, f32)>,
    pub placeholder: Option<String>,
}

impl MeshScene {
    pub fn placeholder(reason: impl Into<String>) -> Self {
        Self {
            positions: Vec::new(),
            reference: None,
            triangles: Vec::new(),
            colors: Vec::new(),
            marker: None,
            bounds: None,
            placeholder: Some(reason.into()),
        }
    }

    /// Never fails: missing or malformed meshes become a placeholder scene.
    pub fn build(mesh: Option<&MeshDescriptor>, options: &ViewerOptions) -> Self {
        let Some(mesh) = mesh else {
            return Self::placeholder("no model");
        };
        if let Err(e) = mesh.validate() {
            tracing::warn!("Rejecting mesh: {}", e);
            return Self::placeholder(format!("invalid model: {}", e));
        }

        let base: Vec<Vec3> = mesh
            .vertices
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();

        let (positions, reference) = match mesh.matched_displacements() {
            Some(disp) => {
                let scale = options.deformation_scale;
                let deformed: Vec<Vec3> = base
                    .iter()
                    .zip(disp.chunks_exact(3))
                    .map(|(p, d)| *p + Vec3::new(d[0], d[1], d[2]) * scale)
                    .collect();
                (deformed, options.show_undeformed.then_some(base))
            }
            None => (base, None),
        };

        let colors = match mesh.matched_scalar_field() {
            Some(field) => options.ramp.colorize(field),
            None => vec![FLAT_COLOR; positions.len()],
        };

        let triangles = mesh
            .indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        let marker = mesh
            .marker
            .or(options.default_marker)
            .map(Vec3::from_array)
            .filter(|m| m.is_finite());

        let mut bounds = BoundingSphere::from_points(&positions);
        if let Some(reference) = &reference {
            bounds = merge(bounds, BoundingSphere::from_points(reference));
        }
        if let Some(m) = marker {
            bounds = merge(bounds, Some(BoundingSphere { center: m, radius: 0.0 }));
        }

        Self {
            positions,
            reference,
            triangles,
            colors,
            marker,
            bounds,
            placeholder: None,
        }
    }

    pub fn bounds(&self) -> Option<BoundingSphere> {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    #[cfg(test)]
    pub fn vertex_colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn project(&self, camera: &OrbitCamera, options: &ViewerOptions) -> Frame {
        let (width, height) = options.viewport;
        let mut frame = Frame {
            width,
            height,
            placeholder: self.placeholder.clone(),
            ..Default::default()
        };

        let vp = camera.view_projection();
        let eye = camera.eye();
        let to_pixels = |ndc: Vec3| {
            Vec2::new(
                (ndc.x + 1.0) * 0.5 * width as f32,
                (1.0 - ndc.y) * 0.5 * height as f32,
            )
        };
        let screen = |points: &[Vec3]| -> Vec<Option<Vec2>> {
            points.iter().map(|&p| project(&vp, p).map(to_pixels)).collect()
        };

        let projected = screen(&self.positions);
        for tri in &self.triangles {
            let [a, b, c] = tri.map(|i| i as usize);
            let (Some(pa), Some(pb), Some(pc)) = (projected[a], projected[b], projected[c]) else {
                continue;
            };
            let (wa, wb, wc) = (self.positions[a], self.positions[b], self.positions[c]);
            let centroid = (wa + wb + wc) / 3.0;
            let normal = (wb - wa).cross(wc - wa).normalize_or_zero();
            let view_dir = (eye - centroid).normalize_or_zero();
            let light = AMBIENT + (1.0 - AMBIENT) * normal.dot(view_dir).abs();

            let fill = self.colors[a]
                .lerp(self.colors[b], 0.5)
                .lerp(self.colors[c], 1.0 / 3.0)
                .scale(light);

            frame.triangles.push(FrameTriangle {
                points: [pa, pb, pc],
                fill,
                depth: centroid.distance(eye),
            });
        }
        frame
            .triangles
            .sort_by(|x, y| y.depth.total_cmp(&x.depth));

        if let Some(reference) = &self.reference {
            let projected = screen(reference);
            frame.reference = self
                .triangles
                .iter()
                .filter_map(|tri| {
                    let [a, b, c] = tri.map(|i| i as usize);
                    Some([projected[a]?, projected[b]?, projected[c]?])
                })
                .collect();
        }

        if options.show_wireframe {
            let edges: BTreeSet<(u32, u32)> = self
                .triangles
                .iter()
                .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect();
            frame.edges = edges
                .into_iter()
                .filter_map(|(a, b)| Some([projected[a as usize]?, projected[b as usize]?]))
                .collect();
        }

        if let (Some(m), Some(bounds)) = (self.marker, self.bounds) {
            if let Some(center) = project(&vp, m).map(to_pixels) {
                let world_radius = (bounds.radius * MARKER_WORLD_FRACTION).max(1e-4);
                let depth = m.distance(eye).max(1e-4);
                let px = world_radius / (depth * (camera.fov_y * 0.5).tan()) * height as f32 * 0.5;
                frame.marker = Some((center, px.max(3.0)));
            }
        }

        frame
    }
}

fn merge(a: Option<BoundingSphere>, b: Option<BoundingSphere>) -> Option<BoundingSphere> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (a, b) => a.or(b),
    }
}
