// Finite-element mesh domain models
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("vertex buffer length {0} is not a multiple of 3")]
    RaggedVertices(usize),
    #[error("index buffer length {0} is not a multiple of 3")]
    RaggedIndices(usize),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Triangle mesh as delivered by the simulation backend.
///
/// `vertices` is a flat xyz buffer and `indices` a flat list of triangle
/// corners. `scalar_field` carries one value per vertex and `displacements`
/// one xyz triple per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDescriptor {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub scalar_field: Option<Vec<f32>>,
    pub marker: Option<[f32; 3]>,
    pub displacements: Option<Vec<f32>>,
}

impl MeshDescriptor {
    pub fn new(vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.len() % 3 != 0 {
            return Err(MeshError::RaggedVertices(self.vertices.len()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::RaggedIndices(self.indices.len()));
        }
        let vertex_count = self.vertex_count();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(())
    }

    /// Scalar field, only when it lines up one-to-one with the vertices.
    pub fn matched_scalar_field(&self) -> Option<&[f32]> {
        self.scalar_field
            .as_deref()
            .filter(|field| field.len() == self.vertex_count())
    }

    /// Displacement triples, only when they line up with the vertices.
    pub fn matched_displacements(&self) -> Option<&[f32]> {
        self.displacements
            .as_deref()
            .filter(|d| d.len() == self.vertices.len())
    }

    /// Finite min/max of the scalar field, for the colour legend.
    pub fn scalar_range(&self) -> Option<(f32, f32)> {
        let field = self.scalar_field.as_deref()?;
        field
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Header data describing the simulated model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    pub length_m: Option<f64>,
    pub youngs_modulus_pa: Option<f64>,
    pub load_n: Option<f64>,
    pub boundary_conditions: Option<String>,
}

impl ModelParams {
    pub fn youngs_modulus_gpa(&self) -> Option<f64> {
        self.youngs_modulus_pa.map(|e| e / 1e9)
    }

    pub fn load_kn(&self) -> Option<f64> {
        self.load_n.map(|p| p / 1000.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResult {
    pub status: String,
    pub mesh: Option<MeshDescriptor>,
    pub model: ModelParams,
}

impl SimulationResult {
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }
}
