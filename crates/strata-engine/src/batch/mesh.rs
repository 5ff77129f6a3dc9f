use std::sync::Arc;

use crate::math::Transform;

/// Raw mesh geometry: interleaved vertex floats plus optional `u32` indices.
///
/// The float layout is whatever the installed mesh shader expects, minus the
/// five pose floats the batch appends to every vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Option<Vec<u32>>,
}

/// A drawable instance: shared geometry and its own pose.
///
/// Cloning a mesh shares the geometry; only the transform is copied.
#[derive(Debug, Clone)]
pub struct Mesh {
    geometry: Arc<MeshData>,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(vertices: Vec<f32>) -> Self {
        Self::from_shared(Arc::new(MeshData { vertices, indices: None }))
    }

    pub fn indexed(vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self::from_shared(Arc::new(MeshData { vertices, indices: Some(indices) }))
    }

    pub fn from_shared(geometry: Arc<MeshData>) -> Self {
        Self { geometry, transform: Transform::IDENTITY }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn vertices(&self) -> &[f32] {
        &self.geometry.vertices
    }

    #[inline]
    pub fn indices(&self) -> Option<&[u32]> {
        self.geometry.indices.as_deref()
    }

    #[inline]
    pub fn geometry(&self) -> &Arc<MeshData> {
        &self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn clones_share_geometry() {
        let a = Mesh::indexed(vec![0.0; 12], vec![0, 1, 2]);
        let mut b = a.clone();
        b.transform = Transform::from_translation(Vec2::new(4.0, 0.0));

        assert!(Arc::ptr_eq(a.geometry(), b.geometry()));
        assert_eq!(a.transform, Transform::IDENTITY);
        assert_eq!(b.indices(), Some(&[0, 1, 2][..]));
    }
}
