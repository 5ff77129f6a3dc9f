use bytemuck::{Pod, Zeroable};

use crate::paint::Color;

/// One batched vertex as the batch shader reads it.
///
/// The in-memory layout is the wire layout: `x, y, z, r, g, b, a, u, v, slot`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    /// `[-1, -1]` when untextured.
    pub uv: [f32; 2],
    /// Texture slot as a float, `-1` when untextured.
    pub slot: f32,
}

impl Vertex {
    /// Floats per vertex.
    pub const FLOATS: usize = 10;
    /// Bytes per vertex.
    pub const BYTES: u32 = (Self::FLOATS * 4) as u32;

    pub const NO_TEXTURE: f32 = -1.0;

    #[inline]
    pub fn untextured(x: f32, y: f32, z: f32, color: Color) -> Self {
        Self {
            position: [x, y, z],
            color: color.to_array(),
            uv: [Self::NO_TEXTURE; 2],
            slot: Self::NO_TEXTURE,
        }
    }

    #[inline]
    pub fn textured(x: f32, y: f32, z: f32, color: Color, uv: [f32; 2], slot: u32) -> Self {
        Self {
            position: [x, y, z],
            color: color.to_array(),
            uv,
            slot: slot as f32,
        }
    }

    /// Slot index, `None` for untextured vertices.
    pub fn slot_index(&self) -> Option<u32> {
        (self.slot >= 0.0).then_some(self.slot as u32)
    }

    pub fn to_floats(&self) -> [f32; Self::FLOATS] {
        bytemuck::cast(*self)
    }

    /// Reads one vertex from the first [`Vertex::FLOATS`] values of `floats`.
    pub fn from_floats(floats: &[f32]) -> Option<Self> {
        let head: &[f32; Self::FLOATS] = floats.get(..Self::FLOATS)?.try_into().ok()?;
        Some(bytemuck::cast(*head))
    }
}

/// Vertex arena with a free list.
///
/// Primitive lists hold indices into the arena; releasing an index makes the
/// slot available to the next [`acquire`](VertexPool::acquire) without
/// shrinking the arena.
#[derive(Debug, Default)]
pub struct VertexPool {
    vertices: Vec<Vertex>,
    free: Vec<u32>,
}

impl VertexPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Stores `vertex`, reusing a released slot when one is available.
    pub fn acquire(&mut self, vertex: Vertex) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.vertices[index as usize] = vertex;
                index
            }
            None => {
                self.vertices.push(vertex);
                (self.vertices.len() - 1) as u32
            }
        }
    }

    pub fn release_all(&mut self, indices: impl IntoIterator<Item = u32>) {
        self.free.extend(indices);
    }

    #[inline]
    pub fn get(&self, index: u32) -> &Vertex {
        &self.vertices[index as usize]
    }

    /// Copies the vertices behind `indices`, in order.
    pub fn gather(&self, indices: &[u32]) -> Vec<Vertex> {
        indices.iter().map(|&i| *self.get(i)).collect()
    }

    /// Slots allocated so far, live or free.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_ten_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), Vertex::BYTES as usize);
        let v = Vertex::textured(1.0, 2.0, 3.0, Color::new(0.1, 0.2, 0.3, 0.4), [0.5, 0.6], 7);
        assert_eq!(v.to_floats(), [1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 7.0]);
    }

    #[test]
    fn float_round_trip_is_exact() {
        let v = Vertex::textured(-3.25, 1e-7, 2.0e-6, Color::CYAN, [0.125, 0.875], 3);
        let back = Vertex::from_floats(&v.to_floats()).unwrap();
        assert_eq!(back, v);
        assert!(Vertex::from_floats(&[0.0; 9]).is_none());
    }

    #[test]
    fn untextured_uses_sentinels() {
        let v = Vertex::untextured(0.0, 0.0, 0.0, Color::WHITE);
        assert_eq!(v.uv, [-1.0, -1.0]);
        assert_eq!(v.slot_index(), None);
    }

    #[test]
    fn pool_reuses_released_slots() {
        let mut pool = VertexPool::with_capacity(4);
        let a = pool.acquire(Vertex::untextured(1.0, 0.0, 0.0, Color::RED));
        let b = pool.acquire(Vertex::untextured(2.0, 0.0, 0.0, Color::RED));
        pool.release_all([a, b]);

        let c = pool.acquire(Vertex::untextured(3.0, 0.0, 0.0, Color::BLUE));
        assert!(c == a || c == b);
        assert_eq!(pool.allocated(), 2);
        assert_eq!(pool.get(c).position[0], 3.0);
        assert_eq!(pool.free_len(), 1);
    }
}
