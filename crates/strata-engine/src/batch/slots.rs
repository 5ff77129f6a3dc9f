use crate::gfx::TextureId;

use super::BatchError;

/// Texture ids bound for one flush; a texture's position is its slot.
#[derive(Debug, Clone)]
pub struct TextureSlots {
    ids: Vec<TextureId>,
    capacity: u32,
}

impl TextureSlots {
    pub fn new(capacity: u32) -> Self {
        Self {
            ids: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn slot_of(&self, id: TextureId) -> Option<u32> {
        self.ids.iter().position(|&t| t == id).map(|i| i as u32)
    }

    /// Whether `resolve(id)` would succeed.
    pub fn can_fit(&self, id: TextureId) -> bool {
        self.slot_of(id).is_some() || (self.ids.len() as u32) < self.capacity
    }

    /// Returns the slot of `id`, assigning the next free one on first use.
    pub fn resolve(&mut self, id: TextureId) -> Result<u32, BatchError> {
        if let Some(slot) = self.slot_of(id) {
            return Ok(slot);
        }
        if self.ids.len() as u32 >= self.capacity {
            return Err(BatchError::TextureSlotsFull { capacity: self.capacity });
        }
        self.ids.push(id);
        Ok((self.ids.len() - 1) as u32)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// `(slot, texture)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, TextureId)> + '_ {
        self.ids.iter().enumerate().map(|(i, &id)| (i as u32, id))
    }

    /// Slot → texture unit table uploaded with every flush. Slot `i` samples unit `i`.
    pub fn unit_table(&self) -> Vec<i32> {
        (0..self.capacity as i32).collect()
    }
}
