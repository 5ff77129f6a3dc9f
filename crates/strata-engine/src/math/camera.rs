use glam::{Mat4, Vec2};

/// Orthographic 2D camera.
///
/// The projection maps `z = near` to depth 0, so with the default `near = 1`
/// and `far = -1` larger `z` values are closer to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCamera {
    position: Vec2,
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
    projection: Mat4,
    view: Mat4,
}

impl Default for OrthographicCamera {
    fn default() -> Self {
        Self::new(-1.0, 1.0, -1.0, 1.0, 1.0, -1.0)
    }
}

impl OrthographicCamera {
    pub fn new(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec2::ZERO,
            left,
            right,
            bottom,
            top,
            near,
            far,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    /// Camera whose visible area is `width` × `height` units centered on the origin.
    pub fn screen(width: f32, height: f32) -> Self {
        let mut camera = Self::default();
        camera.set_viewport(width, height);
        camera
    }

    /// Re-centers the bounds on a `width` × `height` area.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        let (hw, hh) = (width.max(1.0) * 0.5, height.max(1.0) * 0.5);
        self.set_bounds(-hw, hw, -hh, hh);
    }

    pub fn set_bounds(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        self.left = left;
        self.right = right;
        self.bottom = bottom;
        self.top = top;
        self.update_projection();
    }

    /// Moves the camera; the world shifts the opposite way on screen.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.view = Mat4::from_translation((-position).extend(0.0));
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    fn update_projection(&mut self) {
        // Right-handed with eye looking down -z: view-space z = -near maps to depth 0,
        // so negate the planes to make z = near the front plane.
        self.projection = Mat4::orthographic_rh(
            self.left,
            self.right,
            self.bottom,
            self.top,
            -self.near,
            -self.far,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn screen_maps_corners_to_clip_edges() {
        let camera = OrthographicCamera::screen(800.0, 600.0);
        let p = camera.projection().project_point3(Vec3::new(400.0, -300.0, 0.0));
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn larger_z_is_nearer() {
        let camera = OrthographicCamera::screen(2.0, 2.0);
        let back = camera.projection().project_point3(Vec3::new(0.0, 0.0, 0.0));
        let front = camera.projection().project_point3(Vec3::new(0.0, 0.0, 1.0e-3));

        assert!(front.z < back.z);
        assert!((0.0..=1.0).contains(&back.z));
        assert!((back.z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn position_offsets_view() {
        let mut camera = OrthographicCamera::default();
        camera.set_position(Vec2::new(5.0, -2.0));
        let p = camera.view().transform_point3(Vec3::new(5.0, -2.0, 0.0));
        assert_eq!(p, Vec3::ZERO);
    }
}
