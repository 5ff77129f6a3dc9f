use glam::{Mat4, Quat, Vec2, Vec3};

/// 2D pose: scale, then rotate (radians, counter-clockwise), then translate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        scale: Vec2::ONE,
        rotation: 0.0,
    };

    pub fn from_translation(translation: Vec2) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// `[tx, ty, sx, sy, rotation]`, the per-vertex suffix mesh shaders read.
    #[inline]
    pub fn to_floats(&self) -> [f32; 5] {
        [
            self.translation.x,
            self.translation.y,
            self.scale.x,
            self.scale.y,
            self.rotation,
        ]
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale.extend(1.0),
            Quat::from_rotation_z(self.rotation),
            self.translation.extend(0.0),
        )
    }

    /// Applies the pose to a point.
    pub fn apply(&self, point: Vec2) -> Vec2 {
        let scaled = point * self.scale;
        Vec2::from_angle(self.rotation).rotate(scaled) + self.translation
    }

    pub fn apply3(&self, point: Vec3) -> Vec3 {
        self.apply(point.truncate()).extend(point.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn apply_scales_rotates_translates() {
        let t = Transform::from_translation(Vec2::new(10.0, 0.0))
            .with_scale(Vec2::new(2.0, 1.0))
            .with_rotation(std::f32::consts::FRAC_PI_2);

        assert!(close(t.apply(Vec2::new(1.0, 0.0)), Vec2::new(10.0, 2.0)));
    }

    #[test]
    fn matrix_agrees_with_apply() {
        let t = Transform::from_translation(Vec2::new(-3.0, 4.0))
            .with_scale(Vec2::new(0.5, 3.0))
            .with_rotation(0.7);
        let p = Vec2::new(1.5, -2.0);

        let via_matrix = t.matrix().transform_point3(p.extend(0.0)).truncate();
        assert!(close(via_matrix, t.apply(p)));
    }

    #[test]
    fn float_suffix_order() {
        let t = Transform::from_translation(Vec2::new(1.0, 2.0))
            .with_scale(Vec2::new(3.0, 4.0))
            .with_rotation(5.0);
        assert_eq!(t.to_floats(), [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(Transform::default().to_floats(), [0.0, 0.0, 1.0, 1.0, 0.0]);
    }
}
