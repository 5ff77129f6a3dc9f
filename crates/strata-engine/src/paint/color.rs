/// Straight-alpha RGBA color.
///
/// Invariant:
/// - every channel is in `[0, 1]`; constructors clamp.
///
/// Fields are read-only so the invariant cannot be broken after construction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    r: f32,
    g: f32,
    b: f32,
    a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self::opaque_const(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::opaque_const(0.0, 0.0, 0.0);
    pub const RED: Self = Self::opaque_const(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::opaque_const(0.0, 1.0, 0.0);
    pub const BLUE: Self = Self::opaque_const(0.0, 0.0, 1.0);
    pub const YELLOW: Self = Self::opaque_const(1.0, 1.0, 0.0);
    pub const MAGENTA: Self = Self::opaque_const(1.0, 0.0, 1.0);
    pub const CYAN: Self = Self::opaque_const(0.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    const fn opaque_const(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Creates a color, clamping each channel to `[0, 1]`.
    ///
    /// NaN channels become 0.
    #[inline]
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
            a: clamp_unit(a),
        }
    }

    #[inline]
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Creates a color from 8-bit channels.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a: clamp_unit(a), ..self }
    }

    #[inline]
    pub fn r(self) -> f32 {
        self.r
    }

    #[inline]
    pub fn g(self) -> f32 {
        self.g
    }

    #[inline]
    pub fn b(self) -> f32 {
        self.b
    }

    #[inline]
    pub fn a(self) -> f32 {
        self.a
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[inline]
fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_clamped() {
        let c = Color::new(1.5, -0.25, 0.5, 2.0);
        assert_eq!(c.to_array(), [1.0, 0.0, 0.5, 1.0]);
        assert_eq!(Color::new(f32::NAN, 0.0, 0.0, 1.0).r(), 0.0);
    }

    #[test]
    fn from_bytes() {
        assert_eq!(Color::from_rgba8(255, 0, 255, 255), Color::MAGENTA);
        assert_eq!(Color::WHITE.with_alpha(0.5).a(), 0.5);
    }
}
