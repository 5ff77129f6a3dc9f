//! WGSL type tokens accepted as vertex inputs.

use crate::gfx::ElementType;

/// Shape of one WGSL type as a vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TypeInfo {
    /// Components per column (1..=4).
    pub components: u32,
    /// 1 for scalars and vectors, C for `matCxR`.
    pub columns: u32,
    pub element: ElementType,
}

impl TypeInfo {
    const fn new(components: u32, columns: u32, element: ElementType) -> Self {
        Self { components, columns, element }
    }

    #[inline]
    pub const fn bytes(&self) -> u32 {
        self.components * self.columns * self.element.size()
    }
}

use ElementType::{Float as F, Int as I, Uint as U};

static TYPES: &[(&str, TypeInfo)] = &[
    ("f32", TypeInfo::new(1, 1, F)),
    ("i32", TypeInfo::new(1, 1, I)),
    ("u32", TypeInfo::new(1, 1, U)),
    ("vec2<f32>", TypeInfo::new(2, 1, F)),
    ("vec3<f32>", TypeInfo::new(3, 1, F)),
    ("vec4<f32>", TypeInfo::new(4, 1, F)),
    ("vec2<i32>", TypeInfo::new(2, 1, I)),
    ("vec3<i32>", TypeInfo::new(3, 1, I)),
    ("vec4<i32>", TypeInfo::new(4, 1, I)),
    ("vec2<u32>", TypeInfo::new(2, 1, U)),
    ("vec3<u32>", TypeInfo::new(3, 1, U)),
    ("vec4<u32>", TypeInfo::new(4, 1, U)),
    ("vec2f", TypeInfo::new(2, 1, F)),
    ("vec3f", TypeInfo::new(3, 1, F)),
    ("vec4f", TypeInfo::new(4, 1, F)),
    ("vec2i", TypeInfo::new(2, 1, I)),
    ("vec3i", TypeInfo::new(3, 1, I)),
    ("vec4i", TypeInfo::new(4, 1, I)),
    ("vec2u", TypeInfo::new(2, 1, U)),
    ("vec3u", TypeInfo::new(3, 1, U)),
    ("vec4u", TypeInfo::new(4, 1, U)),
    ("mat2x2<f32>", TypeInfo::new(2, 2, F)),
    ("mat2x3<f32>", TypeInfo::new(3, 2, F)),
    ("mat2x4<f32>", TypeInfo::new(4, 2, F)),
    ("mat3x2<f32>", TypeInfo::new(2, 3, F)),
    ("mat3x3<f32>", TypeInfo::new(3, 3, F)),
    ("mat3x4<f32>", TypeInfo::new(4, 3, F)),
    ("mat4x2<f32>", TypeInfo::new(2, 4, F)),
    ("mat4x3<f32>", TypeInfo::new(3, 4, F)),
    ("mat4x4<f32>", TypeInfo::new(4, 4, F)),
    ("mat2x2f", TypeInfo::new(2, 2, F)),
    ("mat2x3f", TypeInfo::new(3, 2, F)),
    ("mat2x4f", TypeInfo::new(4, 2, F)),
    ("mat3x2f", TypeInfo::new(2, 3, F)),
    ("mat3x3f", TypeInfo::new(3, 3, F)),
    ("mat3x4f", TypeInfo::new(4, 3, F)),
    ("mat4x2f", TypeInfo::new(2, 4, F)),
    ("mat4x3f", TypeInfo::new(3, 4, F)),
    ("mat4x4f", TypeInfo::new(4, 4, F)),
    // Opaque handles occupy one integer slot.
    ("sampler", TypeInfo::new(1, 1, I)),
    ("sampler_comparison", TypeInfo::new(1, 1, I)),
    ("texture_2d<f32>", TypeInfo::new(1, 1, I)),
];

/// Looks up a type token. Whitespace inside the token is ignored.
pub fn lookup(token: &str) -> Option<TypeInfo> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    TYPES
        .iter()
        .find(|(name, _)| *name == compact)
        .map(|(_, info)| *info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_spellings_agree() {
        assert_eq!(lookup("vec3<f32>"), lookup("vec3f"));
        assert_eq!(lookup("vec4< i32 >"), lookup("vec4i"));
        assert_eq!(lookup("vec2u").map(|t| t.bytes()), Some(8));
    }

    #[test]
    fn matrices_split_into_columns() {
        let m = lookup("mat3x2<f32>").unwrap();
        assert_eq!((m.columns, m.components), (3, 2));
        assert_eq!(m.bytes(), 24);
    }

    #[test]
    fn handles_are_single_ints() {
        let t = lookup("texture_2d<f32>").unwrap();
        assert_eq!(t, TypeInfo::new(1, 1, ElementType::Int));
        assert!(lookup("vec5f").is_none());
        assert!(lookup("f64").is_none());
    }
}
