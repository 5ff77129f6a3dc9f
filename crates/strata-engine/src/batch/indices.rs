/// Index list for `quads` quads stored as consecutive groups of four corners.
///
/// Quad `i` (first vertex `4i`) becomes triangles `(4i+3, 4i+2, 4i)` and
/// `(4i, 4i+2, 4i+1)`.
pub fn quad_indices(quads: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(quads * 6);
    for i in 0..quads as u32 {
        let o = i * 4;
        out.extend_from_slice(&[o + 3, o + 2, o, o, o + 2, o + 1]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_order_for_two_quads() {
        assert_eq!(
            quad_indices(2),
            vec![3, 2, 0, 0, 2, 1, 7, 6, 4, 4, 6, 5]
        );
    }

    #[test]
    fn every_triangle_stays_inside_its_quad() {
        let n = 37;
        let indices = quad_indices(n);
        assert_eq!(indices.len(), 6 * n);
        for (t, tri) in indices.chunks_exact(3).enumerate() {
            let base = (t / 2) as u32 * 4;
            assert!(tri.iter().all(|&i| (base..=base + 3).contains(&i)));
        }
    }

    #[test]
    fn zero_quads() {
        assert!(quad_indices(0).is_empty());
    }
}
