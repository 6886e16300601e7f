use super::spec::{SurfaceSpec, Vertex};

/// Host-side mesh ready for upload: interleaved vertices plus one triangle
/// strip covering the whole grid.
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// User-facing tessellation level. Each +1 doubles the subdivisions per side.
pub const MIN_TESSELLATION: u32 = 2;
pub const MAX_TESSELLATION: u32 = 10;

/// Grid resolution per side for a tessellation level: `2^level + 1` sample
/// points, so level steps double or halve the detail.
pub fn grid_resolution(level: u32) -> usize {
    (1usize << level) + 1
}

/// Exact number of strip indices for an `x` by `y` vertex grid: per row pair,
/// one leading and one trailing degenerate index around `2x` real ones.
pub fn strip_index_count(x: usize, y: usize) -> usize {
    (y - 1) * (2 * x + 2)
}

/// Samples `surface` over a regular `x` by `y` grid and builds a single
/// stitched triangle strip. `(i, j)` is flattened row-major as `i*y + j`.
///
/// The degenerate indices at each row boundary produce zero-area triangles
/// that let one strip, and therefore one draw call, cover every row.
pub fn tessellate(surface: &SurfaceSpec, x: usize, y: usize) -> MeshData {
    assert!(x >= 2 && y >= 2, "grid must be at least 2x2, got {x}x{y}");

    let index = |i: usize, j: usize| (i * y + j) as u32;

    let mut vertices = Vec::with_capacity(x * y);
    for i in 0..x {
        let u = i as f32 / (x - 1) as f32;
        for j in 0..y {
            let v = j as f32 / (y - 1) as f32;
            vertices.push(surface.vertex_at(u, v));
        }
    }

    let mut indices = Vec::with_capacity(strip_index_count(x, y));
    for j in 0..y - 1 {
        indices.push(index(0, j));
        for i in 0..x {
            indices.push(index(i, j));
            indices.push(index(i, j + 1));
        }
        indices.push(index(x - 1, j + 1));
    }

    debug_assert_eq!(indices.len(), strip_index_count(x, y));
    MeshData { vertices, indices }
}
