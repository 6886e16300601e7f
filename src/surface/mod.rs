pub mod spec;
pub mod tessellate;

pub use spec::{SurfaceSpec, Vertex};
pub use tessellate::{
    MAX_TESSELLATION, MIN_TESSELLATION, MeshData, grid_resolution, strip_index_count, tessellate,
};
