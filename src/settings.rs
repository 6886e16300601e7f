use crate::surface::{MAX_TESSELLATION, MIN_TESSELLATION, SurfaceSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    Torus,
    Sphere,
    Wave,
}

impl SurfaceKind {
    pub fn next(self) -> Self {
        match self {
            SurfaceKind::Torus => SurfaceKind::Sphere,
            SurfaceKind::Sphere => SurfaceKind::Wave,
            SurfaceKind::Wave => SurfaceKind::Torus,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SurfaceKind::Torus => "torus",
            SurfaceKind::Sphere => "sphere",
            SurfaceKind::Wave => "wave",
        }
    }

    /// Id the vertex shader switches on in GPU-surface mode.
    pub fn shader_id(self) -> u32 {
        match self {
            SurfaceKind::Torus => 0,
            SurfaceKind::Sphere => 1,
            SurfaceKind::Wave => 2,
        }
    }
}

pub const MIN_SHININESS: f32 = 16.0;
pub const MAX_SHININESS: f32 = 128.0;
const SHININESS_STEP: f32 = 16.0;

/// All render state the user can toggle at runtime. Passed explicitly into
/// mesh building and drawing; nothing here is global.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub surface: SurfaceKind,
    pub tessellation: u32,
    pub wireframe: bool,
    pub lighting: bool,
    /// Pure Phong specular instead of the default Blinn-Phong half-vector.
    pub phong_specular: bool,
    pub local_viewer: bool,
    pub directional_light: bool,
    /// Draw the flat grid and let the vertex shader evaluate the surface.
    pub gpu_surface: bool,
    pub animate: bool,
    pub shininess: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            surface: SurfaceKind::Torus,
            tessellation: MIN_TESSELLATION,
            wireframe: false,
            lighting: true,
            phong_specular: false,
            local_viewer: true,
            directional_light: true,
            gpu_surface: false,
            animate: false,
            shininess: 64.0,
        }
    }
}

impl RenderSettings {
    /// The surface to tessellate given the current animation clock. In
    /// GPU-surface mode the CPU only supplies the parameter grid.
    pub fn surface_spec(&self, time: f32) -> SurfaceSpec {
        if self.gpu_surface {
            return SurfaceSpec::Grid;
        }
        match self.surface {
            SurfaceKind::Torus => SurfaceSpec::Torus {
                major: 1.0,
                minor: 0.5,
            },
            SurfaceKind::Sphere => SurfaceSpec::Sphere { radius: 1.0 },
            SurfaceKind::Wave => SurfaceSpec::Wave {
                width: 2.0,
                height: 2.0,
                time,
            },
        }
    }

    /// Returns true when the level changed (callers regenerate on change).
    pub fn raise_tessellation(&mut self) -> bool {
        if self.tessellation < MAX_TESSELLATION {
            self.tessellation += 1;
            true
        } else {
            false
        }
    }

    pub fn lower_tessellation(&mut self) -> bool {
        if self.tessellation > MIN_TESSELLATION {
            self.tessellation -= 1;
            true
        } else {
            false
        }
    }

    pub fn raise_shininess(&mut self) {
        self.shininess = (self.shininess + SHININESS_STEP).min(MAX_SHININESS);
    }

    pub fn lower_shininess(&mut self) {
        self.shininess = (self.shininess - SHININESS_STEP).max(MIN_SHININESS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tessellation_clamps_at_both_ends() {
        let mut s = RenderSettings {
            tessellation: MIN_TESSELLATION,
            ..Default::default()
        };
        assert!(!s.lower_tessellation());
        assert_eq!(s.tessellation, MIN_TESSELLATION);

        assert!(s.raise_tessellation());
        assert_eq!(s.tessellation, MIN_TESSELLATION + 1);

        s.tessellation = MAX_TESSELLATION;
        assert!(!s.raise_tessellation());
        assert_eq!(s.tessellation, MAX_TESSELLATION);
    }

    #[test]
    fn surface_cycle_visits_every_kind() {
        let start = SurfaceKind::Torus;
        let mut kind = start;
        let mut seen = vec![kind];
        loop {
            kind = kind.next();
            if kind == start {
                break;
            }
            seen.push(kind);
        }
        assert_eq!(
            seen,
            vec![SurfaceKind::Torus, SurfaceKind::Sphere, SurfaceKind::Wave]
        );
    }

    #[test]
    fn gpu_surface_mode_tessellates_the_grid() {
        let mut s = RenderSettings {
            gpu_surface: true,
            ..Default::default()
        };
        assert_eq!(s.surface_spec(1.0), SurfaceSpec::Grid);

        s.gpu_surface = false;
        s.surface = SurfaceKind::Wave;
        assert_eq!(
            s.surface_spec(1.5),
            SurfaceSpec::Wave {
                width: 2.0,
                height: 2.0,
                time: 1.5
            }
        );
    }

    #[test]
    fn shininess_steps_and_clamps() {
        let mut s = RenderSettings {
            shininess: MAX_SHININESS - SHININESS_STEP,
            ..Default::default()
        };
        s.raise_shininess();
        assert_eq!(s.shininess, MAX_SHININESS);
        s.raise_shininess();
        assert_eq!(s.shininess, MAX_SHININESS);

        s.shininess = MIN_SHININESS;
        s.lower_shininess();
        assert_eq!(s.shininess, MIN_SHININESS);
    }
}
