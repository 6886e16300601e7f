use glam::{Mat4, Vec2, Vec3, Vec4};

/// Orbit camera around the origin: heading/pitch in radians plus a zoom
/// distance. Left-drag rotates, right-drag or the wheel zooms.
pub struct Camera {
    pub heading: f32,
    pub pitch: f32,
    pub distance: f32,

    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    pub rotate_sensitivity: f32,
    pub zoom_sensitivity: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            heading: 0.0,
            pitch: 0.0,
            distance: 5.0,

            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,

            rotate_sensitivity: 0.3_f32.to_radians(),
            zoom_sensitivity: 0.03,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance))
            * Mat4::from_rotation_x(-self.pitch)
            * Mat4::from_rotation_y(-self.heading)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space eye position, needed for local-viewer specular.
    pub fn eye_position(&self) -> Vec3 {
        (self.view_matrix().inverse() * Vec4::new(0.0, 0.0, 0.0, 1.0)).truncate()
    }

    pub fn process_drag(&mut self, delta: Vec2) {
        self.heading -= delta.x * self.rotate_sensitivity;
        self.pitch -= delta.y * self.rotate_sensitivity;

        let max_pitch = 89.0_f32.to_radians();
        self.pitch = self.pitch.clamp(-max_pitch, max_pitch);
    }

    pub fn process_zoom(&mut self, delta: f32) {
        self.distance =
            (self.distance - delta * self.zoom_sensitivity * self.distance).clamp(0.5, 50.0);
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_pos: camera.eye_position().to_array(),
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_stays_at_zoom_distance() {
        let cam = Camera {
            heading: 1.2,
            pitch: 0.4,
            distance: 7.0,
            ..Default::default()
        };
        assert!((cam.eye_position().length() - 7.0).abs() < 1e-4);
    }

    #[test]
    fn zoom_clamps_to_sane_range() {
        let mut cam = Camera::default();
        for _ in 0..1000 {
            cam.process_zoom(10.0);
        }
        assert!(cam.distance >= 0.5);
        for _ in 0..1000 {
            cam.process_zoom(-10.0);
        }
        assert!(cam.distance <= 50.0);
    }

    #[test]
    fn pitch_clamps_short_of_the_poles() {
        let mut cam = Camera::default();
        cam.process_drag(Vec2::new(0.0, -10_000.0));
        assert!(cam.pitch <= 89.0_f32.to_radians() + 1e-6);
    }
}
