use glam::{Vec2, Vec3};

use crate::controls::{ControlState, MIN_ZOOM};
use crate::physics::{CAMERA_DISTANCE, INCLINATION, MIN_DENOM, ORBIT_RATE};

/// Slowly orbiting observer, tilted by the disk inclination. Mirrors the
/// camera setup at the top of the fragment program.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn orbit(controls: &ControlState, time: f32) -> Self {
        let distance = Self::distance(controls.camera_zoom);
        let orbit_angle = time * ORBIT_RATE + controls.view_yaw;
        let (s_i, c_i) = INCLINATION.sin_cos();
        let (s_o, c_o) = orbit_angle.sin_cos();
        let position = Vec3::new(
            s_o * c_i * distance,
            s_i * distance + controls.view_pitch * distance * 0.5,
            c_o * c_i * distance,
        );

        let forward = -position / distance;
        let right = Vec3::new(c_o, 0.0, -s_o);
        let up = right.cross(forward);
        let up = up / up.length().max(MIN_DENOM);
        Self { position, forward, right, up }
    }

    /// Distance from the origin for a given zoom; zoom is floored first.
    pub fn distance(zoom: f32) -> f32 {
        CAMERA_DISTANCE / zoom.max(MIN_ZOOM)
    }

    /// Unit direction through normalized screen coordinate `uv`.
    pub fn ray(&self, uv: Vec2) -> Vec3 {
        let rd = self.forward + uv.x * self.right + uv.y * self.up;
        rd / rd.length().max(MIN_DENOM)
    }
}

/// Normalized screen coordinate, short side spanning [-0.5, 0.5].
pub fn pixel_uv(frag_coord: Vec2, resolution: Vec2) -> Vec2 {
    (frag_coord - 0.5 * resolution) / resolution.min_element().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_sits_at_eleven() {
        let cam = Camera::orbit(&ControlState::default(), 0.0);
        assert!((cam.position.length() - 11.0).abs() < 1e-4);
        assert!((cam.forward.length() - 1.0).abs() < 1e-5);
        assert!(cam.position.y > 0.0);
    }

    #[test]
    fn zoom_pulls_camera_in() {
        let near = ControlState { camera_zoom: 4.0, ..Default::default() };
        assert!((Camera::orbit(&near, 0.0).position.length() - 2.75).abs() < 1e-4);
        assert_eq!(Camera::distance(0.0), CAMERA_DISTANCE / MIN_ZOOM);
    }

    #[test]
    fn center_ray_points_at_origin() {
        let cam = Camera::orbit(&ControlState::default(), 3.0);
        let rd = cam.ray(Vec2::ZERO);
        assert!((rd - cam.forward).length() < 1e-5);
        assert!(cam.right.dot(cam.forward).abs() < 1e-5);
        assert!(cam.up.dot(cam.forward).abs() < 1e-5);
    }

    #[test]
    fn uv_is_centered_on_short_side() {
        let res = Vec2::new(200.0, 100.0);
        assert_eq!(pixel_uv(Vec2::new(100.0, 50.0), res), Vec2::ZERO);
        assert_eq!(pixel_uv(Vec2::new(100.0, 100.0), res), Vec2::new(0.0, 0.5));
        assert!(pixel_uv(Vec2::new(1.0, 1.0), Vec2::ZERO).is_finite());
    }
}
