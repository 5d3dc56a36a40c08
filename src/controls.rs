/// The four scalars the host pushes every frame. The renderer keeps only the
/// latest snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlState {
    pub camera_zoom: f32,
    pub view_yaw: f32,
    pub view_pitch: f32,
    pub hover_intensity: f32,
}

/// Zoom floor; the camera distance is 11 / zoom.
pub const MIN_ZOOM: f32 = 0.01;

impl Default for ControlState {
    fn default() -> Self {
        Self {
            camera_zoom: 1.0,
            view_yaw: 0.0,
            view_pitch: 0.0,
            hover_intensity: 0.0,
        }
    }
}

impl ControlState {
    pub fn new(camera_zoom: f32, view_yaw: f32, view_pitch: f32, hover_intensity: f32) -> Self {
        Self { camera_zoom, view_yaw, view_pitch, hover_intensity }
    }

    /// Replaces non-finite values with their defaults and applies the
    /// numeric-safety clamps. Ranges are not otherwise validated.
    pub fn sanitized(self) -> Self {
        let fallback = Self::default();
        let finite_or = |v: f32, d: f32| if v.is_finite() { v } else { d };
        Self {
            camera_zoom: finite_or(self.camera_zoom, fallback.camera_zoom).max(MIN_ZOOM),
            view_yaw: finite_or(self.view_yaw, fallback.view_yaw),
            view_pitch: finite_or(self.view_pitch, fallback.view_pitch),
            hover_intensity: finite_or(self.hover_intensity, fallback.hover_intensity).clamp(0.0, 1.0),
        }
    }
}

/// Everything one draw consumes. Built once per drawn frame so the values
/// pushed and the values drawn cannot diverge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub time: f32,
    pub resolution: [f32; 2],
    pub controls: ControlState,
}

impl FrameUniforms {
    pub fn new(time: f32, resolution: [f32; 2], controls: ControlState) -> Self {
        Self { time, resolution, controls: controls.sanitized() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_fall_back() {
        let c = ControlState::new(f32::NAN, f32::INFINITY, f32::NEG_INFINITY, f32::NAN).sanitized();
        assert_eq!(c, ControlState::default());
    }

    #[test]
    fn zoom_and_hover_are_clamped() {
        let c = ControlState::new(0.0, 0.05, -0.05, 3.0).sanitized();
        assert_eq!(c.camera_zoom, MIN_ZOOM);
        assert_eq!(c.hover_intensity, 1.0);
        assert_eq!(c.view_yaw, 0.05);
        assert_eq!(c.view_pitch, -0.05);
    }

    #[test]
    fn frame_uniforms_are_sanitized() {
        let f = FrameUniforms::new(1.5, [640.0, 480.0], ControlState::new(f32::NAN, 0.0, 0.0, 2.0));
        assert_eq!(f.controls.camera_zoom, 1.0);
        assert_eq!(f.controls.hover_intensity, 1.0);
        assert_eq!(f.resolution, [640.0, 480.0]);
    }

    #[test]
    fn approach_range_passes_through() {
        let c = ControlState::new(12.0, 0.1, -0.1, 0.5).sanitized();
        assert_eq!(c, ControlState::new(12.0, 0.1, -0.1, 0.5));
    }
}
