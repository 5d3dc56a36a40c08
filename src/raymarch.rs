//! Host-side reference of the per-pixel raymarcher in the fragment program.
//!
//! The GPU path never calls into this module; it exists so the offline
//! renderer can produce the same image on the CPU and so the loop's
//! termination and compositing rules can be exercised in tests.

use glam::{Vec2, Vec3};

use crate::camera::{pixel_uv, Camera};
use crate::controls::FrameUniforms;
use crate::look::LookControls;
use crate::physics::{CRITICAL_B, ESCAPE_RADIUS, MIN_DENOM, RS};
use crate::quality::QualitySettings;
use crate::volume::{sample_disk, sample_jet, smoothstep};

const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// How a ray's integration ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RayOutcome {
    /// Crossed the horizon; opacity forced to 1.
    Captured,
    /// Reached the escape radius and picked up the star field.
    Escaped,
    /// Opacity passed 0.95.
    Saturated,
    /// Ran out of steps.
    Exhausted,
}

/// Ray state after a completed step, handed to the observer.
#[derive(Clone, Copy, Debug)]
pub struct RayState {
    pub step: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Vec3,
    pub alpha: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct RayResult {
    pub outcome: RayOutcome,
    pub steps: u32,
    pub color: Vec3,
    pub alpha: f32,
    /// Star-field term; zero unless the ray escaped.
    pub star: f32,
    pub final_radius: f32,
}

/// Per-frame inputs of the integration loop.
#[derive(Clone, Copy, Debug)]
pub struct MarchParams {
    pub max_steps: u32,
    pub adaptive_step: f32,
    pub jet_enabled: bool,
    pub ring_gain: f32,
    pub ring_spread: f32,
    pub time: f32,
    pub hover: f32,
}

impl MarchParams {
    pub fn new(settings: &QualitySettings, look: &LookControls, time: f32, hover: f32) -> Self {
        Self {
            max_steps: settings.max_steps.max(1),
            adaptive_step: settings.adaptive_step,
            jet_enabled: settings.jet_enabled,
            ring_gain: look.ring_gain(),
            ring_spread: look.ring_spread(),
            time,
            hover: hover.clamp(0.0, 1.0),
        }
    }

    /// Slow 0..1 breathing shared by the photon ring and the lensing arcs.
    pub fn portal_cycle(&self) -> f32 {
        (self.time * 0.4).sin() * 0.5 + 0.5
    }

    /// Largest distance a single step can cover.
    pub fn max_step_size(&self) -> f32 {
        self.adaptive_step + 0.06
    }
}

pub fn hash(p: Vec2) -> f32 {
    let mut p3 = Vec3::new(p.x, p.y, p.x) * 0.1031;
    p3 -= p3.floor();
    p3 += Vec3::splat(p3.dot(Vec3::new(p3.y, p3.z, p3.x) + 33.33));
    let v = (p3.x + p3.y) * p3.z;
    v - v.floor()
}

fn star_field(dir: Vec3) -> f32 {
    hash(Vec2::new(dir.x * 400.0 + dir.y * 200.0, dir.z * 300.0)).powf(35.0) * 0.3
}

/// Integrates one ray front to back. `observer` sees the state after every
/// completed step; terminal steps (capture, escape) are reported only in the
/// result.
pub fn march(
    origin: Vec3,
    dir: Vec3,
    params: &MarchParams,
    mut observer: impl FnMut(&RayState),
) -> RayResult {
    let mut pos = origin;
    let mut vel = dir;
    let mut color = Vec3::ZERO;
    let mut alpha = 0.0_f32;
    let mut step_size = params.adaptive_step;

    let portal_cycle = params.portal_cycle();
    let portal_intensity = 0.85 + 0.25 * portal_cycle;
    let ring_color = Vec3::new(1.15, 1.05, 0.95).lerp(Vec3::new(1.1, 1.15, 1.25), portal_cycle * 0.3);
    let t = params.time;

    let finish = |outcome, steps, color, alpha, star, pos: Vec3| RayResult {
        outcome,
        steps,
        color,
        alpha,
        star,
        final_radius: pos.length(),
    };

    for i in 0..params.max_steps {
        let r = pos.length();
        if r < RS {
            return finish(RayOutcome::Captured, i, color * alpha, 1.0, 0.0, pos);
        }
        if r >= ESCAPE_RADIUS {
            let star = star_field(dir);
            color += Vec3::splat(star) * (1.0 - alpha);
            return finish(RayOutcome::Escaped, i, color, alpha, star, pos);
        }

        // bend toward the mass: 1.5 RS h^2 / r^4
        let h = pos.cross(vel);
        let r_inv = 1.0 / r.max(MIN_DENOM);
        let accel = 1.5 * RS * h.dot(h) * r_inv * r_inv * r_inv * r_inv;
        vel -= pos * r_inv * accel * step_size;
        vel /= vel.length().max(MIN_DENOM);

        step_size = params.adaptive_step + 0.06 * smoothstep(RS * 2.0, RS * 8.0, r);

        let disk = sample_disk(pos, vel, t, params.hover);
        if disk.w > 0.01 {
            let contribution = disk.w * step_size * 8.0 * (1.0 - alpha);
            color += disk.truncate() * contribution;
            alpha += contribution * 0.5;
        }

        if params.jet_enabled {
            let jet = sample_jet(pos, t);
            if jet.w > 0.01 {
                let a = jet.w * 0.008 * (1.0 - alpha);
                color += jet.truncate() * a;
                alpha += a * 0.2;
            }
        }

        let pr_dist = (r - CRITICAL_B).abs();
        let primary_ring = (-pr_dist * pr_dist * 200.0 / params.ring_spread).exp();
        let pr2_dist = (r - CRITICAL_B * 0.95).abs();
        let secondary_ring = (-pr2_dist * pr2_dist * 400.0 / params.ring_spread).exp() * 0.4;
        let shimmer = 1.0 + 0.025 * (t * 2.5 + r * 6.0).sin();
        let pulse = 0.7 + 0.3 * (t * 3.0 + pos.z.atan2(pos.x) * 3.0).sin();
        let hover_boost = 1.0 + params.hover * 0.3;
        let glow = (primary_ring + secondary_ring) * 0.4 * pulse * shimmer * portal_intensity
            * hover_boost
            * params.ring_gain
            * (1.0 - alpha);
        let chromatic = primary_ring * 0.02;
        let mut ring = ring_color * glow;
        ring.x *= 1.0 + chromatic;
        ring.z *= 1.0 - chromatic;
        color += ring;

        pos += vel * step_size;
        alpha = alpha.min(1.0);

        observer(&RayState { step: i, position: pos, velocity: vel, color, alpha });

        if alpha > 0.95 {
            return finish(RayOutcome::Saturated, i + 1, color, alpha, 0.0, pos);
        }
    }

    finish(RayOutcome::Exhausted, params.max_steps, color, alpha, 0.0, pos)
}

/// Einstein ring and the mirrored secondary arc, evaluated at the straight
/// line's closest approach to the origin.
pub fn lensing(origin: Vec3, dir: Vec3, alpha: f32, portal_cycle: f32, hover: f32) -> Vec3 {
    let closest = -origin.dot(dir);
    if closest <= 0.0 {
        return Vec3::ZERO;
    }
    let cp = origin + dir * closest;
    let closest_r = cp.length();
    let arc_intensity = 0.8 + 0.3 * portal_cycle;

    let er_dist = closest_r - RS * 2.6;
    let einstein = (-er_dist * er_dist * 80.0).exp();
    let mut color = Vec3::new(1.0, 0.88, 0.65) * einstein * 0.35 * arc_intensity * (1.0 - alpha * 0.7);

    let arc_dist = (closest_r - RS * 3.5).abs();
    let arc = (-arc_dist * arc_dist * 45.0).exp() * 0.25 * arc_intensity * (1.0 + hover * 0.2);
    let upper = smoothstep(-0.5, 0.5, cp.y) * 0.6;
    let lower = (1.0 - smoothstep(-0.5, 0.5, cp.y)) * 0.6;
    color += Vec3::new(1.05, 0.72, 0.38) * arc * (upper + lower) * (1.0 - alpha * 0.8);
    color
}

/// Dark ring at the ISCO's screen-space radius.
pub fn isco_gap(color: Vec3, uv: Vec2) -> Vec3 {
    let gap = (uv.length() - 0.08).abs();
    color * (1.0 - (-gap * gap * 800.0).exp() * 0.15)
}

pub fn aces(x: Vec3) -> Vec3 {
    (x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)
}

/// Linear radiance to display color: bloom, exposure, highlight shoulder,
/// ACES, gamma and vignette.
pub fn tone_map(mut color: Vec3, look: &LookControls, bloom: bool, uv: Vec2) -> Vec3 {
    if bloom {
        let lum = color.dot(LUMA);
        color += color * smoothstep(0.6, 2.0, lum) * 0.2;
    }

    color *= look.exposure;
    let knee = look.highlight_knee;
    let lum = color.dot(LUMA);
    if lum > knee {
        let over = lum - knee;
        color *= (knee + over / (1.0 + over)) / lum;
    }

    let mapped = aces(color).clamp(Vec3::ZERO, Vec3::ONE);
    let gamma = look.inverse_gamma();
    let graded = Vec3::new(mapped.x.powf(gamma), mapped.y.powf(gamma), mapped.z.powf(gamma));
    graded * (0.92 + 0.08 * (1.0 - smoothstep(0.5, 1.4, uv.length())))
}

/// Full fragment evaluation for one pixel. `frag_coord` has its origin at
/// the bottom-left corner, pixel centers at +0.5.
pub fn shade_pixel(
    frag_coord: Vec2,
    frame: &FrameUniforms,
    settings: &QualitySettings,
    look: &LookControls,
) -> Vec3 {
    let resolution = Vec2::from(frame.resolution);
    let uv = pixel_uv(frag_coord, resolution);
    let controls = frame.controls.sanitized();
    let camera = Camera::orbit(&controls, frame.time);
    let rd = camera.ray(uv);

    let params = MarchParams::new(settings, look, frame.time, controls.hover_intensity);
    let result = march(camera.position, rd, &params, |_| {});

    let color = result.color
        + lensing(camera.position, rd, result.alpha, params.portal_cycle(), params.hover);
    tone_map(isco_gap(color, uv), look, settings.bloom_enabled, uv)
}
