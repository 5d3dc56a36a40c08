//! Host-side mirror of the disk and jet volume sampling in the fragment
//! program. Samples are premultiplied: `xyz` already carries the emission,
//! `w` is the local density used for compositing.

use glam::{Vec2, Vec3, Vec4};

use crate::physics::{self, DISK_INNER, DISK_OUTER, MIN_DENOM};

/// Largest change hover can make to the disk's line-of-sight cosθ.
pub const HOVER_COS_SHIFT: f32 = 0.03;

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn smooth_turb(p: Vec2, t: f32) -> f32 {
    let mut v = 0.0;
    v += (p.x * 1.2 + t * 0.7).sin() * (p.y * 0.9 - t * 0.5).cos() * 0.5;
    v += (p.x * 2.3 - t * 1.1 + p.y * 1.8).sin() * 0.3;
    v += (p.y * 2.7 + t * 0.9 - p.x * 0.6).cos() * 0.25;
    v += (p.x * 4.1 + p.y * 3.2 + t * 1.5).sin() * 0.15;
    v += (p.x * 3.5 - p.y * 4.0 - t * 1.3).cos() * 0.12;
    v += (p.x * 6.0 + t * 2.0).sin() * (p.y * 5.5 - t * 1.8).cos() * 0.08;
    v * 0.5 + 0.5
}

const GRADIENT: [Vec3; 6] = [
    Vec3::new(1.5, 1.5, 1.45),  // white
    Vec3::new(1.4, 1.35, 1.0),  // pale yellow
    Vec3::new(1.3, 1.0, 0.5),   // gold
    Vec3::new(1.2, 0.65, 0.2),  // orange
    Vec3::new(1.0, 0.45, 0.12), // amber
    Vec3::new(0.7, 0.25, 0.08), // red-brown
];

/// Temperature-mapped disk color keyed by a r^(-3/4) profile.
pub fn disk_color(r: f32, temp: f32) -> Vec3 {
    let profile = (DISK_INNER / r.max(DISK_INNER)).powf(0.75);
    let t = (1.0 - profile).clamp(0.0, 1.0);
    let band = ((t / 0.2) as usize).min(GRADIENT.len() - 2);
    let local = (t - band as f32 * 0.2) * 5.0;
    GRADIENT[band].lerp(GRADIENT[band + 1], local) + Vec3::new(0.25, 0.15, 0.05) * temp
}

pub fn hover_cos_shift(hover: f32) -> f32 {
    hover.clamp(0.0, 1.0) * HOVER_COS_SHIFT
}

/// cosθ between the Keplerian orbit direction at `pos` and the direction
/// back toward the observer, including the hover micro-shift.
pub fn line_of_sight_cos(pos: Vec3, vel: Vec3, hover: f32) -> f32 {
    let r = (pos.x * pos.x + pos.z * pos.z).sqrt();
    let orbit_dir = Vec2::new(-pos.z, pos.x) / r.max(MIN_DENOM);
    let los = -Vec2::new(vel.x, vel.z) / vel.length().max(MIN_DENOM);
    orbit_dir.dot(los) + hover_cos_shift(hover)
}

pub fn sample_disk(pos: Vec3, vel: Vec3, time: f32, hover: f32) -> Vec4 {
    let r = (pos.x * pos.x + pos.z * pos.z).sqrt();
    let abs_y = pos.y.abs();
    let thickness = 0.08 + 0.12 * smoothstep(DISK_INNER, DISK_OUTER, r);
    let vertical_density = (-abs_y * abs_y / (thickness * thickness * 2.0)).exp();
    if r < DISK_INNER * 0.9 || r > DISK_OUTER * 1.1 || vertical_density < 0.01 {
        return Vec4::ZERO;
    }
    let radial_density = smoothstep(DISK_INNER * 0.9, DISK_INNER * 1.3, r)
        * (1.0 - smoothstep(DISK_OUTER * 0.6, DISK_OUTER * 1.1, r));

    // flow frame rotates at r^(-3/2)
    let t = time;
    let orbital_phase = t * 8.0 / (r * r.sqrt());
    let (s, c) = orbital_phase.sin_cos();
    let flow_x = pos.x * c - pos.z * s;
    let flow_z = pos.x * s + pos.z * c;

    let turb1 = smooth_turb(Vec2::new(flow_x * 0.8, flow_z * 0.8), t * 1.5);
    let turb2 = smooth_turb(Vec2::new(flow_x * 1.5 + 5.0, flow_z * 1.2 + 3.0), t * 2.0);
    let turb3 = smooth_turb(Vec2::new(flow_x * 0.4, flow_z * 0.5), t * 0.8);
    let turbulence = turb1 * 0.5 + turb2 * 0.3 + turb3 * 0.2;

    let flow1 = (flow_x * 1.5 + flow_z * 0.8 + t * 2.0).sin() * 0.5 + 0.5;
    let flow2 = (flow_x * 0.9 - flow_z * 1.2 - t * 1.5).cos() * 0.5 + 0.5;
    let mut flow_bright = flow1 * 0.4 + flow2 * 0.3 + 0.3;

    let angle = pos.z.atan2(pos.x);
    let spiral_phase = 2.0 * angle - t * 0.8 + 2.5 * r.max(0.1).ln();
    flow_bright *= 1.0 + 0.06 * spiral_phase.cos();

    let radial_bright = (DISK_INNER / r.max(DISK_INNER)).powf(1.5);

    let v_orb = physics::orbital_speed(r);
    let cos_theta = line_of_sight_cos(pos, vel, hover);
    let delta = physics::doppler_factor(v_orb, cos_theta);
    let doppler_bright = (delta * delta * delta).clamp(0.15, 6.0);

    let density = vertical_density * radial_density;
    let brightness = radial_bright * doppler_bright * (0.4 + turbulence * 0.4 + flow_bright * 0.5);
    let mut col = disk_color(r, turbulence * 0.5) * brightness * 3.5;

    let shift = ((delta - 1.0) * 1.5).clamp(-1.0, 1.0);
    if shift > 0.0 {
        col.z = col.z * (1.0 + shift * shift * 3.0) + shift * 0.5;
        col.y *= 1.0 + shift * 1.5;
        col.x *= 1.0 - shift * 0.2;
    } else {
        let red = -shift;
        col.x *= 1.0 + red * 0.8;
        col.y *= 1.0 - red * 0.4;
        col.z *= 1.0 - red * 0.8;
    }

    let grav = physics::gravitational_redshift(r);
    col *= grav;
    let grav_shift = (1.0 - grav) * 3.0;
    col.z *= 1.0 - grav_shift * 0.5;
    col.y *= 1.0 - grav_shift * 0.2;

    col.extend(density)
}

pub fn sample_jet(pos: Vec3, time: f32) -> Vec4 {
    let abs_y = pos.y.abs();
    if !(0.6..=12.0).contains(&abs_y) {
        return Vec4::ZERO;
    }
    let r2 = pos.x * pos.x + pos.z * pos.z;
    let jet_radius = 0.15 + 0.08 * abs_y.sqrt();
    let jr2 = jet_radius * jet_radius;
    let radial_fall = (-r2 / (jr2 * 3.0)).exp();
    if radial_fall < 0.02 {
        return Vec4::ZERO;
    }
    let core = (-r2 / (jr2 * 0.3)).exp();
    let base_fade = smoothstep(0.6, 2.5, abs_y);
    let tip_fade = 1.0 - smoothstep(6.0, 12.0, abs_y);
    let wave1 = (abs_y * 0.8 - time * 4.0).sin() * 0.5 + 0.5;
    let wave2 = (abs_y * 0.4 - time * 2.8).sin() * 0.5 + 0.5;
    let wave = wave1 * 0.7 + wave2 * 0.3;
    let density = radial_fall * base_fade * tip_fade * (0.5 + 0.4 * wave);
    let color = Vec3::new(0.35, 0.25, 0.6).lerp(Vec3::new(0.7, 0.85, 1.0), core * core + wave * 0.2);
    color.extend(density * 0.6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_rejects_points_outside_the_shell() {
        let vel = Vec3::new(0.0, 0.0, -1.0);
        assert_eq!(sample_disk(Vec3::new(1.0, 0.0, 0.0), vel, 0.0, 0.0), Vec4::ZERO);
        assert_eq!(sample_disk(Vec3::new(7.0, 0.0, 0.0), vel, 0.0, 0.0), Vec4::ZERO);
        assert_eq!(sample_disk(Vec3::new(3.0, 1.0, 0.0), vel, 0.0, 0.0), Vec4::ZERO);
        assert!(sample_disk(Vec3::new(3.0, 0.0, 0.0), vel, 0.0, 0.0).w > 0.5);
    }

    #[test]
    fn approaching_side_is_brighter() {
        let pos = Vec3::new(3.0, 0.0, 0.0);
        // orbit at +x heads toward +z; a photon travelling -z came from matter moving at us
        let approaching = sample_disk(pos, Vec3::new(0.0, 0.0, -1.0), 1.0, 0.0);
        let receding = sample_disk(pos, Vec3::new(0.0, 0.0, 1.0), 1.0, 0.0);
        let sum = |v: Vec4| v.x + v.y + v.z;
        assert!(sum(approaching) > sum(receding));
        assert!(approaching.z / approaching.x > receding.z / receding.x);
        assert_eq!(approaching.w, receding.w);
    }

    #[test]
    fn hover_shift_is_monotonic_and_bounded() {
        let pos = Vec3::new(2.5, 0.0, 1.0);
        let vel = Vec3::new(-0.3, -0.1, -0.9);
        let base = line_of_sight_cos(pos, vel, 0.0);
        let mut last = f32::NEG_INFINITY;
        // 0 -> 1 over 0.3 s at 60 Hz
        for frame in 0..=18 {
            let hover = frame as f32 / 18.0;
            let shift = line_of_sight_cos(pos, vel, hover) - base;
            assert!(shift >= last - 1e-6);
            assert!((-HOVER_COS_SHIFT - 1e-6..=HOVER_COS_SHIFT + 1e-6).contains(&shift));
            last = shift;
        }
        assert!((last - HOVER_COS_SHIFT).abs() < 1e-5);
        assert_eq!(hover_cos_shift(4.0), HOVER_COS_SHIFT);
        assert_eq!(hover_cos_shift(-1.0), 0.0);
    }

    #[test]
    fn gradient_runs_hot_to_cool() {
        let inner = disk_color(DISK_INNER, 0.0);
        assert!((inner - GRADIENT[0]).length() < 1e-5);
        let outer = disk_color(DISK_OUTER, 0.0);
        assert!(outer.x / outer.z > inner.x / inner.z);
        let far = disk_color(1.0e6, 0.0);
        assert!((far - GRADIENT[5]).length() < 1e-3);
    }

    #[test]
    fn jet_lives_along_the_axis() {
        assert!(sample_jet(Vec3::new(0.0, 4.0, 0.0), 0.0).w > 0.0);
        assert!(sample_jet(Vec3::new(0.0, -4.0, 0.0), 0.0).w > 0.0);
        assert_eq!(sample_jet(Vec3::new(0.0, 0.3, 0.0), 0.0), Vec4::ZERO);
        assert_eq!(sample_jet(Vec3::new(0.0, 13.0, 0.0), 0.0), Vec4::ZERO);
        assert_eq!(sample_jet(Vec3::new(3.0, 4.0, 0.0), 0.0), Vec4::ZERO);
    }

    #[test]
    fn smoothstep_is_hermite() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }
}
