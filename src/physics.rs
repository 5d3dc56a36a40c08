//! Scene constants shared by the fragment program and the CPU reference.
//!
//! Units are scene units: the Schwarzschild radius is 0.6, so the camera at
//! zoom 1 sits a little over 18 RS from the hole.

/// Schwarzschild radius. Rays closer than this are captured.
pub const RS: f32 = 0.6;
/// Mass parameter, RS = 2M.
pub const M: f32 = RS * 0.5;
/// Critical impact parameter b_c = 3√3 M; the photon ring sits here.
pub const CRITICAL_B: f32 = 3.0 * 1.732_050_8 * M;
/// Innermost stable circular orbit, 6M.
pub const ISCO: f32 = 6.0 * M;
pub const DISK_INNER: f32 = ISCO * 1.05;
pub const DISK_OUTER: f32 = 6.0;
/// Fixed camera elevation above the disk plane, radians.
pub const INCLINATION: f32 = 0.1045;
pub const ESCAPE_RADIUS: f32 = 30.0;

/// Camera distance at zoom 1.
pub const CAMERA_DISTANCE: f32 = 11.0;
/// Orbit angular speed of the camera, radians per second.
pub const ORBIT_RATE: f32 = 0.25;

/// Lower bound for every denominator inside the integration loop.
pub const MIN_DENOM: f32 = 0.001;

/// Gravitational redshift factor √(1 − RS/r), floored so it never reaches zero.
pub fn gravitational_redshift(r: f32) -> f32 {
    (1.0 - RS / r.max(RS * 1.01)).max(0.01).sqrt()
}

/// Relativistic Doppler factor δ = 1 / [γ(1 − v·cosθ)] with γ the Lorentz factor.
pub fn doppler_factor(v: f32, cos_theta: f32) -> f32 {
    let gamma = 1.0 / (1.0 - v * v).max(0.01).sqrt();
    1.0 / (gamma * (1.0 - v * cos_theta)).max(0.1)
}

/// Keplerian orbital speed √(M/r), capped below 0.7c.
pub fn orbital_speed(r: f32) -> f32 {
    (M / r.max(DISK_INNER)).sqrt().min(0.7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_radii_are_ordered() {
        assert!((M - 0.3).abs() < 1e-6);
        assert!((CRITICAL_B - 1.558_845_7).abs() < 1e-4);
        assert!(RS < CRITICAL_B);
        assert!(CRITICAL_B < ISCO);
        assert!(ISCO < DISK_INNER);
        assert!(DISK_INNER < DISK_OUTER);
        assert!(DISK_OUTER < ESCAPE_RADIUS);
    }

    #[test]
    fn redshift_stays_in_unit_interval() {
        assert!(gravitational_redshift(0.0) > 0.0);
        assert!(gravitational_redshift(RS) < gravitational_redshift(DISK_INNER));
        assert!(gravitational_redshift(1.0e6) <= 1.0);
    }

    #[test]
    fn doppler_brightens_approaching_matter() {
        let v = orbital_speed(DISK_INNER);
        assert!(doppler_factor(v, 1.0) > 1.0);
        assert!(doppler_factor(v, -1.0) < 1.0);
        assert!(doppler_factor(v, 0.0) <= 1.0);
    }
}
