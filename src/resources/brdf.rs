//! Split-sum BRDF lookup table for image-based lighting.
//!
//! Indexed by `NdotV` (x) and roughness (y); each texel stores the scale and
//! bias applied to `F0`. Integrated once on the CPU at renderer start-up.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use half::f16;

/// Side length of the LUT in texels.
pub const BRDF_LUT_SIZE: u32 = 32;
const BRDF_LUT_SAMPLES: u32 = 64;

/// Scale / bias pairs, row-major, `size * size` entries.
#[must_use]
pub fn generate_brdf_lut(size: u32) -> Vec<Vec2> {
    let mut lut = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = ((x as f32 + 0.5) / size as f32).max(1e-3);
            lut.push(integrate(n_dot_v, roughness));
        }
    }
    lut
}

/// Packs the LUT as `Rg16Float` texel data.
#[must_use]
pub fn pack_rg16f(values: &[Vec2]) -> Vec<u8> {
    let halves: Vec<f16> = values
        .iter()
        .flat_map(|v| [f16::from_f32(v.x), f16::from_f32(v.y)])
        .collect();
    bytemuck::cast_slice(&halves).to_vec()
}

fn integrate(n_dot_v: f32, roughness: f32) -> Vec2 {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let alpha = roughness * roughness;
    let mut acc = Vec2::ZERO;

    for i in 0..BRDF_LUT_SAMPLES {
        let h = importance_sample_ggx(hammersley(i, BRDF_LUT_SAMPLES), alpha);
        let l = 2.0 * v.dot(h) * h - v;

        let n_dot_l = l.z.max(0.0);
        if n_dot_l <= 0.0 {
            continue;
        }
        let n_dot_h = h.z.max(1e-4);
        let v_dot_h = v.dot(h).max(0.0);

        let g = schlick_ggx(n_dot_v, alpha) * schlick_ggx(n_dot_l, alpha);
        let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
        let fc = (1.0 - v_dot_h).powi(5);

        acc += Vec2::new((1.0 - fc) * g_vis, fc * g_vis);
    }

    acc / BRDF_LUT_SAMPLES as f32
}

fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, i.reverse_bits() as f32 * 2.328_306_4e-10)
}

fn importance_sample_ggx(xi: Vec2, alpha: f32) -> Vec3 {
    let a2 = alpha * alpha;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a2 - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

fn schlick_ggx(n_dot: f32, alpha: f32) -> f32 {
    let k = alpha * 0.5;
    n_dot / (n_dot * (1.0 - k) + k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_values_stay_in_unit_range() {
        let lut = generate_brdf_lut(8);
        assert_eq!(lut.len(), 64);
        for v in &lut {
            assert!(v.is_finite() && v.x >= 0.0 && v.y >= 0.0, "{v:?}");
        }
        // Smooth surface seen head-on reflects almost all of F0.
        assert!(lut[7].x > 0.8, "{:?}", lut[7]);
        assert_eq!(pack_rg16f(&[Vec2::ONE]).len(), 4);
    }
}
