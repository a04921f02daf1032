//! SSAO (Screen Space Ambient Occlusion) Configuration
//!
//! Pure data settings for the half-resolution occlusion pass, plus the
//! deterministic generators for its sample kernel and rotation noise.
//!
//! # Algorithm
//!
//! 1. A hemisphere kernel of [`SSAO_KERNEL_SIZE`] samples, concentrated near
//!    the origin with a quadratic fall-off
//! 2. A 4×4 tiled rotation noise texture that randomizes the kernel per pixel
//! 3. A separable blur run `iterations` times, alternating horizontal and
//!    vertical directions through a ping-pong pair

use glam::{Vec3, Vec4};
use half::f16;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// Number of kernel samples uploaded to the SSAO program.
pub const SSAO_KERNEL_SIZE: usize = 32;

/// Side of the tiled rotation noise texture.
pub const SSAO_NOISE_SIZE: u32 = 4;

// ============================================================================
// SsaoSettings
// ============================================================================

/// Screen-space ambient occlusion configuration.
///
/// ```rust,ignore
/// renderer.environment_mut().ssao.set_enabled(true);
/// renderer.environment_mut().ssao.set_radius(0.75);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SsaoSettings {
    /// Whether SSAO is computed before the ambient pass.
    pub enabled: bool,

    /// Sampling radius in view-space units.
    ///
    /// Default: `0.5`
    radius: f32,

    /// Depth bias preventing self-occlusion.
    ///
    /// Default: `0.025`
    bias: f32,

    /// Number of separable blur passes.
    ///
    /// Default: `10`
    iterations: u32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 0.5,
            bias: 0.025,
            iterations: 10,
        }
    }
}

impl SsaoSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Sets the sampling radius (clamped to a small positive minimum).
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.01);
    }

    #[inline]
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias.max(0.0);
    }

    #[inline]
    #[must_use]
    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Sets the number of blur passes. Zero leaves the raw occlusion.
    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations;
    }

    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

// ============================================================================
// Kernel & Noise Generation
// ============================================================================

/// Generates the hemisphere sample kernel.
///
/// Uses a fixed seed so the kernel is identical across runs. Sample `i` is
/// scaled by `lerp(0.1, 1.0, (i / n)^2)`.
#[must_use]
pub fn generate_ssao_kernel(samples: usize) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut kernel = Vec::with_capacity(samples);

    for i in 0..samples {
        let mut sample = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(0.01..1.0),
        )
        .normalize();

        sample *= rng.random_range(0.0..1.0f32);

        let scale = i as f32 / samples as f32;
        sample *= lerp(0.1, 1.0, scale * scale);

        kernel.push(sample.extend(0.0));
    }
    kernel
}

/// Generates the 4×4 rotation noise (XY random unit vector, Z = 0).
#[must_use]
pub fn generate_ssao_noise() -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..SSAO_NOISE_SIZE * SSAO_NOISE_SIZE)
        .map(|_| {
            Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                0.0,
            )
            .normalize()
            .extend(0.0)
        })
        .collect()
}

/// Packs vectors as `Rgba16Float` texel data.
#[must_use]
pub fn pack_rgba16f(values: &[Vec4]) -> Vec<u8> {
    let halves: Vec<f16> = values
        .iter()
        .flat_map(|v| v.to_array().map(f16::from_f32))
        .collect();
    bytemuck::cast_slice(&halves).to_vec()
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + f * (b - a)
}
