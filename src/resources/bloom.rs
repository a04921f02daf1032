//! Bloom Post-Processing Configuration
//!
//! Bloom settings as pure data, following the same pattern as
//! [`ToneMappingSettings`](super::tone_mapping::ToneMappingSettings).
//!
//! The effect progressively downsamples the scene through a mip chain,
//! applying a brightness threshold with a soft knee only on the first level
//! (Karis average), then upsamples with a tent filter while additively
//! blending each level onto the next larger one. The largest mip is finally
//! composited onto the scene with the selected [`BloomMode`].

use glam::{Vec3, Vec4};

/// Smallest side a bloom mip may have.
pub const BLOOM_MIN_MIP_SIZE: u32 = 8;

/// How the blurred highlights are combined with the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BloomMode {
    #[default]
    Disabled,
    /// `mix(scene, bloom, intensity)`
    Mix,
    /// `scene + bloom * intensity`
    Additive,
    /// `scene + bloom * intensity * (1 - scene)`
    Screen,
}

impl BloomMode {
    /// Integer tag uploaded to the composite program.
    #[must_use]
    pub fn shader_index(self) -> i32 {
        self as i32
    }
}

/// Bloom configuration.
///
/// ```rust,ignore
/// let bloom = &mut renderer.environment_mut().bloom;
/// bloom.set_mode(BloomMode::Additive);
/// bloom.set_threshold(0.6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BloomSettings {
    mode: BloomMode,

    /// Contribution of the blurred highlights.
    ///
    /// Default: `0.05`
    intensity: f32,

    /// Upsample tent radius, in texels of the internal resolution.
    ///
    /// Default: `0`
    filter_radius: u32,

    /// Luminance above which pixels bloom.
    ///
    /// Default: `0.0`
    threshold: f32,

    /// Knee softness as a fraction of the threshold, in `[0, 1]`.
    ///
    /// Default: `0.5`
    soft_threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            mode: BloomMode::Disabled,
            intensity: 0.05,
            filter_radius: 0,
            threshold: 0.0,
            soft_threshold: 0.5,
        }
    }
}

impl BloomSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> BloomMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.mode != BloomMode::Disabled
    }

    pub fn set_mode(&mut self, mode: BloomMode) {
        self.mode = mode;
    }

    #[inline]
    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.max(0.0);
    }

    #[inline]
    #[must_use]
    pub fn filter_radius(&self) -> u32 {
        self.filter_radius
    }

    pub fn set_filter_radius(&mut self, radius: u32) {
        self.filter_radius = radius;
    }

    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    #[inline]
    #[must_use]
    pub fn soft_threshold(&self) -> f32 {
        self.soft_threshold
    }

    pub fn set_soft_threshold(&mut self, soft: f32) {
        self.soft_threshold = soft.clamp(0.0, 1.0);
    }

    /// Knee half-width: `threshold * soft_threshold`.
    #[inline]
    #[must_use]
    pub fn knee(&self) -> f32 {
        self.threshold * self.soft_threshold
    }

    /// Prefilter vector uploaded to the first downsample:
    /// `(t, t - k, 2k, 0.25 / (k + 1e-5))`.
    #[must_use]
    pub fn prefilter(&self) -> Vec4 {
        let knee = self.knee();
        Vec4::new(
            self.threshold,
            self.threshold - knee,
            2.0 * knee,
            0.25 / (knee + 1e-5),
        )
    }
}

/// Soft-knee threshold applied to a colour on the first downsample.
///
/// Host-side mirror of the prefilter curve: brightness at or below
/// `threshold - knee` contributes nothing, values inside the knee ramp in
/// quadratically, values above the threshold pass `brightness - threshold`.
#[must_use]
pub fn apply_prefilter(color: Vec3, prefilter: Vec4) -> Vec3 {
    let brightness = color.max_element();
    let mut soft = brightness - prefilter.y;
    soft = soft.clamp(0.0, prefilter.z);
    soft = soft * soft * prefilter.w;
    let contribution = soft.max(brightness - prefilter.x) / brightness.max(1e-5);
    color * contribution.max(0.0)
}

/// Extents of the bloom mip chain for an internal resolution.
///
/// Starts at half resolution and halves until the smaller side would drop
/// below [`BLOOM_MIN_MIP_SIZE`], capped at `floor(log2(min side))` levels.
#[must_use]
pub fn mip_chain_extents(width: u32, height: u32) -> Vec<(u32, u32)> {
    let (w, h) = (width / 2, height / 2);
    let min_dimension = w.min(h);
    if min_dimension == 0 {
        return Vec::new();
    }
    let max_levels = min_dimension.ilog2();

    let mut levels = 0;
    while levels < max_levels && (min_dimension >> levels) >= BLOOM_MIN_MIP_SIZE {
        levels += 1;
    }

    (0..levels).map(|i| ((w >> i).max(1), (h >> i).max(1))).collect()
}
