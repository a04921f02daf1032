//! Environment settings: background, ambient lighting, sky and effects.
//!
//! All fields are plain data read by the passes each frame. Effects that own
//! GPU resources (SSAO, bloom) get their targets allocated when `end()` first
//! sees them enabled and released once they are turned off.

use glam::{Quat, Vec3};

use super::bloom::BloomSettings;
use super::fog::FogSettings;
use super::ssao::SsaoSettings;
use super::tone_mapping::{ColorAdjustment, ToneMappingSettings};
use crate::renderer::core::TextureId;

/// Precomputed sky textures used for the background and image-based lighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Skybox {
    pub cubemap: TextureId,
    /// Diffuse irradiance convolution of `cubemap`.
    pub irradiance: TextureId,
    /// Roughness-prefiltered specular mips of `cubemap`.
    pub prefilter: TextureId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Clear colour where nothing is drawn and no sky is set.
    pub background_color: Vec3,
    /// Flat ambient light used when no sky is set.
    pub ambient_color: Vec3,

    pub sky: Option<Skybox>,
    pub sky_rotation: Quat,
    pub ibl_diffuse: f32,
    pub ibl_specular: f32,

    pub ssao: SsaoSettings,
    pub bloom: BloomSettings,
    pub fog: FogSettings,
    pub tone_mapping: ToneMappingSettings,
    pub adjustment: ColorAdjustment,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            background_color: Vec3::splat(0.2),
            ambient_color: Vec3::splat(0.2),
            sky: None,
            sky_rotation: Quat::IDENTITY,
            ibl_diffuse: 1.0,
            ibl_specular: 1.0,
            ssao: SsaoSettings::default(),
            bloom: BloomSettings::default(),
            fog: FogSettings::default(),
            tone_mapping: ToneMappingSettings::default(),
            adjustment: ColorAdjustment::default(),
        }
    }
}
