//! Tone mapping and colour adjustment.
//!
//! Tone mapping only runs when it changes the image (non-linear mode or an
//! exposure other than 1). Adjustment always runs and is where the HDR
//! chain ends.

use glam::Vec2;

use super::post_effect;
use crate::renderer::core::{RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;

#[derive(Debug, Default)]
pub struct ToneMapPass;

impl ToneMapPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for ToneMapPass {
    fn name(&self) -> &str {
        "Tone Map Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let settings = &ctx.environment.tone_mapping;
        post_effect(ctx, device, ShaderProgram::Tonemap, |device| {
            device.set_uniform("uTonemapMode", settings.mode().shader_index().into());
            device.set_uniform("uTonemapExposure", settings.exposure().into());
            device.set_uniform("uTonemapWhite", settings.white().into());
        });
    }
}

#[derive(Debug, Default)]
pub struct AdjustmentPass;

impl AdjustmentPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for AdjustmentPass {
    fn name(&self) -> &str {
        "Adjustment Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let adjustment = &ctx.environment.adjustment;
        let (width, height) = ctx.resolution();
        post_effect(ctx, device, ShaderProgram::Adjustment, |device| {
            device.set_uniform("uBrightness", adjustment.brightness.into());
            device.set_uniform("uContrast", adjustment.contrast.into());
            device.set_uniform("uSaturation", adjustment.saturation.into());
            device.set_uniform("uResolution", Vec2::new(width as f32, height as f32).into());
        });
    }
}
