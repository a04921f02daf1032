//! Render Stage Definitions
//!
//! `RenderStage` fixes the order in which the frame's nodes run. Nodes
//! registered in the same stage keep their insertion order.

/// Render stage enumeration.
///
/// | Stage | Purpose |
/// |-------|---------|
/// | `ShadowMap` | Depth of shadow-casting lights |
/// | `Geometry` | Deferred G-buffer fill |
/// | `Lighting` | SSAO, ambient and per-light accumulation |
/// | `Background` | Sky or clear colour, deferred composite |
/// | `Forward` | Depth prepass and blended draws |
/// | `PostProcess` | Bloom, fog, tone mapping, adjustment, FXAA |
/// | `Output` | Final blit and state reset |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(u8)]
pub enum RenderStage {
    ShadowMap = 0,
    Geometry = 1,
    Lighting = 2,
    Background = 3,
    Forward = 4,
    PostProcess = 5,
    Output = 6,
}

impl RenderStage {
    /// Numeric index of the stage (used for sorting).
    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ShadowMap => "ShadowMap",
            Self::Geometry => "Geometry",
            Self::Lighting => "Lighting",
            Self::Background => "Background",
            Self::Forward => "Forward",
            Self::PostProcess => "PostProcess",
            Self::Output => "Output",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(RenderStage::ShadowMap < RenderStage::Geometry);
        assert!(RenderStage::Geometry < RenderStage::Lighting);
        assert!(RenderStage::Lighting < RenderStage::Background);
        assert!(RenderStage::Background < RenderStage::Forward);
        assert!(RenderStage::Forward < RenderStage::PostProcess);
        assert!(RenderStage::PostProcess < RenderStage::Output);
    }
}
