//! Material snapshot submitted with each draw call.
//!
//! Materials are plain values. A draw call copies the material at
//! submission time, so editing the caller's material afterwards does not
//! affect a frame that is already queued.

use glam::{Vec3, Vec4};

use crate::renderer::core::TextureId;

/// How a surface is composited with what is behind it.
///
/// Any mode other than [`BlendMode::Opaque`] routes the draw call through the
/// forward path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// `src * a + dst * (1 - a)`
    Alpha,
    /// `src * a + dst`
    Additive,
    /// `src * dst`
    Multiply,
}

impl BlendMode {
    /// Fixed-function blend state for this mode.
    #[must_use]
    pub fn blend_state(self) -> Option<wgpu::BlendState> {
        use wgpu::{BlendComponent, BlendFactor, BlendOperation, BlendState};
        match self {
            Self::Opaque => None,
            Self::Alpha => Some(BlendState::ALPHA_BLENDING),
            Self::Additive => Some(BlendState {
                color: BlendComponent {
                    src_factor: BlendFactor::SrcAlpha,
                    dst_factor: BlendFactor::One,
                    operation: BlendOperation::Add,
                },
                alpha: BlendComponent::OVER,
            }),
            Self::Multiply => Some(BlendState {
                color: BlendComponent {
                    src_factor: BlendFactor::Dst,
                    dst_factor: BlendFactor::Zero,
                    operation: BlendOperation::Add,
                },
                alpha: BlendComponent::OVER,
            }),
        }
    }
}

/// Faces discarded when drawing normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

impl CullMode {
    #[must_use]
    pub fn face(self) -> Option<wgpu::Face> {
        match self {
            Self::None => None,
            Self::Back => Some(wgpu::Face::Back),
            Self::Front => Some(wgpu::Face::Front),
        }
    }
}

/// Which faces are rendered into shadow maps.
///
/// Independent from [`CullMode`] so casters can trade acne against
/// peter-panning without changing how they look on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowCastMode {
    Disabled,
    /// Both faces cast.
    AllFaces,
    /// Only front faces cast (back faces culled).
    #[default]
    FrontFaces,
    /// Only back faces cast (front faces culled).
    BackFaces,
}

impl ShadowCastMode {
    /// Cull face used while rendering depth for this mode.
    #[must_use]
    pub fn cull_face(self) -> Option<wgpu::Face> {
        match self {
            Self::Disabled | Self::AllFaces => None,
            Self::FrontFaces => Some(wgpu::Face::Back),
            Self::BackFaces => Some(wgpu::Face::Front),
        }
    }

    #[inline]
    #[must_use]
    pub fn casts(self) -> bool {
        self != Self::Disabled
    }
}

/// Camera-facing behaviour resolved at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BillboardMode {
    #[default]
    Disabled,
    /// Fully faces the camera.
    Front,
    /// Rotates around the world Y axis only.
    YAxis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlbedoMap {
    pub texture: Option<TextureId>,
    pub color: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalMap {
    pub texture: Option<TextureId>,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionMap {
    pub texture: Option<TextureId>,
    pub color: Vec3,
    pub energy: f32,
}

/// Occlusion / roughness / metalness packed map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrmMap {
    pub texture: Option<TextureId>,
    pub occlusion: f32,
    pub roughness: f32,
    pub metalness: f32,
}

/// PBR material snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: AlbedoMap,
    pub normal: NormalMap,
    pub emission: EmissionMap,
    pub orm: OrmMap,
    pub blend_mode: BlendMode,
    pub cull_mode: CullMode,
    pub shadow_cast_mode: ShadowCastMode,
    pub billboard_mode: BillboardMode,
    /// Fragments with alpha below this are discarded (also in shadow maps).
    pub alpha_cutoff: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: AlbedoMap {
                texture: None,
                color: Vec4::ONE,
            },
            normal: NormalMap {
                texture: None,
                scale: 1.0,
            },
            emission: EmissionMap {
                texture: None,
                color: Vec3::ZERO,
                energy: 0.0,
            },
            orm: OrmMap {
                texture: None,
                occlusion: 1.0,
                roughness: 1.0,
                metalness: 0.0,
            },
            blend_mode: BlendMode::Opaque,
            cull_mode: CullMode::Back,
            shadow_cast_mode: ShadowCastMode::FrontFaces,
            billboard_mode: BillboardMode::Disabled,
            alpha_cutoff: 0.01,
        }
    }
}

impl Material {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_albedo(mut self, color: Vec4) -> Self {
        self.albedo.color = color;
        self
    }

    #[must_use]
    pub fn with_emission(mut self, color: Vec3, energy: f32) -> Self {
        self.emission.color = color;
        self.emission.energy = energy;
        self
    }

    #[must_use]
    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    #[must_use]
    pub fn with_shadow_cast_mode(mut self, mode: ShadowCastMode) -> Self {
        self.shadow_cast_mode = mode;
        self
    }

    #[must_use]
    pub fn with_billboard_mode(mut self, mode: BillboardMode) -> Self {
        self.billboard_mode = mode;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.blend_mode == BlendMode::Opaque
    }
}
