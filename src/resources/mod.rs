//! Resource value types
//!
//! Data consumed by the pipeline without owning GPU state itself:
//! - [`BoundingBox`], [`Mesh`]: geometry references and bounds
//! - [`Material`]: per-draw material snapshot
//! - [`Sprite`], [`InstanceBatch`], [`ParticleSystem`]: sprite sheets and instancing
//! - [`Environment`] and the effect settings it aggregates

pub mod bloom;
pub mod brdf;
pub mod environment;
pub mod fog;
pub mod geometry;
pub mod material;
pub mod sprite;
pub mod ssao;
pub mod tone_mapping;

pub use bloom::{BloomMode, BloomSettings};
pub use environment::{Environment, Skybox};
pub use fog::{FogMode, FogSettings};
pub use geometry::{BoundingBox, Mesh};
pub use material::{BillboardMode, BlendMode, CullMode, Material, ShadowCastMode};
pub use sprite::{InstanceBatch, ParticleSystem, Sprite};
pub use ssao::SsaoSettings;
pub use tone_mapping::{ColorAdjustment, ToneMappingMode, ToneMappingSettings};
