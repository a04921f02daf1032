#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use errors::{RenderError, Result};
pub use renderer::core::{HeadlessDevice, RenderDevice};
pub use renderer::graph::OutputTarget;
pub use renderer::{RenderFlags, Renderer, RendererSettings};
pub use resources::{
    BlendMode, BloomMode, BoundingBox, Environment, FogMode, InstanceBatch, Material, Mesh,
    ParticleSystem, Skybox, Sprite, ToneMappingMode,
};
pub use scene::{Camera, Light, LightHandle, LightKind, ShadowUpdate};
