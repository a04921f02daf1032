//! Scene-side inputs of a frame
//!
//! - [`Camera`]: the view supplied to `begin`, and [`FrameCamera`], the matrices
//!   and culling volumes derived from it
//! - [`Light`]: persistent lights owned by the [`LightRegistry`]

pub mod camera;
pub mod light;

pub use camera::{Camera, FrameCamera, Frustum, ProjectionType};
pub use light::{Light, LightHandle, LightKind, LightRegistry, Shadow, ShadowMap, ShadowUpdate};
