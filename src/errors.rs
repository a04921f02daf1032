//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers the failure modes that can
//! occur while configuring the pipeline or addressing its resources:
//! - Invalid configuration (resolution, flags)
//! - Unsupported GPU texture formats once every fallback has been tried
//! - Stale light handles
//! - Backend device failures
//!
//! The per-frame API (`begin`, `end`, `draw_*`) never returns these errors.
//! They are logged at the boundary and the offending operation is dropped,
//! since a missing draw call is preferable to stopping a real-time loop.
//!
//! ```rust,ignore
//! use myth_pipeline::errors::{RenderError, Result};
//!
//! fn allocate() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the frame pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A resolution with a zero or negative side was requested.
    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution {
        /// Requested width
        width: i32,
        /// Requested height
        height: i32,
    },

    /// No format in the fallback list is supported by the device.
    #[error("Texture format {requested:?} is unsupported and no fallback is available")]
    UnsupportedFormat {
        /// The format originally requested
        requested: wgpu::TextureFormat,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The light handle does not refer to a live light.
    #[error("Light handle {0} is stale or was never created")]
    StaleLight(String),

    /// A framebuffer needed by a stage has not been allocated.
    #[error("Framebuffer not allocated: {0}")]
    MissingFramebuffer(&'static str),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The GPU backend rejected an operation.
    #[error("Device error: {0}")]
    Device(String),
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
