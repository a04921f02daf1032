//! Texture format selection with ordered fallbacks.
//!
//! Render targets request an ideal format; when the device cannot render to
//! it, the closest supported alternative from a fixed list is used instead.
//! Choosing a fallback is logged as a warning. An exhausted list is fatal
//! for the caller and is reported as [`RenderError::UnsupportedFormat`].

use log::{error, warn};
use wgpu::TextureFormat;

use super::device::RenderDevice;
use crate::errors::{RenderError, Result};

/// Ordered alternatives tried when `requested` itself is unsupported.
#[must_use]
pub fn fallback_chain(requested: TextureFormat) -> &'static [TextureFormat] {
    use TextureFormat as F;
    match requested {
        F::Rgba16Float => &[F::Rgba32Float, F::Rg11b10Ufloat, F::Rgb10a2Unorm],
        F::Rg11b10Ufloat => &[F::Rgb9e5Ufloat, F::Rgba16Float, F::Rgba32Float],
        F::Rgba32Float => &[F::Rgba16Float],
        F::Rg16Float => &[F::Rg32Float, F::Rgba16Float, F::Rgba32Float],
        F::Rg8Unorm => &[F::Rgba8Unorm],
        F::R8Unorm => &[F::Rg8Unorm, F::Rgba8Unorm],
        F::R16Float => &[F::R32Float, F::Rgba16Float],
        F::Rgba8Unorm => &[F::Bgra8Unorm],
        F::Depth24PlusStencil8 => &[F::Depth32FloatStencil8],
        F::Depth32Float => &[F::Depth24Plus, F::Depth24PlusStencil8],
        _ => &[],
    }
}

/// Picks the first format of the fallback chain the device supports.
pub fn select_format(device: &dyn RenderDevice, requested: TextureFormat) -> Result<TextureFormat> {
    if device.supports_format(requested) {
        return Ok(requested);
    }

    for &candidate in fallback_chain(requested) {
        if device.supports_format(candidate) {
            warn!("Texture format {requested:?} unsupported, falling back to {candidate:?}");
            return Ok(candidate);
        }
    }

    error!("Texture format {requested:?} unsupported and every fallback failed");
    Err(RenderError::UnsupportedFormat { requested })
}
