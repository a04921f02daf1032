//! Frame-persistent render targets.
//!
//! Everything is allocated at the internal resolution by
//! [`RenderTargets::new`] and rebuilt wholesale on resize. SSAO and bloom
//! resources are optional and only exist while their effect is enabled.
//!
//! | Target | Format | Notes |
//! |--------|--------|-------|
//! | G-buffer albedo / ORM | `Rgba8Unorm` | |
//! | G-buffer emission | HDR, `Rg11b10Ufloat` in low precision | |
//! | G-buffer normal | `Rg16Float`, `Rg8Unorm` with 8-bit normals | |
//! | Depth-stencil | `Depth24PlusStencil8` | shared by G-buffer, lighting and scene |
//! | Deferred diffuse / specular | HDR | light accumulation |
//! | Scene | HDR | |
//! | Post ping-pong | HDR, `Rg11b10Ufloat` in low precision | |
//! | SSAO ping-pong | `R8Unorm` | half resolution |
//! | Bloom mips | HDR, `Rg11b10Ufloat` in low precision | half resolution downwards |
//!
//! A failed allocation destroys whatever it had already created before
//! returning the error.

use glam::{Vec2, Vec4};
use log::{debug, info, warn};
use wgpu::{AddressMode, FilterMode, TextureFormat, TextureViewDimension};

use crate::errors::Result;
use crate::renderer::core::{
    Attachment, FramebufferDesc, FramebufferId, RenderDevice, TextureDesc, TextureId, select_format,
};
use crate::renderer::settings::RenderFlags;
use crate::resources::bloom::mip_chain_extents;
use crate::resources::brdf::{BRDF_LUT_SIZE, generate_brdf_lut, pack_rg16f};
use crate::resources::ssao::{
    SSAO_KERNEL_SIZE, SSAO_NOISE_SIZE, generate_ssao_kernel, generate_ssao_noise, pack_rgba16f,
};

/// Formats chosen for this device, after fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    pub hdr: TextureFormat,
    /// Post ping-pong and bloom chain; packed when low precision is requested.
    pub post_hdr: TextureFormat,
    pub albedo: TextureFormat,
    pub emission: TextureFormat,
    pub normal: TextureFormat,
    pub depth_stencil: TextureFormat,
    pub ssao: TextureFormat,
    pub lut: TextureFormat,
}

impl TargetFormats {
    pub fn select(device: &dyn RenderDevice, flags: RenderFlags) -> Result<Self> {
        let hdr = select_format(device, TextureFormat::Rgba16Float)?;
        let post_hdr = if flags.contains(RenderFlags::LOW_PRECISION_BUFFERS) {
            select_format(device, TextureFormat::Rg11b10Ufloat)?
        } else {
            hdr
        };
        let normal = if flags.contains(RenderFlags::EIGHT_BIT_NORMALS) {
            select_format(device, TextureFormat::Rg8Unorm)?
        } else {
            select_format(device, TextureFormat::Rg16Float)?
        };
        Ok(Self {
            hdr,
            post_hdr,
            albedo: select_format(device, TextureFormat::Rgba8Unorm)?,
            emission: post_hdr,
            normal,
            depth_stencil: select_format(device, TextureFormat::Depth24PlusStencil8)?,
            ssao: select_format(device, TextureFormat::R8Unorm)?,
            lut: select_format(device, TextureFormat::Rg16Float)?,
        })
    }
}

/// Packs float texels for `format`. `None` for formats without a CPU packing.
#[must_use]
pub fn pack_texels(format: TextureFormat, values: &[Vec4]) -> Option<Vec<u8>> {
    match format {
        TextureFormat::Rgba16Float => Some(pack_rgba16f(values)),
        TextureFormat::Rgba32Float => Some(bytemuck::cast_slice(values).to_vec()),
        TextureFormat::Rg16Float => {
            let pairs: Vec<Vec2> = values.iter().map(|v| v.truncate().truncate()).collect();
            Some(pack_rg16f(&pairs))
        }
        TextureFormat::Rg32Float => {
            let pairs: Vec<Vec2> = values.iter().map(|v| v.truncate().truncate()).collect();
            Some(bytemuck::cast_slice(&pairs).to_vec())
        }
        _ => None,
    }
}

/// A colour texture with a framebuffer rendering into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTarget {
    pub texture: TextureId,
    pub framebuffer: FramebufferId,
    pub width: u32,
    pub height: u32,
}

impl ColorTarget {
    fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_framebuffer(self.framebuffer);
        device.destroy_texture(self.texture);
    }
}

/// Resources created by one multi-step allocation, in creation order.
#[derive(Debug, Default)]
struct Allocation {
    textures: Vec<TextureId>,
    framebuffers: Vec<FramebufferId>,
}

impl Allocation {
    /// Runs `build`, destroying everything it created if it fails.
    fn run<T>(
        device: &mut dyn RenderDevice,
        what: &str,
        build: impl FnOnce(&mut dyn RenderDevice, &mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut allocation = Self::default();
        let result = build(&mut *device, &mut allocation);
        if let Err(err) = &result {
            warn!(
                "{what} allocation failed ({err}), releasing {} textures and {} framebuffers",
                allocation.textures.len(),
                allocation.framebuffers.len()
            );
            allocation.rollback(device);
        }
        result
    }

    fn texture(&mut self, device: &mut dyn RenderDevice, desc: &TextureDesc) -> Result<TextureId> {
        let id = device.create_texture(desc)?;
        self.textures.push(id);
        Ok(id)
    }

    fn framebuffer(&mut self, device: &mut dyn RenderDevice, desc: &FramebufferDesc) -> Result<FramebufferId> {
        let id = device.create_framebuffer(desc)?;
        self.framebuffers.push(id);
        Ok(id)
    }

    fn color_target(
        &mut self,
        device: &mut dyn RenderDevice,
        label: &'static str,
        width: u32,
        height: u32,
        format: TextureFormat,
        depth_stencil: Option<TextureId>,
    ) -> Result<ColorTarget> {
        let texture = self.texture(
            device,
            &TextureDesc::target_2d(label, width, height, format, FilterMode::Linear),
        )?;
        let framebuffer = self.framebuffer(
            device,
            &FramebufferDesc {
                label,
                color: vec![texture.into()],
                depth_stencil: depth_stencil.map(Attachment::from),
            },
        )?;
        Ok(ColorTarget {
            texture,
            framebuffer,
            width,
            height,
        })
    }

    fn rollback(self, device: &mut dyn RenderDevice) {
        for framebuffer in self.framebuffers.into_iter().rev() {
            device.destroy_framebuffer(framebuffer);
        }
        for texture in self.textures.into_iter().rev() {
            device.destroy_texture(texture);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    pub albedo: TextureId,
    pub emission: TextureId,
    pub normal: TextureId,
    pub orm: TextureId,
    pub depth_stencil: TextureId,
    pub framebuffer: FramebufferId,
}

/// Diffuse and specular light accumulation, sharing the G-buffer depth-stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightAccumulation {
    pub diffuse: TextureId,
    pub specular: TextureId,
    pub framebuffer: FramebufferId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsaoTargets {
    pub ping_pong: [ColorTarget; 2],
    pub kernel: TextureId,
    pub noise: TextureId,
}

impl SsaoTargets {
    /// Target holding the occlusion after `iterations` blur passes.
    #[inline]
    #[must_use]
    pub fn result(&self, iterations: u32) -> &ColorTarget {
        &self.ping_pong[(iterations % 2) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomChain {
    pub mips: Vec<ColorTarget>,
}

/// All targets owned by the renderer for the current resolution.
#[derive(Debug)]
pub struct RenderTargets {
    pub width: u32,
    pub height: u32,
    pub formats: TargetFormats,
    pub gbuffer: GBuffer,
    pub lighting: LightAccumulation,
    /// HDR scene colour with the shared depth-stencil attached.
    pub scene: ColorTarget,
    pub post: [ColorTarget; 2],
    pub brdf_lut: TextureId,
    pub ssao: Option<SsaoTargets>,
    pub bloom: Option<BloomChain>,
}

impl RenderTargets {
    pub fn new(device: &mut dyn RenderDevice, width: u32, height: u32, flags: RenderFlags) -> Result<Self> {
        let formats = TargetFormats::select(device, flags)?;
        let targets = Allocation::run(device, "render target", |device, alloc| {
            Self::allocate(device, alloc, width, height, formats)
        })?;
        info!("Render targets allocated at {width}x{height} ({formats:?})");
        Ok(targets)
    }

    fn allocate(
        device: &mut dyn RenderDevice,
        alloc: &mut Allocation,
        width: u32,
        height: u32,
        formats: TargetFormats,
    ) -> Result<Self> {
        let target = |label, format| TextureDesc::target_2d(label, width, height, format, FilterMode::Nearest);

        let albedo = alloc.texture(device, &target("gbuffer_albedo", formats.albedo))?;
        let emission = alloc.texture(device, &target("gbuffer_emission", formats.emission))?;
        let normal = alloc.texture(device, &target("gbuffer_normal", formats.normal))?;
        let orm = alloc.texture(device, &target("gbuffer_orm", formats.albedo))?;
        let depth_stencil = alloc.texture(device, &target("gbuffer_depth_stencil", formats.depth_stencil))?;
        let gbuffer = GBuffer {
            albedo,
            emission,
            normal,
            orm,
            depth_stencil,
            framebuffer: alloc.framebuffer(
                device,
                &FramebufferDesc {
                    label: "gbuffer",
                    color: vec![albedo.into(), emission.into(), normal.into(), orm.into()],
                    depth_stencil: Some(depth_stencil.into()),
                },
            )?,
        };

        let diffuse = alloc.texture(device, &target("deferred_diffuse", formats.hdr))?;
        let specular = alloc.texture(device, &target("deferred_specular", formats.hdr))?;
        let lighting = LightAccumulation {
            diffuse,
            specular,
            framebuffer: alloc.framebuffer(
                device,
                &FramebufferDesc {
                    label: "deferred_lighting",
                    color: vec![diffuse.into(), specular.into()],
                    depth_stencil: Some(depth_stencil.into()),
                },
            )?,
        };

        let scene = alloc.color_target(device, "scene", width, height, formats.hdr, Some(depth_stencil))?;
        let post = [
            alloc.color_target(device, "post_ping", width, height, formats.post_hdr, None)?,
            alloc.color_target(device, "post_pong", width, height, formats.post_hdr, None)?,
        ];

        let lut: Vec<Vec4> = generate_brdf_lut(BRDF_LUT_SIZE)
            .into_iter()
            .map(|v| v.extend(0.0).extend(1.0))
            .collect();
        let mut lut_desc = TextureDesc::target_2d("brdf_lut", BRDF_LUT_SIZE, BRDF_LUT_SIZE, formats.lut, FilterMode::Linear);
        if let Some(data) = pack_texels(formats.lut, &lut) {
            lut_desc = lut_desc.with_data(data);
        }
        let brdf_lut = alloc.texture(device, &lut_desc)?;

        Ok(Self {
            width,
            height,
            formats,
            gbuffer,
            lighting,
            scene,
            post,
            brdf_lut,
            ssao: None,
            bloom: None,
        })
    }

    /// Releases every target, including optional ones.
    pub fn destroy(self, device: &mut dyn RenderDevice) {
        let Self {
            gbuffer,
            lighting,
            scene,
            post,
            brdf_lut,
            ssao,
            bloom,
            ..
        } = self;

        if let Some(ssao) = ssao {
            Self::destroy_ssao(device, ssao);
        }
        if let Some(bloom) = bloom {
            Self::destroy_bloom(device, bloom);
        }
        for target in post {
            target.destroy(device);
        }
        scene.destroy(device);
        device.destroy_framebuffer(lighting.framebuffer);
        device.destroy_texture(lighting.diffuse);
        device.destroy_texture(lighting.specular);
        device.destroy_framebuffer(gbuffer.framebuffer);
        for texture in [gbuffer.albedo, gbuffer.emission, gbuffer.normal, gbuffer.orm, gbuffer.depth_stencil] {
            device.destroy_texture(texture);
        }
        device.destroy_texture(brdf_lut);
    }

    // --- SSAO ---

    /// Allocates the SSAO targets and sample textures if missing.
    pub fn ensure_ssao(&mut self, device: &mut dyn RenderDevice) -> Result<()> {
        if self.ssao.is_some() {
            return Ok(());
        }
        let (w, h) = ((self.width / 2).max(1), (self.height / 2).max(1));
        let sample_format = self.formats.hdr;
        let kernel_data = generate_ssao_kernel(SSAO_KERNEL_SIZE);
        let mut kernel = TextureDesc::target_2d(
            "ssao_kernel",
            SSAO_KERNEL_SIZE as u32,
            1,
            sample_format,
            FilterMode::Nearest,
        );
        if let Some(data) = pack_texels(sample_format, &kernel_data) {
            kernel = kernel.with_data(data);
        }

        let noise_data = generate_ssao_noise();
        let mut noise = TextureDesc::target_2d(
            "ssao_noise",
            SSAO_NOISE_SIZE,
            SSAO_NOISE_SIZE,
            sample_format,
            FilterMode::Nearest,
        )
        .with_address_mode(AddressMode::Repeat);
        if let Some(data) = pack_texels(sample_format, &noise_data) {
            noise = noise.with_data(data);
        }

        let ssao_format = self.formats.ssao;
        let ssao = Allocation::run(device, "SSAO", |device, alloc| {
            Ok(SsaoTargets {
                ping_pong: [
                    alloc.color_target(device, "ssao_ping", w, h, ssao_format, None)?,
                    alloc.color_target(device, "ssao_pong", w, h, ssao_format, None)?,
                ],
                kernel: alloc.texture(device, &kernel)?,
                noise: alloc.texture(device, &noise)?,
            })
        })?;
        self.ssao = Some(ssao);
        debug!("SSAO targets allocated at {w}x{h}");
        Ok(())
    }

    pub fn release_ssao(&mut self, device: &mut dyn RenderDevice) {
        if let Some(ssao) = self.ssao.take() {
            Self::destroy_ssao(device, ssao);
            debug!("SSAO targets released");
        }
    }

    fn destroy_ssao(device: &mut dyn RenderDevice, ssao: SsaoTargets) {
        for target in ssao.ping_pong {
            target.destroy(device);
        }
        device.destroy_texture(ssao.kernel);
        device.destroy_texture(ssao.noise);
    }

    // --- Bloom ---

    /// Allocates the bloom mip chain if missing.
    pub fn ensure_bloom(&mut self, device: &mut dyn RenderDevice) -> Result<()> {
        if self.bloom.is_some() {
            return Ok(());
        }
        let extents = mip_chain_extents(self.width, self.height);
        let format = self.formats.post_hdr;
        let mips = Allocation::run(device, "bloom", |device, alloc| {
            extents
                .iter()
                .map(|&(w, h)| alloc.color_target(device, "bloom_mip", w, h, format, None))
                .collect::<Result<Vec<_>>>()
        })?;
        debug!("Bloom chain allocated with {} mips", mips.len());
        self.bloom = Some(BloomChain { mips });
        Ok(())
    }

    pub fn release_bloom(&mut self, device: &mut dyn RenderDevice) {
        if let Some(bloom) = self.bloom.take() {
            Self::destroy_bloom(device, bloom);
            debug!("Bloom chain released");
        }
    }

    fn destroy_bloom(device: &mut dyn RenderDevice, bloom: BloomChain) {
        for mip in bloom.mips {
            mip.destroy(device);
        }
    }
}

/// Creates the depth texture and framebuffer of a shadow map.
///
/// Omni lights get a cube map; faces are selected with `attach_depth`.
pub fn create_shadow_map(
    device: &mut dyn RenderDevice,
    resolution: u32,
    cube: bool,
) -> Result<(TextureId, FramebufferId)> {
    let format = select_format(device, TextureFormat::Depth32Float)?;
    let desc = TextureDesc::target_2d("shadow_map", resolution, resolution, format, FilterMode::Linear);
    let desc = if cube {
        desc.with_dimension(TextureViewDimension::Cube)
    } else {
        desc
    };
    Allocation::run(device, "shadow map", |device, alloc| {
        let texture = alloc.texture(device, &desc)?;
        let framebuffer = alloc.framebuffer(
            device,
            &FramebufferDesc {
                label: "shadow_map",
                color: Vec::new(),
                depth_stencil: Some(texture.into()),
            },
        )?;
        Ok((texture, framebuffer))
    })
}
