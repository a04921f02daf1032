//! Tone Mapping and Colour Adjustment Configuration
//!
//! Tone mapping maps the HDR scene into display range with one of the
//! operators in [`ToneMappingMode`]. It is skipped entirely while the mode
//! is [`ToneMappingMode::Linear`] and exposure is exactly `1.0`.
//!
//! Colour adjustment (brightness, contrast, saturation) always runs.

/// Tone mapping operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToneMappingMode {
    /// Passthrough (exposure still applies).
    #[default]
    Linear,
    /// Reinhard with a configurable white point.
    Reinhard,
    /// Hable/Uncharted filmic curve.
    Filmic,
    /// ACES fitted curve.
    Aces,
    /// `AgX` base look.
    Agx,
}

impl ToneMappingMode {
    /// Integer tag uploaded to the tonemap program.
    #[must_use]
    pub fn shader_index(self) -> i32 {
        self as i32
    }

    /// Returns a human-readable name for the mode.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Reinhard => "Reinhard",
            Self::Filmic => "Filmic",
            Self::Aces => "ACES",
            Self::Agx => "AgX",
        }
    }

    /// Returns all available tone mapping modes.
    #[must_use]
    pub fn all() -> &'static [ToneMappingMode] {
        &[Self::Linear, Self::Reinhard, Self::Filmic, Self::Aces, Self::Agx]
    }
}

/// Tone mapping configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneMappingSettings {
    mode: ToneMappingMode,
    exposure: f32,
    white: f32,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::Linear,
            exposure: 1.0,
            white: 1.0,
        }
    }
}

impl ToneMappingSettings {
    #[inline]
    #[must_use]
    pub fn mode(&self) -> ToneMappingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ToneMappingMode) {
        self.mode = mode;
    }

    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure.max(0.0);
    }

    #[inline]
    #[must_use]
    pub fn white(&self) -> f32 {
        self.white
    }

    /// Sets the white point (luminance mapped to 1.0 by Reinhard/filmic).
    pub fn set_white(&mut self, white: f32) {
        self.white = white.max(1e-3);
    }

    /// Whether the tonemap stage has any effect this frame.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        #[allow(clippy::float_cmp)]
        let unit_exposure = self.exposure == 1.0;
        self.mode != ToneMappingMode::Linear || !unit_exposure
    }
}

/// Brightness / contrast / saturation, each neutral at `1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjustment {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for ColorAdjustment {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}
