//! Depth fog configuration.

use glam::Vec3;

/// Fog falloff model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FogMode {
    #[default]
    Disabled,
    /// Linear ramp between `start` and `end`.
    Linear,
    /// `1 - exp(-(density * d)^2)`
    ExpSquared,
    /// `1 - exp(-density * d)`
    Exponential,
}

impl FogMode {
    #[must_use]
    pub fn shader_index(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FogSettings {
    pub mode: FogMode,
    pub color: Vec3,
    pub start: f32,
    pub end: f32,
    pub density: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            mode: FogMode::Disabled,
            color: Vec3::ONE,
            start: 1.0,
            end: 50.0,
            density: 0.05,
        }
    }
}

impl FogSettings {
    #[inline]
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.mode != FogMode::Disabled
    }

    /// Fog factor in `[0, 1]` at linear view distance `distance`.
    #[must_use]
    pub fn factor(&self, distance: f32) -> f32 {
        let f = match self.mode {
            FogMode::Disabled => 0.0,
            FogMode::Linear => {
                let span = (self.end - self.start).max(1e-5);
                (distance - self.start) / span
            }
            FogMode::ExpSquared => {
                let d = self.density * distance;
                1.0 - (-d * d).exp()
            }
            FogMode::Exponential => 1.0 - (-self.density * distance).exp(),
        };
        f.clamp(0.0, 1.0)
    }
}
