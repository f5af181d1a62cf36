//! Quality Settings
//!
//! Persisted quality settings consumed by stage activation predicates, plus
//! the change-set type handed to stages on configuration hot-reload.
//!
//! Settings are plain data: the scheduler stores the current value, computes
//! a [`SettingsDelta`] when the frame driver pushes a new one, and forwards
//! the delta to every stage. How a changed setting is interpreted (reallocate
//! targets, swap shader permutations, deactivate entirely) is per-stage.

// ---------------------------------------------------------------------------
// QualityLevel
// ---------------------------------------------------------------------------

/// Ordered quality tier used by per-system settings.
///
/// The ordering is load-bearing: activation predicates compare levels
/// (`settings.post_processing >= QualityLevel::Medium`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QualityLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl QualityLevel {
    /// Display name (debug overlays, logs).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "VeryHigh",
        }
    }
}

// ---------------------------------------------------------------------------
// QualitySettings
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Which settings changed in a configuration hot-reload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SettingsDelta: u32 {
        const SHADOWS = 1 << 0;
        const POST_PROCESSING = 1 << 1;
        const EFFECTS = 1 << 2;
        const SHADING = 1 << 3;
    }
}

/// Persisted per-system quality settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualitySettings {
    pub shadows: QualityLevel,
    pub post_processing: QualityLevel,
    pub effects: QualityLevel,
    pub shading: QualityLevel,
}

impl QualitySettings {
    /// Uniform settings at one level.
    #[must_use]
    pub const fn uniform(level: QualityLevel) -> Self {
        Self {
            shadows: level,
            post_processing: level,
            effects: level,
            shading: level,
        }
    }

    /// Set of fields that differ between `self` and `next`.
    #[must_use]
    pub fn delta(&self, next: &Self) -> SettingsDelta {
        let mut delta = SettingsDelta::empty();
        if self.shadows != next.shadows {
            delta |= SettingsDelta::SHADOWS;
        }
        if self.post_processing != next.post_processing {
            delta |= SettingsDelta::POST_PROCESSING;
        }
        if self.effects != next.effects {
            delta |= SettingsDelta::EFFECTS;
        }
        if self.shading != next.shading {
            delta |= SettingsDelta::SHADING;
        }
        delta
    }
}
