//! Combination Identity
//!
//! [`CombinationIdent`] aggregates every orthogonal axis that distinguishes
//! one compiled shader variant from another for a given entry point. Field
//! equality is the cache key; the derived `Hash`/`Eq` feed the per-shader
//! variant table directly.
//!
//! Invariant for any identity accepted by the cache:
//! `(runtime_mask & allow) | forced == runtime_mask`.

use super::mask::VariantMasks;
use super::token::StructuralFlags;

// ─── Light-Class Encoding ─────────────────────────────────────────────────────

/// Bit position of the light-kind field inside `light_class`.
pub const LIGHT_KIND_SHIFT: u32 = 4;
/// Width mask of the light-kind field.
pub const LIGHT_KIND_MASK: u32 = 0x3;
/// Light-kind value for projected lights, which survive the single-light
/// reduction.
pub const LIGHT_KIND_PROJECTED: u32 = 0x2;

// ─── Identity ─────────────────────────────────────────────────────────────────

/// Full identity of one compiled variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CombinationIdent {
    /// Independently toggleable optional capabilities (64-bit feature mask).
    pub runtime_mask: u64,
    /// Vertex-stream / texture-coordinate modifier selection.
    pub modifier_mask: u32,
    /// Light-count class (count in the low nibble, light kind above
    /// [`LIGHT_KIND_SHIFT`]).
    pub light_class: u32,
    /// Global-feature-generation mask of the owning shader.
    pub global_mask: u64,
    /// Fixed-function pipeline state bits (blend, depth, cull…).
    pub state_bits: u64,
}

impl CombinationIdent {
    /// Identity carrying only a runtime-feature mask.
    #[must_use]
    pub fn with_runtime(runtime_mask: u64) -> Self {
        Self {
            runtime_mask,
            ..Self::default()
        }
    }

    /// Clamps the runtime mask into the legal range for a shader:
    /// `(runtime & allow) | forced`.
    #[inline]
    #[must_use]
    pub fn clamped(mut self, masks: &VariantMasks) -> Self {
        self.runtime_mask = (self.runtime_mask & masks.allow) | masks.forced;
        self
    }

    /// Full clamp used by the cache: runtime mask against the variant
    /// masks, light class against the shader's structural capabilities.
    #[must_use]
    pub fn clamped_for(mut self, masks: &VariantMasks, flags: StructuralFlags) -> Self {
        self = self.clamped(masks);
        self.light_class = reduce_light_class(flags, self.light_class);
        self
    }

    /// Whether the runtime mask already satisfies the shader's masks.
    #[inline]
    #[must_use]
    pub fn satisfies(&self, masks: &VariantMasks) -> bool {
        masks.accepts(self.runtime_mask)
    }
}

/// Reduces a requested light-count class to what the shader can consume.
///
/// A shader without any lighting capability drops the class to zero. One
/// with single-light support but no per-slot light typing collapses any
/// non-projected class to `1`.
#[must_use]
pub fn reduce_light_class(flags: StructuralFlags, light_class: u32) -> u32 {
    if light_class == 0 {
        return 0;
    }
    if !flags.intersects(
        StructuralFlags::SUPPORTS_MULTI_LIGHTS
            | StructuralFlags::SUPPORTS_LIGHTING
            | StructuralFlags::FIXED_FUNCTION_EMULATION,
    ) {
        return 0;
    }
    if !flags.contains(StructuralFlags::SUPPORTS_MULTI_LIGHTS)
        && flags.contains(StructuralFlags::SUPPORTS_LIGHTING)
    {
        let kind = (light_class >> LIGHT_KIND_SHIFT) & LIGHT_KIND_MASK;
        if kind != LIGHT_KIND_PROJECTED {
            return 1;
        }
    }
    light_class
}
