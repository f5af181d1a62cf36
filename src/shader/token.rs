//! Token Codes & Feature Registry
//!
//! Preprocessed shader source arrives as a flat, immutable stream of `u32`
//! token codes produced by the asset pipeline. This module defines:
//!
//! - the reserved keyword/operator codes ([`tok`]),
//! - [`StructuralFlags`] — capability flags set by builtin tokens that are
//!   *not* registered feature bits,
//! - [`FeatureRegistry`] — the global name → 64-bit feature-mask table that
//!   drives guard evaluation and allow-mask derivation.
//!
//! The registry is owned by the
//! [`PipelineContext`](crate::context::PipelineContext) and injected where
//! needed; there is no hidden global table.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{Result, VesperError};

// ─── Token Codes ──────────────────────────────────────────────────────────────

/// Reserved token codes understood by the guard evaluator and mask scanner.
///
/// Code `0` is padding and never a leaf. Registered feature identifiers are
/// assigned codes starting at [`tok::FIRST_FEATURE`].
pub mod tok {
    /// Padding / end-of-fragment marker. Skipped by the scanner.
    pub const SKIP: u32 = 0x00;

    // Conditional preprocessor keywords. Kept contiguous so that
    // `is_conditional` is a single range check.
    pub const IF: u32 = 0x01;
    pub const IFDEF: u32 = 0x02;
    pub const IFNDEF: u32 = 0x03;
    pub const ELIF: u32 = 0x04;
    pub const ELSE: u32 = 0x05;
    pub const ENDIF: u32 = 0x06;

    // Boolean operators inside guard expressions. `&&` / `||` lex to two
    // consecutive operator codes.
    pub const AND: u32 = 0x10;
    pub const OR: u32 = 0x11;
    pub const NOT: u32 = 0x12;
    pub const LPAREN: u32 = 0x13;
    pub const RPAREN: u32 = 0x14;

    // Builtin structural capability tokens. These are not feature bits;
    // mentioning them marks what the shader is able to consume at runtime.
    pub const LIGHTS: u32 = 0x20;
    pub const LIGHT0_TYPE: u32 = 0x21;
    pub const LIGHT1_TYPE: u32 = 0x22;
    pub const LIGHT2_TYPE: u32 = 0x23;
    pub const LIGHT3_TYPE: u32 = 0x24;
    pub const TEXCOORD_MATRIX: u32 = 0x25;
    pub const TEXCOORD_GEN_OBJECT_LINEAR: u32 = 0x26;
    pub const VERTEX_MODIFIER: u32 = 0x27;
    pub const FIXED_FUNCTION_TEXTURE: u32 = 0x28;

    /// First code assignable to a registered feature identifier.
    pub const FIRST_FEATURE: u32 = 0x100;

    /// Returns `true` for tokens that open a guard expression
    /// (`if` / `ifdef` / `ifndef` / `elif`).
    #[inline]
    #[must_use]
    pub const fn is_conditional(token: u32) -> bool {
        token >= IF && token <= ELIF
    }
}

bitflags::bitflags! {
    /// Structural capabilities discovered while scanning a token stream.
    ///
    /// Set idempotently whenever an unregistered builtin token appears,
    /// either inside a guard or in plain code. These do not participate in
    /// the combination identity; they constrain how an identity is clamped
    /// (see [`reduce_light_class`](crate::shader::ident::reduce_light_class)).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StructuralFlags: u32 {
        /// Shader consumes per-light data.
        const SUPPORTS_LIGHTING = 1 << 0;
        /// Shader branches on individual light-slot types.
        const SUPPORTS_MULTI_LIGHTS = 1 << 1;
        /// Shader applies texture-coordinate modifiers.
        const SUPPORTS_TEXCOORD_MODIFIERS = 1 << 2;
        /// Shader applies vertex-stream modifiers.
        const SUPPORTS_VERTEX_MODIFIERS = 1 << 3;
        /// Shader emulates the fixed-function texture path.
        const FIXED_FUNCTION_EMULATION = 1 << 4;
    }
}

/// Maps a builtin structural token to its capability flag.
///
/// Returns `None` for tokens with no structural meaning; those contribute
/// nothing (the scan stays total over arbitrary streams).
#[must_use]
pub fn structural_flag_for(token: u32) -> Option<StructuralFlags> {
    match token {
        tok::LIGHTS => Some(StructuralFlags::SUPPORTS_LIGHTING),
        tok::LIGHT0_TYPE | tok::LIGHT1_TYPE | tok::LIGHT2_TYPE | tok::LIGHT3_TYPE => {
            Some(StructuralFlags::SUPPORTS_MULTI_LIGHTS)
        }
        tok::TEXCOORD_MATRIX | tok::TEXCOORD_GEN_OBJECT_LINEAR => {
            Some(StructuralFlags::SUPPORTS_TEXCOORD_MODIFIERS)
        }
        tok::VERTEX_MODIFIER => Some(StructuralFlags::SUPPORTS_VERTEX_MODIFIERS),
        tok::FIXED_FUNCTION_TEXTURE => Some(StructuralFlags::FIXED_FUNCTION_EMULATION),
        _ => None,
    }
}

/// Content hash of a token stream (xxh3 over the raw code bytes).
///
/// Used to detect source changes across shader re-registration.
#[must_use]
pub fn token_stream_hash(tokens: &[u32]) -> u64 {
    xxh3_64(bytemuck::cast_slice(tokens))
}

// ─── Shader Content Types ─────────────────────────────────────────────────────

/// Registered shader *content* type (e.g. "General", "Terrain", "Particle").
///
/// Feature bits may be restricted to a list of content types; bits
/// inapplicable to a shader's declared type are cleared from its allow-mask
/// during derivation unless the bit is runtime-resolved.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ShaderType(u32);

// ─── Feature Registry ─────────────────────────────────────────────────────────

/// One globally registered optional feature.
#[derive(Debug, Clone)]
pub struct FeatureBit {
    name: String,
    token: u32,
    mask: u64,
    runtime_resolved: bool,
    /// Content types this bit applies to. Empty means "no typed shader" —
    /// only untyped shaders keep the bit.
    applies_to: SmallVec<[ShaderType; 4]>,
}

impl FeatureBit {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn token(&self) -> u32 {
        self.token
    }

    #[inline]
    #[must_use]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Runtime-resolved bits bypass shader-type gating.
    #[inline]
    #[must_use]
    pub fn runtime_resolved(&self) -> bool {
        self.runtime_resolved
    }

    /// Whether this bit applies to the given content type.
    #[must_use]
    pub fn applies_to(&self, ty: ShaderType) -> bool {
        self.applies_to.contains(&ty)
    }
}

/// Global name → feature-bit table (64 bits max).
///
/// Registration order assigns both the bit position and the token code, so
/// a registry shared between the asset pipeline and the resolver produces
/// identical token streams and masks on both sides.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    bits: Vec<FeatureBit>,
    token_index: FxHashMap<u32, usize>,
    name_index: FxHashMap<String, usize>,
    type_index: FxHashMap<String, ShaderType>,
    forced_mask: u64,
}

impl FeatureRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────────────

    /// Registers a new optional feature and returns its mask bit.
    pub fn register_feature(&mut self, name: &str) -> Result<u64> {
        self.register(name, false)
    }

    /// Registers a runtime-resolved feature (exempt from shader-type
    /// gating) and returns its mask bit.
    pub fn register_runtime_feature(&mut self, name: &str) -> Result<u64> {
        self.register(name, true)
    }

    fn register(&mut self, name: &str, runtime_resolved: bool) -> Result<u64> {
        if self.bits.len() >= 64 {
            return Err(VesperError::RegistryFull);
        }
        if self.name_index.contains_key(name) {
            return Err(VesperError::Configuration(format!(
                "feature '{name}' is already registered"
            )));
        }
        let index = self.bits.len();
        let bit = FeatureBit {
            name: name.to_owned(),
            token: tok::FIRST_FEATURE + index as u32,
            mask: 1u64 << index,
            runtime_resolved,
            applies_to: SmallVec::new(),
        };
        log::debug!(
            "registered feature '{}' (bit {}, token {:#x}, runtime: {})",
            name,
            index,
            bit.token,
            runtime_resolved
        );
        self.token_index.insert(bit.token, index);
        self.name_index.insert(name.to_owned(), index);
        let mask = bit.mask;
        self.bits.push(bit);
        Ok(mask)
    }

    /// Restricts a feature to the given shader content types.
    pub fn restrict_to_types(&mut self, name: &str, types: &[ShaderType]) -> Result<()> {
        let index = *self.name_index.get(name).ok_or_else(|| {
            VesperError::Configuration(format!("unknown feature '{name}'"))
        })?;
        self.bits[index].applies_to.extend_from_slice(types);
        Ok(())
    }

    /// Marks a feature as globally forced: every derived forced-mask will
    /// include its bit.
    pub fn force(&mut self, name: &str) -> Result<()> {
        let index = *self.name_index.get(name).ok_or_else(|| {
            VesperError::Configuration(format!("unknown feature '{name}'"))
        })?;
        self.forced_mask |= self.bits[index].mask;
        Ok(())
    }

    /// Registers (or looks up) a shader content type by name.
    pub fn register_type(&mut self, name: &str) -> ShaderType {
        if let Some(&ty) = self.type_index.get(name) {
            return ty;
        }
        let ty = ShaderType(self.type_index.len() as u32);
        self.type_index.insert(name.to_owned(), ty);
        ty
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    /// Mask bit for a registered token code, `None` for unregistered tokens.
    #[inline]
    #[must_use]
    pub fn mask_of_token(&self, token: u32) -> Option<u64> {
        self.token_index.get(&token).map(|&i| self.bits[i].mask)
    }

    /// Mask bit by feature name.
    #[must_use]
    pub fn mask_of(&self, name: &str) -> Option<u64> {
        self.name_index.get(name).map(|&i| self.bits[i].mask)
    }

    /// Token code by feature name.
    #[must_use]
    pub fn token_of(&self, name: &str) -> Option<u32> {
        self.name_index.get(name).map(|&i| self.bits[i].token)
    }

    /// Union of all globally forced bits.
    #[inline]
    #[must_use]
    pub fn forced_mask(&self) -> u64 {
        self.forced_mask
    }

    /// Iterates all registered bits in registration order.
    pub fn bits(&self) -> impl Iterator<Item = &FeatureBit> {
        self.bits.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}
