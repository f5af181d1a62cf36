//! Allow/Forced Mask Derivation
//!
//! A shader's token stream is scanned once at registration time. Every
//! conditional guard is handed to the expression evaluator and its result is
//! OR-ed into the **allow-mask**; every other token feeds the structural
//! capability flags. The registry's globally forced bits form the
//! **forced-mask**. Together the two masks constrain which runtime
//! combinations are legal for the shader:
//!
//! ```text
//! effective = (desired & allow) | forced
//! ```
//!
//! This module also defines [`ProgramKind`], the closed set of GPU program
//! stages, with a small per-kind behavior table replacing per-call-site
//! switches.

use super::expr::evaluate_guard;
use super::token::{structural_flag_for, tok, FeatureRegistry, ShaderType, StructuralFlags};
use crate::errors::{Result, VesperError};

// ─── Program Kinds ────────────────────────────────────────────────────────────

/// GPU program stage kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum ProgramKind {
    Vertex = 0,
    Pixel = 1,
    Geometry = 2,
    Hull = 3,
    Domain = 4,
    Compute = 5,
}

/// Per-kind behavior table entry.
#[derive(Debug, Clone, Copy)]
pub struct KindTraits {
    /// Display name (logging, error messages).
    pub name: &'static str,
    /// Default entry-point symbol when the declaration does not override it.
    pub default_entry: &'static str,
    /// Whether this kind binds per-light data (participates in the
    /// light-count class of the combination identity).
    pub binds_lights: bool,
    /// Whether this kind consumes vertex-stream modifiers.
    pub binds_vertex_modifiers: bool,
}

const KIND_TRAITS: [KindTraits; 6] = [
    KindTraits {
        name: "vertex",
        default_entry: "vs_main",
        binds_lights: true,
        binds_vertex_modifiers: true,
    },
    KindTraits {
        name: "pixel",
        default_entry: "ps_main",
        binds_lights: true,
        binds_vertex_modifiers: false,
    },
    KindTraits {
        name: "geometry",
        default_entry: "gs_main",
        binds_lights: false,
        binds_vertex_modifiers: false,
    },
    KindTraits {
        name: "hull",
        default_entry: "hs_main",
        binds_lights: false,
        binds_vertex_modifiers: false,
    },
    KindTraits {
        name: "domain",
        default_entry: "ds_main",
        binds_lights: false,
        binds_vertex_modifiers: false,
    },
    KindTraits {
        name: "compute",
        default_entry: "cs_main",
        binds_lights: false,
        binds_vertex_modifiers: false,
    },
];

impl ProgramKind {
    /// All kinds, in stable order.
    pub const ALL: [Self; 6] = [
        Self::Vertex,
        Self::Pixel,
        Self::Geometry,
        Self::Hull,
        Self::Domain,
        Self::Compute,
    ];

    /// Behavior table entry for this kind.
    #[inline]
    #[must_use]
    pub fn traits(self) -> &'static KindTraits {
        &KIND_TRAITS[self as usize]
    }

    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.traits().name
    }
}

// ─── Shader Declaration ───────────────────────────────────────────────────────

/// Static declaration of one shader entry point.
#[derive(Debug, Clone)]
pub struct ShaderDecl {
    /// Shader name (diagnostics and error reporting).
    pub name: String,
    pub kind: ProgramKind,
    /// Entry-point symbol handed to the compilation service.
    pub entry_point: String,
    /// Declared content type; `None` for untyped shaders, which keep every
    /// registered bit in their allow-mask.
    pub shader_type: Option<ShaderType>,
    /// Global-feature-generation mask baked into every identity resolved
    /// against this shader.
    pub global_mask: u64,
}

impl ShaderDecl {
    /// New declaration with the kind's default entry point, untyped.
    #[must_use]
    pub fn new(name: &str, kind: ProgramKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            entry_point: kind.traits().default_entry.to_owned(),
            shader_type: None,
            global_mask: 0,
        }
    }

    #[must_use]
    pub fn with_type(mut self, shader_type: ShaderType) -> Self {
        self.shader_type = Some(shader_type);
        self
    }

    #[must_use]
    pub fn with_entry_point(mut self, entry_point: &str) -> Self {
        self.entry_point = entry_point.to_owned();
        self
    }

    #[must_use]
    pub fn with_global_mask(mut self, global_mask: u64) -> Self {
        self.global_mask = global_mask;
        self
    }
}

// ─── Variant Masks ────────────────────────────────────────────────────────────

/// The pair of masks constraining legal runtime combinations for a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantMasks {
    /// Bits a variant of this shader may carry.
    pub allow: u64,
    /// Bits every variant of this shader must carry.
    pub forced: u64,
}

impl VariantMasks {
    /// Masks of a shader without a feature-extension block: everything
    /// allowed, nothing forced.
    pub const UNCONSTRAINED: Self = Self { allow: !0, forced: 0 };

    /// Whether a runtime mask is a fixed point of the clamp.
    #[inline]
    #[must_use]
    pub fn accepts(&self, runtime_mask: u64) -> bool {
        (runtime_mask & self.allow) | self.forced == runtime_mask
    }
}

/// Scans a shader's full token stream once, deriving its variant masks and
/// structural capability flags.
///
/// An empty stream or an empty registry yields
/// [`VariantMasks::UNCONSTRAINED`]. A globally forced bit the allow-mask can
/// never accept is a configuration error.
pub fn derive_masks(
    registry: &FeatureRegistry,
    decl: &ShaderDecl,
    tokens: &[u32],
) -> Result<(VariantMasks, StructuralFlags)> {
    let mut flags = StructuralFlags::empty();
    if tokens.is_empty() || registry.is_empty() {
        return Ok((VariantMasks::UNCONSTRAINED, flags));
    }

    let mut allow = 0u64;
    let mut cur = 0usize;
    while cur < tokens.len() {
        let token = tokens[cur];
        cur += 1;
        if token == tok::SKIP {
            continue;
        }
        if tok::is_conditional(token) {
            let scan = evaluate_guard(registry, &mut flags, tokens, cur);
            allow |= scan.mask;
            cur = scan.next;
        } else if let Some(flag) = structural_flag_for(token) {
            flags.insert(flag);
        }
    }

    // Clear bits inapplicable to the declared content type. Runtime-resolved
    // bits are exempt; their applicability is only known at resolve time.
    if let Some(ty) = decl.shader_type {
        for bit in registry.bits() {
            if bit.runtime_resolved() {
                continue;
            }
            if !bit.applies_to(ty) {
                allow &= !bit.mask();
            }
        }
    }

    let forced = registry.forced_mask();
    if forced & !allow != 0 {
        return Err(VesperError::Configuration(format!(
            "shader '{}' ({}) can never accept forced feature bits {:#018x}",
            decl.name,
            decl.kind.name(),
            forced & !allow
        )));
    }

    log::debug!(
        "derived masks for '{}': allow {:#018x}, forced {:#018x}, flags {:?}",
        decl.name,
        allow,
        forced,
        flags
    );
    Ok((VariantMasks { allow, forced }, flags))
}
