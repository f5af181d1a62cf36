//! Variant Cache
//!
//! Reference-counted map from (shader key, combination identity) to compiled
//! variant instances. The cache owns lazy compilation and device-resource
//! teardown; it never substitutes one variant for another.
//!
//! # Resolution
//!
//! ```text
//! desired ──clamp──▶ effective ──lookup──▶ hit:  refcount++, touch, return
//!                                          miss: compile (if allowed),
//!                                                allocate parameter group,
//!                                                insert at refcount 1
//! ```
//!
//! A miss while the [`PipelineContext`](crate::context::PipelineContext)
//! compile switch is off is a hard failure — the caller resolves it via
//! fallback substitution, not this cache.
//!
//! # Threading
//!
//! All mutation happens on the single designated rendering thread; instances
//! are shared through `Rc` and there is no internal locking.

use std::cell::Cell;
use std::collections::hash_map::Entry;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::context::PipelineContext;
use crate::errors::{Result, VesperError};
use crate::shader::compile::{GroupIndex, ParameterLayout, ProgramHandle, ShaderCompiler};
use crate::shader::ident::CombinationIdent;
use crate::shader::mask::{derive_masks, ShaderDecl, VariantMasks};
use crate::shader::token::{token_stream_hash, StructuralFlags};

new_key_type! {
    /// Generational handle to a registered shader.
    pub struct ShaderKey;
}

// ─── Variant Instance ─────────────────────────────────────────────────────────

/// One compiled variant. Immutable once compiled; only the last-access
/// timestamp mutates, through a `Cell` (single-threaded by contract).
#[derive(Debug)]
pub struct VariantInstance {
    ident: CombinationIdent,
    program: ProgramHandle,
    data_size: usize,
    param_group: GroupIndex,
    last_access: Cell<u64>,
}

impl VariantInstance {
    /// The effective (clamped) identity this variant was compiled with.
    #[inline]
    #[must_use]
    pub fn ident(&self) -> CombinationIdent {
        self.ident
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    #[inline]
    #[must_use]
    pub fn param_group(&self) -> GroupIndex {
        self.param_group
    }

    /// Frame index of the most recent resolution.
    #[inline]
    #[must_use]
    pub fn last_access(&self) -> u64 {
        self.last_access.get()
    }

    fn touch(&self, frame: u64) {
        self.last_access.set(frame);
    }
}

struct VariantSlot {
    instance: Rc<VariantInstance>,
    refs: u32,
}

// ─── Shader Record ────────────────────────────────────────────────────────────

struct ShaderRecord {
    decl: ShaderDecl,
    tokens: Vec<u32>,
    content_hash: u64,
    masks: VariantMasks,
    flags: StructuralFlags,
    variants: FxHashMap<CombinationIdent, VariantSlot>,
}

impl ShaderRecord {
    /// Clamps a desired identity into the record's legal range and stamps
    /// the declaration's global-generation mask.
    fn clamp(&self, desired: CombinationIdent) -> CombinationIdent {
        let mut effective = desired.clamped_for(&self.masks, self.flags);
        effective.global_mask = self.decl.global_mask;
        effective
    }
}

// ─── Cache ────────────────────────────────────────────────────────────────────

/// Running counters for cache behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub compiled: u64,
    pub evicted: u64,
}

/// Reference-counted cache of compiled shader variants.
pub struct VariantCache {
    shaders: SlotMap<ShaderKey, ShaderRecord>,
    /// References parked by the precache path, dropped in bulk by
    /// [`release_precached`](Self::release_precached).
    precached: Vec<(ShaderKey, CombinationIdent)>,
    stats: CacheStats,
}

impl Default for VariantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shaders: SlotMap::with_key(),
            precached: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    // ── Shader Registration ──────────────────────────────────────────────

    /// Registers a shader, deriving its variant masks from the token stream.
    pub fn register_shader(
        &mut self,
        ctx: &PipelineContext,
        decl: ShaderDecl,
        tokens: Vec<u32>,
    ) -> Result<ShaderKey> {
        let (masks, flags) = derive_masks(ctx.registry(), &decl, &tokens)?;
        let content_hash = token_stream_hash(&tokens);
        log::debug!(
            "registered shader '{}' ({}, hash {:#018x})",
            decl.name,
            decl.kind.name(),
            content_hash
        );
        Ok(self.shaders.insert(ShaderRecord {
            decl,
            tokens,
            content_hash,
            masks,
            flags,
            variants: FxHashMap::default(),
        }))
    }

    /// Drops a shader and destroys every variant compiled for it,
    /// regardless of outstanding references (editor hot-reload path).
    pub fn unregister_shader(&mut self, compiler: &mut dyn ShaderCompiler, key: ShaderKey) {
        let Some(mut record) = self.shaders.remove(key) else {
            return;
        };
        self.precached.retain(|(k, _)| *k != key);
        for (_, slot) in record.variants.drain() {
            compiler.free_parameter_group(slot.instance.param_group);
            compiler.destroy_program(slot.instance.program);
            self.stats.evicted += 1;
        }
        log::debug!("unregistered shader '{}'", record.decl.name);
    }

    // ── Resolution ───────────────────────────────────────────────────────

    /// Resolves a variant, compiling it on demand.
    ///
    /// The returned instance stays alive until a matching number of
    /// [`release`](Self::release) calls brings its refcount to zero.
    pub fn resolve(
        &mut self,
        ctx: &PipelineContext,
        compiler: &mut dyn ShaderCompiler,
        key: ShaderKey,
        desired: CombinationIdent,
    ) -> Result<Rc<VariantInstance>> {
        let record = self.shaders.get_mut(key).ok_or(VesperError::UnknownShader)?;
        let effective = record.clamp(desired);
        debug_assert!(effective.satisfies(&record.masks));

        if let Some(slot) = record.variants.get_mut(&effective) {
            slot.refs += 1;
            slot.instance.touch(ctx.frame_index());
            self.stats.hits += 1;
            log::trace!(
                "variant hit for '{}' rt {:#x} (refs {})",
                record.decl.name,
                effective.runtime_mask,
                slot.refs
            );
            return Ok(Rc::clone(&slot.instance));
        }

        self.stats.misses += 1;
        if !ctx.allow_compilation() {
            return Err(VesperError::CompilationDisabled {
                shader: record.decl.name.clone(),
            });
        }

        let compiled = compiler
            .compile(&record.tokens, &record.decl.entry_point, &effective)
            .map_err(|failure| VesperError::Compile {
                shader: record.decl.name.clone(),
                reason: failure.to_string(),
            })?;
        let param_group = compiler.allocate_parameter_group(&ParameterLayout {
            kind: record.decl.kind,
            data_size: compiled.data_size,
        });

        let instance = Rc::new(VariantInstance {
            ident: effective,
            program: compiled.handle,
            data_size: compiled.data_size,
            param_group,
            last_access: Cell::new(ctx.frame_index()),
        });
        self.stats.compiled += 1;
        log::debug!(
            "compiled variant for '{}' rt {:#x} md {:#x} lt {} (group {:?})",
            record.decl.name,
            effective.runtime_mask,
            effective.modifier_mask,
            effective.light_class,
            param_group
        );
        record.variants.insert(
            effective,
            VariantSlot {
                instance: Rc::clone(&instance),
                refs: 1,
            },
        );
        Ok(instance)
    }

    /// Releases one reference to a variant. At refcount zero the parameter
    /// group is freed, the program destroyed, and the entry erased.
    ///
    /// `desired` is clamped exactly like in [`resolve`](Self::resolve), so
    /// callers may pass the identity they originally requested.
    pub fn release(
        &mut self,
        compiler: &mut dyn ShaderCompiler,
        key: ShaderKey,
        desired: CombinationIdent,
    ) {
        let Some(record) = self.shaders.get_mut(key) else {
            log::warn!("release against unknown shader key");
            return;
        };
        let effective = record.clamp(desired);
        let Entry::Occupied(mut occupied) = record.variants.entry(effective) else {
            log::warn!(
                "release of unresolved variant for '{}' rt {:#x}",
                record.decl.name,
                effective.runtime_mask
            );
            return;
        };
        occupied.get_mut().refs -= 1;
        if occupied.get().refs > 0 {
            return;
        }
        let slot = occupied.remove();
        compiler.free_parameter_group(slot.instance.param_group);
        compiler.destroy_program(slot.instance.program);
        self.stats.evicted += 1;
        log::trace!(
            "evicted variant for '{}' rt {:#x}",
            record.decl.name,
            effective.runtime_mask
        );
    }

    // ── Precache Path ────────────────────────────────────────────────────

    /// Compiles a variant ahead of use and parks the reference inside the
    /// cache so it survives with no outside holder.
    pub fn precache(
        &mut self,
        ctx: &PipelineContext,
        compiler: &mut dyn ShaderCompiler,
        key: ShaderKey,
        desired: CombinationIdent,
    ) -> Result<()> {
        let instance = self.resolve(ctx, compiler, key, desired)?;
        self.precached.push((key, instance.ident()));
        Ok(())
    }

    /// Drops all references parked by [`precache`](Self::precache).
    pub fn release_precached(&mut self, compiler: &mut dyn ShaderCompiler) {
        let parked = std::mem::take(&mut self.precached);
        for (key, ident) in parked {
            self.release(compiler, key, ident);
        }
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// Variant masks of a registered shader.
    #[must_use]
    pub fn masks(&self, key: ShaderKey) -> Option<VariantMasks> {
        self.shaders.get(key).map(|r| r.masks)
    }

    /// Structural capability flags of a registered shader.
    #[must_use]
    pub fn structural_flags(&self, key: ShaderKey) -> Option<StructuralFlags> {
        self.shaders.get(key).map(|r| r.flags)
    }

    /// Token-stream content hash of a registered shader.
    #[must_use]
    pub fn content_hash(&self, key: ShaderKey) -> Option<u64> {
        self.shaders.get(key).map(|r| r.content_hash)
    }

    /// Number of live variants for one shader.
    #[must_use]
    pub fn variant_count(&self, key: ShaderKey) -> usize {
        self.shaders.get(key).map_or(0, |r| r.variants.len())
    }

    /// Number of live variants across all shaders.
    #[must_use]
    pub fn total_variants(&self) -> usize {
        self.shaders.values().map(|r| r.variants.len()).sum()
    }

    #[must_use]
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
