//! Pipeline Context
//!
//! Explicitly owned, lifetime-scoped state shared by the variant resolver
//! and the stage scheduler: the global feature registry, the
//! allow-compilation switch, and the frame clock. Injected by reference
//! everywhere it is needed — there are no hidden singletons.

use crate::shader::token::FeatureRegistry;

/// Shared pipeline-scoped state.
#[derive(Debug, Default)]
pub struct PipelineContext {
    registry: FeatureRegistry,
    allow_compilation: bool,
    frame_index: u64,
}

impl PipelineContext {
    /// New context with an empty registry and compilation enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: FeatureRegistry::new(),
            allow_compilation: true,
            frame_index: 0,
        }
    }

    /// New context wrapping a pre-populated registry.
    #[must_use]
    pub fn with_registry(registry: FeatureRegistry) -> Self {
        Self {
            registry,
            allow_compilation: true,
            frame_index: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut FeatureRegistry {
        &mut self.registry
    }

    /// Whether on-demand variant compilation is currently permitted.
    ///
    /// When off, a cache miss is a hard failure the caller must resolve via
    /// fallback substitution (shipping builds run with precached variants).
    #[inline]
    #[must_use]
    pub fn allow_compilation(&self) -> bool {
        self.allow_compilation
    }

    pub fn set_allow_compilation(&mut self, allow: bool) {
        self.allow_compilation = allow;
    }

    /// Monotonic frame counter; drives variant last-access timestamps.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Advances the frame clock. Called once per scheduler execution, which
    /// under stereo rendering means once per eye.
    pub fn advance_frame(&mut self) -> u64 {
        self.frame_index += 1;
        self.frame_index
    }
}
