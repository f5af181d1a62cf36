//! Error Types
//!
//! The crate-level error type [`VesperError`] covers all failure modes of the
//! renderer core:
//! - shader variant compilation failures (surfaced to the resolve caller,
//!   which owns the fallback policy)
//! - configuration / combination-identity precondition violations
//! - render-target allocation failures during pool resizes
//!
//! All public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, VesperError>`. Nothing in this crate retries a
//! failed operation on its own.

use thiserror::Error;

/// The main error type for the Vesper renderer core.
#[derive(Error, Debug)]
pub enum VesperError {
    // ========================================================================
    // Shader Variant Errors
    // ========================================================================
    /// The external compilation service rejected a requested variant.
    ///
    /// The cache never substitutes another variant implicitly; the caller
    /// must pick a fallback combination and resolve again.
    #[error("variant compilation failed for shader '{shader}': {reason}")]
    Compile { shader: String, reason: String },

    /// A cache miss occurred while the global allow-compilation switch is
    /// off. This is a hard failure by contract.
    #[error("no cached variant for shader '{shader}' and compilation is disabled")]
    CompilationDisabled { shader: String },

    /// A requested identity or registration cannot be clamped into any
    /// valid state. Precondition violation; fails fast.
    #[error("invalid shader combination: {0}")]
    Configuration(String),

    /// The global feature registry already holds 64 bits.
    #[error("feature registry is full (64 bits registered)")]
    RegistryFull,

    /// A resolve or release was issued against a shader key that was never
    /// registered (or has been freed).
    #[error("unknown shader key")]
    UnknownShader,

    // ========================================================================
    // Device / Pool Errors
    // ========================================================================
    /// The device layer could not satisfy a render-target allocation during
    /// a pool resize. The affected slot keeps its previous allocation.
    #[error("render target allocation failed for '{label}' ({width}x{height}): {reason}")]
    ResourceAllocation {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VesperError>;
