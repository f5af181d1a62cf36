//! Shader Variant Resolution
//!
//! Provides:
//! - token codes and the global feature registry ([`token`])
//! - the guard expression evaluator ([`expr`])
//! - allow/forced mask derivation ([`mask`])
//! - the combination identity ([`ident`])
//! - the external compilation boundary ([`compile`])
//! - the reference-counted variant cache ([`cache`])

pub mod cache;
pub mod compile;
pub mod expr;
pub mod ident;
pub mod mask;
pub mod token;

pub use cache::{CacheStats, ShaderKey, VariantCache, VariantInstance};
pub use compile::{CompileFailure, CompiledProgram, GroupIndex, ParameterLayout, ProgramHandle, ShaderCompiler};
pub use expr::{evaluate_guard, GuardScan};
pub use ident::{reduce_light_class, CombinationIdent};
pub use mask::{derive_masks, KindTraits, ProgramKind, ShaderDecl, VariantMasks};
pub use token::{
    structural_flag_for, token_stream_hash, tok, FeatureBit, FeatureRegistry, ShaderType,
    StructuralFlags,
};
