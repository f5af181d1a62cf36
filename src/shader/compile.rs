//! Shader Compilation Service Boundary
//!
//! The concrete compiler (driver shader compiler, offline cache, remote
//! compile farm…) lives outside this crate. The variant cache talks to it
//! through [`ShaderCompiler`], the narrow interface below. A compile may be
//! serviced on background workers, but every call into this trait happens on
//! the designated rendering thread.

use thiserror::Error;

use super::ident::CombinationIdent;
use super::mask::ProgramKind;

/// Opaque handle to a compiled GPU program, owned by the service.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramHandle(pub u64);

/// Index of an allocated parameter-binding group.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GroupIndex(pub u32);

/// Successful compilation result.
#[derive(Debug, Clone, Copy)]
pub struct CompiledProgram {
    pub handle: ProgramHandle,
    /// Size in bytes of the variant's constant data block.
    pub data_size: usize,
}

/// Layout request for a parameter-binding group.
#[derive(Debug, Clone, Copy)]
pub struct ParameterLayout {
    pub kind: ProgramKind,
    pub data_size: usize,
}

/// Failure reported by the compilation service.
///
/// Mapped to [`VesperError::Compile`](crate::errors::VesperError::Compile)
/// at the cache boundary, where the shader name is attached.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CompileFailure(pub String);

/// External shader compilation service.
pub trait ShaderCompiler {
    /// Compiles the variant selected by `ident` from the shader's token
    /// stream. Blocks until the program is usable.
    fn compile(
        &mut self,
        tokens: &[u32],
        entry_point: &str,
        ident: &CombinationIdent,
    ) -> Result<CompiledProgram, CompileFailure>;

    /// Allocates a parameter-binding group for a freshly compiled variant.
    fn allocate_parameter_group(&mut self, layout: &ParameterLayout) -> GroupIndex;

    /// Returns a parameter-binding group to the service's free list.
    fn free_parameter_group(&mut self, group: GroupIndex);

    /// Releases the device resources behind a compiled program.
    fn destroy_program(&mut self, program: ProgramHandle);
}
