#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Vesper renderer core: shader variant resolution and stage-graph
//! scheduling.
//!
//! Two coupled subsystems make up this crate. The **variant resolver**
//! derives a combination identity from render state, evaluates per-shader
//! conditional guards to find the legal feature combinations, and caches
//! compiled variants with reference-counted eviction. The **stage
//! scheduler** drives an ordered, conditionally active list of rendering
//! stages that share a pool of intermediate render targets.
//!
//! Graphics-API access (compilation, device memory) stays outside, behind
//! the [`ShaderCompiler`] and [`DeviceLayer`] traits.

pub mod context;
pub mod errors;
pub mod graph;
pub mod settings;
pub mod shader;

pub use context::PipelineContext;
pub use errors::{Result, VesperError};
pub use graph::{
    DeviceLayer, FrameFlags, FrameInfo, PoolSlotDesc, SharedResourcePool, SlotSizing, Stage,
    StageContext, StageIo, StageScheduler, TargetDesc, TargetFormat, TargetHandle,
};
pub use settings::{QualityLevel, QualitySettings, SettingsDelta};
pub use shader::{
    CacheStats, CombinationIdent, CompiledProgram, FeatureRegistry, GroupIndex, ProgramHandle,
    ProgramKind, ShaderCompiler, ShaderDecl, ShaderKey, ShaderType, StructuralFlags, VariantCache,
    VariantInstance, VariantMasks,
};
