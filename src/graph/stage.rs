//! Stage Abstraction
//!
//! A [`Stage`] is one phase of the per-frame pipeline: it owns references
//! into the shared resource pool, exposes a pure activation predicate over
//! the frame flags and the persisted quality settings, and runs through a
//! fixed lifecycle driven by the scheduler:
//!
//! ```text
//! Uninitialized → Initialized → { Active | Inactive } per frame
//!                              → Resized (any time) → ShutDown (once)
//! ```
//!
//! Stages are registered once, in declaration order, and never recreated —
//! only resized. A stage re-activated after being skipped must not assume
//! cross-frame persistence of pool contents it did not itself write every
//! active frame.

use smallvec::SmallVec;

use super::device::DeviceLayer;
use super::pool::SharedResourcePool;
use crate::errors::Result;
use crate::settings::{QualitySettings, SettingsDelta};

bitflags::bitflags! {
    /// Per-frame rendering flags supplied by the frame driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u32 {
        const SHADOWS = 1 << 0;
        const TRANSPARENT = 1 << 1;
        const POST_PROCESSING = 1 << 2;
        const HDR = 1 << 3;
        const WATER = 1 << 4;
        const FOG = 1 << 5;
        const DEBUG_OVERLAY = 1 << 6;
        /// Set by the driver on the second of the two per-frame scheduler
        /// invocations used for stereo rendering.
        const SECONDARY_EYE = 1 << 7;
    }
}

/// Read-only view of the current frame handed to activation predicates.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub flags: FrameFlags,
    pub settings: QualitySettings,
    pub frame_index: u64,
}

/// Lifecycle state tracked per stage by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Uninitialized,
    Initialized,
    ShutDown,
}

/// Declared resource footprint of a stage: pool slot names it reads and
/// writes. Metadata only — the scheduler performs no dependency analysis on
/// it; producer→consumer correctness is an invariant of declaration order.
#[derive(Debug, Clone, Default)]
pub struct StageIo {
    pub reads: SmallVec<[&'static str; 4]>,
    pub writes: SmallVec<[&'static str; 4]>,
}

impl StageIo {
    #[must_use]
    pub fn new(reads: &[&'static str], writes: &[&'static str]) -> Self {
        Self {
            reads: SmallVec::from_slice(reads),
            writes: SmallVec::from_slice(writes),
        }
    }
}

/// Mutable context handed to stage lifecycle methods.
pub struct StageContext<'a> {
    pub device: &'a mut dyn DeviceLayer,
    pub pool: &'a mut SharedResourcePool,
    pub frame: &'a FrameInfo,
}

/// One rendering-work unit in the stage graph.
pub trait Stage {
    /// Stable stage name (ordering diagnostics, logs).
    fn name(&self) -> &'static str;

    /// Declared pool footprint. Used for slot pre-checks and logging only.
    fn declared_io(&self) -> StageIo {
        StageIo::default()
    }

    /// Pure activation predicate, evaluated once per scheduler execution.
    /// Must not mutate state or touch the device.
    fn is_active(&self, frame: &FrameInfo) -> bool;

    /// One-time initialization: declare pool slots, build static state.
    fn init(&mut self, ctx: &mut StageContext) -> Result<()>;

    /// Output resolution changed. Pool slots are already reallocated when
    /// this is called; stages resize only what they own privately.
    fn resize(&mut self, _ctx: &mut StageContext, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    /// Per-frame preparation. Called only when the activation predicate
    /// returned true this frame, immediately before [`execute`](Self::execute).
    fn update(&mut self, _ctx: &mut StageContext) {}

    /// Records the stage's rendering work. Called only after a true
    /// predicate in the same scheduler pass.
    fn execute(&mut self, ctx: &mut StageContext);

    /// Quality settings changed. Delivered to every initialized stage,
    /// active or not; interpretation is per-stage.
    fn on_settings_changed(&mut self, _ctx: &mut StageContext, _delta: SettingsDelta) {}

    /// One-time teardown, before the pool releases its allocations.
    fn shutdown(&mut self, _ctx: &mut StageContext) {}
}
