//! Stage Graph Scheduler
//!
//! Owns the ordered stage list and the shared resource pool. Per execution
//! it evaluates every activation predicate and invokes the active stages'
//! `update` + `execute` in declared order. Inactive stages are skipped
//! entirely; their pool allocations are retained at the last size.
//!
//! The scheduler performs no dependency analysis: "stage N reads what stage
//! N−1 wrote" is an invariant of declaration order. The frame driver may
//! call [`execute`](StageScheduler::execute) twice per frame for stereo
//! rendering; that is not the scheduler's concern.

use super::device::DeviceLayer;
use super::pool::SharedResourcePool;
use super::stage::{FrameFlags, FrameInfo, Stage, StageContext, StageState};
use crate::context::PipelineContext;
use crate::errors::Result;
use crate::settings::QualitySettings;

struct StageEntry {
    stage: Box<dyn Stage>,
    state: StageState,
    /// Result of the most recent predicate evaluation.
    active: bool,
}

/// Ordered scheduler for conditionally active rendering stages.
pub struct StageScheduler {
    entries: Vec<StageEntry>,
    pool: SharedResourcePool,
    settings: QualitySettings,
    width: u32,
    height: u32,
}

impl StageScheduler {
    #[must_use]
    pub fn new(settings: QualitySettings) -> Self {
        Self {
            entries: Vec::new(),
            pool: SharedResourcePool::new(),
            settings,
            width: 0,
            height: 0,
        }
    }

    // ── Registration ─────────────────────────────────────────────────────

    /// Appends a stage. Declaration order is execution order, fixed for the
    /// scheduler's lifetime. Register all stages before [`init`](Self::init).
    pub fn add_stage(&mut self, stage: Box<dyn Stage>) {
        log::debug!("registered stage '{}' at index {}", stage.name(), self.entries.len());
        self.entries.push(StageEntry {
            stage,
            state: StageState::Uninitialized,
            active: false,
        });
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn pool(&self) -> &SharedResourcePool {
        &self.pool
    }

    #[must_use]
    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Most recent predicate result for a stage, `None` if unknown.
    #[must_use]
    pub fn was_active(&self, name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| e.stage.name() == name)
            .map(|e| e.active)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Initializes every registered stage in order, then performs the
    /// initial pool allocation at the given resolution.
    pub fn init(
        &mut self,
        ctx: &PipelineContext,
        device: &mut dyn DeviceLayer,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let frame = FrameInfo {
            flags: FrameFlags::empty(),
            settings: self.settings,
            frame_index: ctx.frame_index(),
        };
        for entry in &mut self.entries {
            if entry.state != StageState::Uninitialized {
                continue;
            }
            let io = entry.stage.declared_io();
            let mut sc = StageContext {
                device,
                pool: &mut self.pool,
                frame: &frame,
            };
            entry.stage.init(&mut sc)?;
            entry.state = StageState::Initialized;
            log::debug!(
                "stage '{}' initialized (reads {:?}, writes {:?})",
                entry.stage.name(),
                io.reads,
                io.writes
            );
        }
        self.resize(ctx, device, width, height)
    }

    /// Output resolution changed. The pool reallocates synchronously before
    /// any stage observes the new size; stage `resize` hooks run after.
    pub fn resize(
        &mut self,
        ctx: &PipelineContext,
        device: &mut dyn DeviceLayer,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.width = width;
        self.height = height;
        self.pool.resize(device, width, height)?;
        let frame = FrameInfo {
            flags: FrameFlags::empty(),
            settings: self.settings,
            frame_index: ctx.frame_index(),
        };
        for entry in &mut self.entries {
            if entry.state != StageState::Initialized {
                continue;
            }
            let mut sc = StageContext {
                device,
                pool: &mut self.pool,
                frame: &frame,
            };
            entry.stage.resize(&mut sc, width, height)?;
        }
        log::debug!("scheduler resized to {width}x{height}");
        Ok(())
    }

    /// Runs one scheduler pass: evaluates every predicate, then invokes
    /// `update` + `execute` on the active stages in declared order.
    pub fn execute(
        &mut self,
        ctx: &mut PipelineContext,
        device: &mut dyn DeviceLayer,
        flags: FrameFlags,
    ) {
        let frame = FrameInfo {
            flags,
            settings: self.settings,
            frame_index: ctx.frame_index(),
        };
        for entry in &mut self.entries {
            if entry.state != StageState::Initialized {
                entry.active = false;
                continue;
            }
            entry.active = entry.stage.is_active(&frame);
            if !entry.active {
                log::trace!("stage '{}' skipped", entry.stage.name());
                continue;
            }
            let mut sc = StageContext {
                device,
                pool: &mut self.pool,
                frame: &frame,
            };
            entry.stage.update(&mut sc);
            entry.stage.execute(&mut sc);
        }
        ctx.advance_frame();
    }

    /// Applies new quality settings, forwarding the change set to every
    /// initialized stage (active or not).
    pub fn on_config_changed(
        &mut self,
        ctx: &PipelineContext,
        device: &mut dyn DeviceLayer,
        next: QualitySettings,
    ) {
        let delta = self.settings.delta(&next);
        if delta.is_empty() {
            return;
        }
        self.settings = next;
        log::debug!("quality settings changed: {delta:?}");
        let frame = FrameInfo {
            flags: FrameFlags::empty(),
            settings: self.settings,
            frame_index: ctx.frame_index(),
        };
        for entry in &mut self.entries {
            if entry.state != StageState::Initialized {
                continue;
            }
            let mut sc = StageContext {
                device,
                pool: &mut self.pool,
                frame: &frame,
            };
            entry.stage.on_settings_changed(&mut sc, delta);
        }
    }

    /// Shuts every stage down once and releases all pool allocations.
    /// Idempotent.
    pub fn shutdown(&mut self, ctx: &PipelineContext, device: &mut dyn DeviceLayer) {
        let frame = FrameInfo {
            flags: FrameFlags::empty(),
            settings: self.settings,
            frame_index: ctx.frame_index(),
        };
        for entry in &mut self.entries {
            if entry.state != StageState::Initialized {
                continue;
            }
            let mut sc = StageContext {
                device,
                pool: &mut self.pool,
                frame: &frame,
            };
            entry.stage.shutdown(&mut sc);
            entry.state = StageState::ShutDown;
            entry.active = false;
        }
        self.pool.release_all(device);
    }
}
