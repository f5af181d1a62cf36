//! Stage Scheduler Tests
//!
//! Tests for:
//! - declared order: the per-pass call sequence is exactly the active
//!   subsequence of the stage list, never reordered or duplicated
//! - activation predicates over frame flags and quality settings
//! - synchronous pool reallocation before any stage executes at a new size
//! - settings hot-reload delivery to inactive stages
//! - shutdown releasing every device allocation exactly once

use std::cell::RefCell;
use std::rc::Rc;

use vesper::graph::device::{DeviceAllocationError, DeviceLayer, TargetDesc, TargetHandle};
use vesper::graph::pool::{PoolSlotDesc, SlotSizing};
use vesper::graph::stage::{FrameFlags, FrameInfo, Stage, StageContext, StageIo};
use vesper::graph::TargetFormat;
use vesper::settings::{QualityLevel, QualitySettings, SettingsDelta};
use vesper::{PipelineContext, StageScheduler};

type EventLog = Rc<RefCell<Vec<String>>>;

// ============================================================================
// Recording Device
// ============================================================================

/// Fake device that hands out sequential target handles and tracks the live
/// set, so tests can assert exact allocation/teardown pairing.
#[derive(Default)]
struct RecordingDevice {
    next_handle: u64,
    live: Vec<TargetHandle>,
    created: Vec<(String, u32, u32)>,
    fail_next: bool,
}

impl DeviceLayer for RecordingDevice {
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, DeviceAllocationError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(DeviceAllocationError("out of device memory".into()));
        }
        let handle = TargetHandle(self.next_handle);
        self.next_handle += 1;
        self.live.push(handle);
        self.created.push((desc.label.to_owned(), desc.width, desc.height));
        Ok(handle)
    }

    fn release_target(&mut self, target: TargetHandle) {
        let pos = self
            .live
            .iter()
            .position(|t| *t == target)
            .expect("double release of target");
        self.live.swap_remove(pos);
    }
}

// ============================================================================
// Probe Stages
// ============================================================================

/// Stage activated by one frame flag; records every lifecycle call.
struct FlagStage {
    name: &'static str,
    flag: FrameFlags,
    log: EventLog,
    slot: Option<PoolSlotDesc>,
}

impl FlagStage {
    fn new(name: &'static str, flag: FrameFlags, log: &EventLog) -> Box<Self> {
        Box::new(Self {
            name,
            flag,
            log: Rc::clone(log),
            slot: None,
        })
    }

    fn with_slot(mut self: Box<Self>, slot: PoolSlotDesc) -> Box<Self> {
        self.slot = Some(slot);
        self
    }

    fn push(&self, event: &str) {
        self.log.borrow_mut().push(format!("{}:{event}", self.name));
    }
}

impl Stage for FlagStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn declared_io(&self) -> StageIo {
        match &self.slot {
            Some(slot) => StageIo::new(&[], &[slot.name]),
            None => StageIo::default(),
        }
    }

    fn is_active(&self, frame: &FrameInfo) -> bool {
        frame.flags.contains(self.flag)
    }

    fn init(&mut self, ctx: &mut StageContext) -> vesper::Result<()> {
        if let Some(slot) = &self.slot {
            ctx.pool.declare(slot.clone());
        }
        self.push("init");
        Ok(())
    }

    fn resize(&mut self, _ctx: &mut StageContext, width: u32, height: u32) -> vesper::Result<()> {
        self.push(&format!("resize {width}x{height}"));
        Ok(())
    }

    fn update(&mut self, _ctx: &mut StageContext) {
        self.push("update");
    }

    fn execute(&mut self, _ctx: &mut StageContext) {
        self.push("execute");
    }

    fn on_settings_changed(&mut self, _ctx: &mut StageContext, delta: SettingsDelta) {
        self.push(&format!("settings {delta:?}"));
    }

    fn shutdown(&mut self, _ctx: &mut StageContext) {
        self.push("shutdown");
    }
}

/// Stage gated on the persisted post-processing quality level.
struct QualityGatedStage {
    min: QualityLevel,
    log: EventLog,
}

impl Stage for QualityGatedStage {
    fn name(&self) -> &'static str {
        "bloom"
    }

    fn is_active(&self, frame: &FrameInfo) -> bool {
        frame.settings.post_processing >= self.min
    }

    fn init(&mut self, _ctx: &mut StageContext) -> vesper::Result<()> {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut StageContext) {
        self.log.borrow_mut().push("bloom:update".into());
    }

    fn execute(&mut self, _ctx: &mut StageContext) {
        self.log.borrow_mut().push("bloom:execute".into());
    }
}

/// Stage that records the frame index each lifecycle hook observes.
struct ClockStage {
    log: EventLog,
}

impl ClockStage {
    fn push(&self, event: &str, frame: &FrameInfo) {
        self.log
            .borrow_mut()
            .push(format!("clock:{event} f{}", frame.frame_index));
    }
}

impl Stage for ClockStage {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn is_active(&self, _frame: &FrameInfo) -> bool {
        true
    }

    fn init(&mut self, _ctx: &mut StageContext) -> vesper::Result<()> {
        Ok(())
    }

    fn resize(&mut self, ctx: &mut StageContext, _width: u32, _height: u32) -> vesper::Result<()> {
        self.push("resize", ctx.frame);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut StageContext) {
        self.push("execute", ctx.frame);
    }

    fn on_settings_changed(&mut self, ctx: &mut StageContext, _delta: SettingsDelta) {
        self.push("settings", ctx.frame);
    }
}

/// Stage that verifies, during execute, that every declared slot already
/// matches the current output resolution.
struct SizeCheckStage;

impl Stage for SizeCheckStage {
    fn name(&self) -> &'static str {
        "size_check"
    }

    fn is_active(&self, _frame: &FrameInfo) -> bool {
        true
    }

    fn init(&mut self, ctx: &mut StageContext) -> vesper::Result<()> {
        ctx.pool.declare(PoolSlotDesc {
            name: "scene_color",
            format: TargetFormat::Rgba16Float,
            sizing: SlotSizing::Screen,
        });
        ctx.pool.declare(PoolSlotDesc {
            name: "bloom_half",
            format: TargetFormat::Rgba16Float,
            sizing: SlotSizing::ScreenFraction(2),
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut StageContext) {
        for (name, sizing) in [
            ("scene_color", SlotSizing::Screen),
            ("bloom_half", SlotSizing::ScreenFraction(2)),
        ] {
            let key = ctx.pool.key(name).expect("slot declared in init");
            let slot = ctx.pool.slot(key);
            let (w, h) = sizing.dimensions(ctx.pool.width(), ctx.pool.height());
            assert!(slot.target().is_some(), "slot '{name}' unallocated");
            assert_eq!((slot.width(), slot.height()), (w, h), "slot '{name}' stale");
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn harness() -> (PipelineContext, RecordingDevice) {
    let _ = env_logger::builder().is_test(true).try_init();
    (PipelineContext::new(), RecordingDevice::default())
}

fn events(log: &EventLog) -> Vec<String> {
    log.borrow().clone()
}

fn drain(log: &EventLog) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn active_stages_run_in_declared_order() {
    let log: EventLog = EventLog::default();
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(FlagStage::new("shadows", FrameFlags::SHADOWS, &log));
    scheduler.add_stage(FlagStage::new("opaque", FrameFlags::empty(), &log));
    scheduler.add_stage(FlagStage::new("water", FrameFlags::WATER, &log));
    scheduler.add_stage(FlagStage::new("post", FrameFlags::POST_PROCESSING, &log));
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();
    drain(&log);

    scheduler.execute(&mut ctx, &mut device, FrameFlags::SHADOWS | FrameFlags::POST_PROCESSING);
    assert_eq!(
        drain(&log),
        [
            "shadows:update",
            "shadows:execute",
            "opaque:update",
            "opaque:execute",
            "post:update",
            "post:execute",
        ]
    );
    assert_eq!(scheduler.was_active("water"), Some(false));
    assert_eq!(scheduler.was_active("post"), Some(true));

    // A later pass with different flags re-evaluates every predicate.
    scheduler.execute(&mut ctx, &mut device, FrameFlags::WATER);
    assert_eq!(
        drain(&log),
        ["opaque:update", "opaque:execute", "water:update", "water:execute"]
    );
}

#[test]
fn no_stage_runs_twice_per_pass() {
    let log: EventLog = EventLog::default();
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    for name in ["a", "b", "c"] {
        scheduler.add_stage(FlagStage::new(name, FrameFlags::empty(), &log));
    }
    scheduler.init(&ctx, &mut device, 640, 480).unwrap();
    drain(&log);

    scheduler.execute(&mut ctx, &mut device, FrameFlags::all());
    let pass = drain(&log);
    for name in ["a", "b", "c"] {
        let executes = pass.iter().filter(|e| *e == &format!("{name}:execute")).count();
        assert_eq!(executes, 1, "stage '{name}' executed {executes} times");
    }
}

#[test]
fn frame_clock_advances_once_per_pass() {
    let log: EventLog = EventLog::default();
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(FlagStage::new("opaque", FrameFlags::empty(), &log));
    scheduler.init(&ctx, &mut device, 640, 480).unwrap();

    // Stereo drivers run the scheduler twice per display frame; each pass
    // still ticks the clock.
    scheduler.execute(&mut ctx, &mut device, FrameFlags::empty());
    scheduler.execute(&mut ctx, &mut device, FrameFlags::SECONDARY_EYE);
    assert_eq!(ctx.frame_index(), 2);
}

#[test]
fn lifecycle_hooks_observe_the_frame_clock() {
    let log: EventLog = EventLog::default();
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(Box::new(ClockStage { log: Rc::clone(&log) }));
    scheduler.init(&ctx, &mut device, 640, 480).unwrap();
    drain(&log);

    scheduler.execute(&mut ctx, &mut device, FrameFlags::empty());
    scheduler.execute(&mut ctx, &mut device, FrameFlags::empty());
    // Resize and settings hooks see the clock where it stands, not zero.
    scheduler.resize(&ctx, &mut device, 1280, 720).unwrap();
    scheduler.on_config_changed(&ctx, &mut device, QualitySettings::uniform(QualityLevel::High));
    assert_eq!(
        drain(&log),
        ["clock:execute f0", "clock:execute f1", "clock:resize f2", "clock:settings f2"]
    );
}

// ============================================================================
// Quality Gating
// ============================================================================

#[test]
fn quality_gated_stage_skips_below_threshold() {
    let log: EventLog = EventLog::default();
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::uniform(QualityLevel::Low));
    scheduler.add_stage(Box::new(QualityGatedStage {
        min: QualityLevel::Medium,
        log: Rc::clone(&log),
    }));
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();

    scheduler.execute(&mut ctx, &mut device, FrameFlags::POST_PROCESSING);
    assert!(events(&log).is_empty());
    assert_eq!(scheduler.was_active("bloom"), Some(false));

    scheduler.on_config_changed(&ctx, &mut device, QualitySettings::uniform(QualityLevel::High));
    scheduler.execute(&mut ctx, &mut device, FrameFlags::POST_PROCESSING);
    assert_eq!(drain(&log), ["bloom:update", "bloom:execute"]);
}

#[test]
fn settings_changes_reach_inactive_stages() {
    let log: EventLog = EventLog::default();
    let (ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::uniform(QualityLevel::Medium));
    // Never active: its flag is never passed.
    scheduler.add_stage(FlagStage::new("debug", FrameFlags::DEBUG_OVERLAY, &log));
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();
    drain(&log);

    let mut next = QualitySettings::uniform(QualityLevel::Medium);
    next.shadows = QualityLevel::VeryHigh;
    scheduler.on_config_changed(&ctx, &mut device, next);
    assert_eq!(drain(&log), [format!("debug:settings {:?}", SettingsDelta::SHADOWS)]);

    // Unchanged settings produce no notification.
    scheduler.on_config_changed(&ctx, &mut device, next);
    assert!(events(&log).is_empty());
}

// ============================================================================
// Pool Resizing
// ============================================================================

#[test]
fn pool_is_current_before_any_execute() {
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(Box::new(SizeCheckStage));
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();
    scheduler.execute(&mut ctx, &mut device, FrameFlags::empty());

    scheduler.resize(&ctx, &mut device, 1920, 1080).unwrap();
    scheduler.execute(&mut ctx, &mut device, FrameFlags::empty());

    // Half-resolution slot followed the output size both times.
    assert!(device.created.contains(&("bloom_half".to_owned(), 400, 300)));
    assert!(device.created.contains(&("bloom_half".to_owned(), 960, 540)));
    assert_eq!(device.live.len(), 2);
}

#[test]
fn resize_to_same_size_reallocates_nothing() {
    let (ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(Box::new(SizeCheckStage));
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();
    let created = device.created.len();
    scheduler.resize(&ctx, &mut device, 800, 600).unwrap();
    assert_eq!(device.created.len(), created);
}

#[test]
fn failed_allocation_keeps_previous_target_and_propagates() {
    let (ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(Box::new(SizeCheckStage));
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();
    let before = scheduler.pool().target("scene_color");

    device.fail_next = true;
    let err = scheduler.resize(&ctx, &mut device, 1920, 1080);
    assert!(err.is_err());
    // The slot that failed still holds its old allocation.
    assert_eq!(scheduler.pool().target("scene_color"), before);

    // A later resize recovers.
    scheduler.resize(&ctx, &mut device, 1920, 1080).unwrap();
    let key = scheduler.pool().key("scene_color").unwrap();
    let slot = scheduler.pool().slot(key);
    assert_eq!((slot.width(), slot.height()), (1920, 1080));
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn shutdown_runs_once_and_releases_every_target() {
    let log: EventLog = EventLog::default();
    let (mut ctx, mut device) = harness();
    let mut scheduler = StageScheduler::new(QualitySettings::default());
    scheduler.add_stage(
        FlagStage::new("opaque", FrameFlags::empty(), &log).with_slot(PoolSlotDesc {
            name: "scene_depth",
            format: TargetFormat::Depth32Float,
            sizing: SlotSizing::Screen,
        }),
    );
    scheduler.init(&ctx, &mut device, 800, 600).unwrap();
    assert!(!device.live.is_empty());
    drain(&log);

    scheduler.shutdown(&ctx, &mut device);
    scheduler.shutdown(&ctx, &mut device);
    assert_eq!(drain(&log), ["opaque:shutdown"]);
    assert!(device.live.is_empty());

    // Shut-down stages never run again.
    scheduler.execute(&mut ctx, &mut device, FrameFlags::all());
    assert!(events(&log).is_empty());
}
