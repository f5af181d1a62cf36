//! Stage Graph Scheduling
//!
//! Provides:
//! - the external device-resource boundary ([`device`])
//! - the shared resource pool ([`pool`])
//! - the stage abstraction and lifecycle ([`stage`])
//! - the ordered stage scheduler ([`scheduler`])

pub mod device;
pub mod pool;
pub mod scheduler;
pub mod stage;

pub use device::{DeviceAllocationError, DeviceLayer, TargetDesc, TargetFormat, TargetHandle};
pub use pool::{PoolSlot, PoolSlotDesc, PoolSlotKey, SharedResourcePool, SlotSizing};
pub use scheduler::StageScheduler;
pub use stage::{FrameFlags, FrameInfo, Stage, StageContext, StageIo, StageState};
