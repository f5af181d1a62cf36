//! Device Resource Boundary
//!
//! The concrete GPU device lives outside this crate. The shared resource
//! pool allocates and releases render targets through [`DeviceLayer`], and
//! only does so at the well-defined pre-frame resize point — never while
//! stages are executing.

use thiserror::Error;

/// Opaque handle to a device-owned render target or buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TargetHandle(pub u64);

/// Pixel format of a pooled render target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TargetFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rg16Float,
    R8Unorm,
    Depth32Float,
}

/// Allocation request handed to the device layer.
#[derive(Clone, Debug)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

/// Failure reported by the device layer; mapped to
/// [`VesperError::ResourceAllocation`](crate::errors::VesperError::ResourceAllocation)
/// at the pool boundary.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DeviceAllocationError(pub String);

/// External device/GPU resource layer.
pub trait DeviceLayer {
    /// Creates a render target. May fail under memory pressure.
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, DeviceAllocationError>;

    /// Releases a render target. Infallible by contract.
    fn release_target(&mut self, target: TargetHandle);
}
