//! Shared Resource Pool
//!
//! Pipeline-scoped intermediate render targets shared across stages. Slots
//! are declared once by name (during stage initialization), allocated and
//! reallocated only at the pre-frame resize point, and referenced by name or
//! key from any stage.
//!
//! Exactly one stage is the primary writer of a slot per frame — by
//! convention, not by type enforcement. A wrong declaration order between a
//! producer and a consumer is a silent visual defect, not an error this
//! pool can detect.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use super::device::{DeviceLayer, TargetDesc, TargetFormat, TargetHandle};
use crate::errors::{Result, VesperError};

new_key_type! {
    /// Generational handle to a pool slot.
    pub struct PoolSlotKey;
}

// ─── Slot Descriptors ─────────────────────────────────────────────────────────

/// Sizing rule for a pool slot, evaluated against the output resolution.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotSizing {
    /// Full output resolution.
    Screen,
    /// Output resolution divided by the given denominator (min 1×1).
    ScreenFraction(u32),
    /// Resolution-independent fixed size.
    Fixed(u32, u32),
}

impl SlotSizing {
    /// Concrete dimensions at the given output resolution.
    #[must_use]
    pub fn dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::Screen => (width, height),
            Self::ScreenFraction(denom) => {
                let d = denom.max(1);
                ((width / d).max(1), (height / d).max(1))
            }
            Self::Fixed(w, h) => (w, h),
        }
    }
}

/// Declaration of one named pool slot.
#[derive(Clone, Debug)]
pub struct PoolSlotDesc {
    pub name: &'static str,
    pub format: TargetFormat,
    pub sizing: SlotSizing,
}

/// A pool slot and its current allocation.
#[derive(Debug)]
pub struct PoolSlot {
    desc: PoolSlotDesc,
    target: Option<TargetHandle>,
    width: u32,
    height: u32,
}

impl PoolSlot {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> TargetFormat {
        self.desc.format
    }

    /// Current allocation, `None` before the first resize.
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<TargetHandle> {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
}

// ─── Pool ─────────────────────────────────────────────────────────────────────

/// Name-keyed pool of pipeline-scoped render targets.
pub struct SharedResourcePool {
    slots: SlotMap<PoolSlotKey, PoolSlot>,
    by_name: FxHashMap<&'static str, PoolSlotKey>,
    width: u32,
    height: u32,
}

impl Default for SharedResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedResourcePool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            by_name: FxHashMap::default(),
            width: 0,
            height: 0,
        }
    }

    /// Declares a slot. Idempotent by name: a second declaration returns
    /// the existing key and the first declaration wins.
    pub fn declare(&mut self, desc: PoolSlotDesc) -> PoolSlotKey {
        if let Some(&key) = self.by_name.get(desc.name) {
            debug_assert_eq!(
                self.slots[key].desc.format, desc.format,
                "slot '{}' redeclared with a different format",
                desc.name
            );
            return key;
        }
        let name = desc.name;
        let key = self.slots.insert(PoolSlot {
            desc,
            target: None,
            width: 0,
            height: 0,
        });
        self.by_name.insert(name, key);
        log::debug!("declared pool slot '{name}'");
        key
    }

    /// Key of a declared slot.
    #[must_use]
    pub fn key(&self, name: &str) -> Option<PoolSlotKey> {
        self.by_name.get(name).copied()
    }

    /// Slot by key. **Panics** if the key is stale.
    #[inline]
    #[must_use]
    pub fn slot(&self, key: PoolSlotKey) -> &PoolSlot {
        &self.slots[key]
    }

    /// Current allocation for a named slot.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<TargetHandle> {
        self.key(name).and_then(|k| self.slots[k].target)
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Reallocates every slot for the new output resolution.
    ///
    /// Completes synchronously before any stage executes at the new size.
    /// Slots already at their target dimensions are left untouched. On a
    /// device failure the affected slot keeps its previous allocation and
    /// the error propagates; the owning stage is expected to deactivate
    /// until a later resize succeeds.
    pub fn resize(&mut self, device: &mut dyn DeviceLayer, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        for slot in self.slots.values_mut() {
            let (w, h) = slot.desc.sizing.dimensions(width, height);
            if slot.target.is_some() && slot.width == w && slot.height == h {
                continue;
            }
            let desc = TargetDesc {
                label: slot.desc.name,
                width: w,
                height: h,
                format: slot.desc.format,
            };
            let target = device.create_target(&desc).map_err(|e| {
                VesperError::ResourceAllocation {
                    label: slot.desc.name.to_owned(),
                    width: w,
                    height: h,
                    reason: e.to_string(),
                }
            })?;
            if let Some(old) = slot.target.take() {
                device.release_target(old);
            }
            slot.target = Some(target);
            slot.width = w;
            slot.height = h;
            log::trace!("pool slot '{}' resized to {w}x{h}", slot.desc.name);
        }
        Ok(())
    }

    /// Releases every allocation. Slot declarations survive; the next
    /// resize reallocates.
    pub fn release_all(&mut self, device: &mut dyn DeviceLayer) {
        for slot in self.slots.values_mut() {
            if let Some(target) = slot.target.take() {
                device.release_target(target);
            }
            slot.width = 0;
            slot.height = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_rules() {
        assert_eq!(SlotSizing::Screen.dimensions(1920, 1080), (1920, 1080));
        assert_eq!(SlotSizing::ScreenFraction(2).dimensions(1920, 1080), (960, 540));
        assert_eq!(SlotSizing::ScreenFraction(0).dimensions(8, 8), (8, 8));
        // Fractions never collapse to zero.
        assert_eq!(SlotSizing::ScreenFraction(16).dimensions(8, 8), (1, 1));
        assert_eq!(SlotSizing::Fixed(256, 256).dimensions(1920, 1080), (256, 256));
    }

    #[test]
    fn declare_is_idempotent_by_name() {
        let mut pool = SharedResourcePool::new();
        let desc = PoolSlotDesc {
            name: "scene_color",
            format: TargetFormat::Rgba16Float,
            sizing: SlotSizing::Screen,
        };
        let a = pool.declare(desc.clone());
        let b = pool.declare(desc);
        assert_eq!(a, b);
        assert_eq!(pool.slot_count(), 1);
    }
}
