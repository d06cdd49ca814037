//! Reentrancy guards for hotspot toggles.
//!
//! At most one open and one close may be in flight. A guard marks its
//! operation busy for as long as it lives and clears the flag on drop, so
//! every exit path (success, error, cancelled future) releases it.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;
use crate::api::models::{ConnmanError, HotspotOp};

#[derive(Debug, Default)]
pub(crate) struct HotspotFlags {
    opening: AtomicBool,
    closing: AtomicBool,
}

impl HotspotFlags {
    fn flag(&self, op: HotspotOp) -> &AtomicBool {
        match op {
            HotspotOp::Opening => &self.opening,
            HotspotOp::Closing => &self.closing,
        }
    }

    /// Marks `op` busy, or fails with `HotspotBusy(op)` if it already is.
    pub(crate) fn acquire(&self, op: HotspotOp) -> Result<HotspotGuard<'_>> {
        let flag = self.flag(op);
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConnmanError::HotspotBusy(op));
        }
        Ok(HotspotGuard { flag })
    }

    #[cfg(test)]
    fn is_busy(&self, op: HotspotOp) -> bool {
        self.flag(op).load(Ordering::Acquire)
    }
}

#[must_use]
pub(crate) struct HotspotGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for HotspotGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
