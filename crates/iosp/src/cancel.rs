//! Cooperative cancellation for long decode loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cdm_common::{CdmError, CdmResult};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clear the flag so later reads run again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Checkpoint: fail with `Cancelled` once the flag is set.
    pub fn check(&self, completed: usize, total: usize) -> CdmResult<()> {
        if self.is_cancelled() {
            Err(CdmError::Cancelled { completed, total })
        } else {
            Ok(())
        }
    }
}
