//! Cooperative cancellation for long-running transforms
//!
//! The preprocessing and feature stages check the token between stages and
//! per channel, so an in-flight pipeline can be abandoned at shutdown
//! instead of running to completion.

use crate::error::{EegError, EegResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checkpoint: returns `Err(Cancelled)` once the token has fired
    pub fn check(&self) -> EegResult<()> {
        if self.is_cancelled() {
            Err(EegError::Cancelled)
        } else {
            Ok(())
        }
    }
}
