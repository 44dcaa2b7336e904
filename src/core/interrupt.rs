//! Cooperative interruption flag shared between a scan and whoever may stop it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cheaply-cloneable stop flag.
///
/// Long-running loops poll [`is_triggered`](Self::is_triggered) only at safe
/// points (between files, between quarantine entries), never inside a move or
/// an overwrite pass.
#[derive(Debug, Clone, Default)]
pub struct ScanInterrupt {
    flag: Arc<AtomicBool>,
}

impl ScanInterrupt {
    /// A fresh, untriggered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next safe point.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the flag can be reused for the next scan.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Underlying flag, for registration with OS signal hooks.
    #[must_use]
    pub fn shared_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}
