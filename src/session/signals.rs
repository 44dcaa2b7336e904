//! SIGINT/SIGTERM wiring onto a [`ScanInterrupt`].
//!
//! The first signal sets the interrupt flag; the walker and batch loops stop at
//! their next safe point. A second signal while the flag is still set exits
//! immediately with status 130.

#![allow(missing_docs)]

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::SigId;

use crate::core::interrupt::ScanInterrupt;

const FORCED_EXIT_CODE: i32 = 130;

/// Registered signal hooks; unregistered on drop.
pub struct InterruptSignals {
    ids: Vec<SigId>,
}

impl InterruptSignals {
    /// Register SIGINT and SIGTERM against `interrupt`.
    ///
    /// Registration is best-effort; failures are reported on stderr and the
    /// session continues without that hook.
    pub fn install(interrupt: &ScanInterrupt) -> Self {
        let flag = interrupt.shared_flag();
        let mut ids = Vec::new();

        for (signal, name) in [(SIGINT, "SIGINT"), (SIGTERM, "SIGTERM")] {
            // The conditional exit must be registered before the flag setter so
            // the first signal only sets the flag.
            match signal_hook::flag::register_conditional_shutdown(
                signal,
                FORCED_EXIT_CODE,
                flag.clone(),
            ) {
                Ok(id) => ids.push(id),
                Err(e) => eprintln!("[HWD-SIGNAL] failed to register forced exit on {name}: {e}"),
            }
            match signal_hook::flag::register(signal, flag.clone()) {
                Ok(id) => ids.push(id),
                Err(e) => eprintln!("[HWD-SIGNAL] failed to register {name}: {e}"),
            }
        }

        Self { ids }
    }

    #[must_use]
    pub fn registered(&self) -> usize {
        self.ids.len()
    }
}

impl Drop for InterruptSignals {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_registers_both_signals_and_leaves_flag_clear() {
        let interrupt = ScanInterrupt::new();
        let signals = InterruptSignals::install(&interrupt);
        assert_eq!(signals.registered(), 4);
        assert!(!interrupt.is_triggered());
        drop(signals);
        assert!(!interrupt.is_triggered());
    }
}
