//! Session layer: one orchestrated user action plus its interrupt wiring.

pub mod orchestrator;
#[cfg(feature = "signals")]
pub mod signals;
