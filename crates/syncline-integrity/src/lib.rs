//! # syncline-integrity
//!
//! Passive integrity monitor for the editing surface. Observes paste and
//! keystroke-timing events and derives a bounded, decaying risk signal.
//! Best-effort and advisory only: the monitor never blocks or mutates
//! document content.

pub mod cadence;
pub mod fingerprint;
pub mod monitor;
pub mod paste;
pub mod surface;

pub use fingerprint::PasteSource;
pub use monitor::{IntegrityMonitor, IntegrityStats, RiskLevel};
pub use paste::{PasteEvent, PasteInput};
pub use surface::{SurfaceEvent, SurfaceGuard};
