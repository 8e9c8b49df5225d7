//! Convoscope Core
//!
//! Foundational types shared by the Convoscope server and client: the wire
//! event vocabulary, the analysis kinds and their status strings, phase maps,
//! and the progress easing primitives. This crate has zero dependencies on
//! application-level code (HTTP server, HTTP client, async runtime).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `event` - Stream event types and wire framing constants
//! - `analysis` - Analysis kinds and the status-string vocabulary
//! - `progress` - Phase maps and the progress easing function
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/thiserror** - keeps build times minimal
//! 2. **Pure functions for display math** - the easing curve is testable in isolation
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod analysis;
pub mod error;
pub mod event;
pub mod progress;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Wire Events ────────────────────────────────────────────────────────
pub use event::{StreamEvent, DEFAULT_HEARTBEAT_MS, FRAME_DELIMITER, HEARTBEAT_FRAME};

// ── Analysis Vocabulary ────────────────────────────────────────────────
pub use analysis::AnalysisKind;

// ── Progress Primitives ────────────────────────────────────────────────
pub use progress::{ease_step, PhaseCheckpoint, PhaseMap};
