//! Convoscope Client
//!
//! Consumer-side half of the analysis pipeline: decodes the server's event
//! stream, tracks each job through an operation state machine with eased
//! progress display, and mirrors job state into a process-wide registry so
//! any view can re-attach to a live run.
//!
//! ## Module Organization
//!
//! - `api` - HTTP layer (`AnalysisClient`): one streaming POST per kind
//! - `transport` - SSE frame decoding and the ordered event read loop
//! - `operation` - Per-key job state machine and saga driver (`JobRunner`)
//! - `interpolator` - Progress easing ticker between server checkpoints
//! - `registry` - Process-wide subscribable operation store
//! - `error` - Client error types

pub mod api;
pub mod error;
pub mod interpolator;
pub mod operation;
pub mod registry;
pub mod transport;

pub use api::AnalysisClient;
pub use error::{ClientError, ClientResult};
pub use operation::{JobRunner, JobSpec, StartOutcome, CPS_JOB, SUBTEXT_JOB};
pub use registry::{OperationRegistry, OperationSnapshot, SubscriptionId};
pub use transport::{FrameDecoder, StreamOutcome};
