//! Session lifecycle and parallel execution
//!
//! A session is one workflow run: a state machine bound to a preset, its own
//! quota and its own frame-order tracking. Two ways to drive sessions:
//!
//! - [`SessionTable`] - explicit `create` / `ingest` / `advance` / `destroy`
//!   for hosts that feed windows incrementally
//! - [`SessionPool`] - fire-and-forget jobs run in parallel on worker threads
//!
//! # Cancellation
//!
//! Every session carries a [`CancelToken`]. The engine checks it between
//! segments, so an aborted session keeps every transition it committed.

pub mod cancel;
pub mod pool;
pub mod table;
pub mod types;

pub use cancel::CancelToken;
pub use pool::{run_job, SessionHandle, SessionJob, SessionPool, SessionReport};
pub use table::SessionTable;
pub use types::{AdvanceReport, SessionArchive, SessionId};
