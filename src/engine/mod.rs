// src/engine/mod.rs

//! Orchestration engine for jobdag.
//!
//! This module ties together the scheduler and the main runtime event loop
//! that reacts to:
//!   - job completion events from the execution backend
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::dag::{JobId, JobReport};

/// Events flowing into the runtime from the execution backend and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched job stopped running (all steps done, or it failed).
    JobFinished { job: JobId, report: JobReport },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
