#![doc = include_str!("../../../README.md")]

mod config;
mod exception;
mod fault;
pub mod format;
mod guard;
mod handle;
pub mod local;
mod pending;
mod runtime;
mod sentinel;
mod tracer;

pub use crate::{
    config::GuardConfig,
    exception::{ExceptionSummary, ForeignException},
    fault::{BoundaryError, BoundaryResult, HostFault, OpaqueFault},
    guard::{guard, guard_with, host_fault_message, opaque_fault_message},
    handle::Owned,
    pending::{ErrorTriple, capture, clear, is_pending},
    runtime::ForeignRuntime,
    sentinel::Sentinel,
    tracer::{BoundaryTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};
