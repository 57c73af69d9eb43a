//! Boundary tracing infrastructure.
//!
//! The guard reports how each boundary call ended through a [`BoundaryTracer`]. Every
//! hook has a no-op default, so [`NoopTracer`] costs nothing once monomorphized and
//! concrete tracers override only what they care about.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default for [`guard`](crate::guard)) |
//! | [`StderrTracer`] | Human-readable log of failed calls on stderr |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem |

use serde::{Deserialize, Serialize};

use crate::fault::{HostFault, OpaqueFault};

/// How one guarded boundary call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// The body returned normally.
    Success,
    /// A captured foreign exception was restored into the pending-error slot.
    ForeignRestored {
        /// The exception's rendered message.
        message: String,
    },
    /// A structured host fault was reported as a runtime error.
    HostFault {
        /// `HostFault` variant name.
        kind: String,
        /// The message set on the foreign side.
        message: String,
    },
    /// An unstructured host fault (or panic) was reported as a runtime error.
    OpaqueFault {
        label: String,
        /// The message set on the foreign side.
        message: String,
    },
}

/// Hooks invoked by the guard as boundary calls complete.
pub trait BoundaryTracer: std::fmt::Debug {
    /// The body returned normally.
    #[inline(always)]
    fn on_success(&mut self) {}

    /// A captured foreign exception was restored.
    ///
    /// # Arguments
    /// * `message` - The exception's rendered message
    #[inline(always)]
    fn on_foreign_restored(&mut self, _message: &str) {}

    /// A structured host fault was translated.
    ///
    /// # Arguments
    /// * `fault` - The fault as raised by the body
    /// * `message` - The runtime-error message set on the foreign side
    #[inline(always)]
    fn on_host_fault(&mut self, _fault: &HostFault, _message: &str) {}

    /// An unstructured host fault was translated.
    ///
    /// # Arguments
    /// * `fault` - The fault as raised by the body, or recovered from a panic
    /// * `message` - The runtime-error message set on the foreign side
    #[inline(always)]
    fn on_opaque_fault(&mut self, _fault: &OpaqueFault, _message: &str) {}
}

/// Tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl BoundaryTracer for NoopTracer {}

/// Tracer that logs every failed boundary call to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer {
    failures: usize,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failed calls logged so far.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl BoundaryTracer for StderrTracer {
    fn on_foreign_restored(&mut self, message: &str) {
        self.failures += 1;
        eprintln!("[errgate] foreign exception restored: {message}");
    }

    fn on_host_fault(&mut self, fault: &HostFault, message: &str) {
        self.failures += 1;
        eprintln!("[errgate] host fault {}: {message}", fault.kind_name());
    }

    fn on_opaque_fault(&mut self, fault: &OpaqueFault, message: &str) {
        self.failures += 1;
        eprintln!("[errgate] unexpected fault {}: {message}", fault.label());
    }
}

/// Tracer that records every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The events recorded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer, returning its events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl BoundaryTracer for RecordingTracer {
    fn on_success(&mut self) {
        self.events.push(TraceEvent::Success);
    }

    fn on_foreign_restored(&mut self, message: &str) {
        self.events.push(TraceEvent::ForeignRestored {
            message: message.to_owned(),
        });
    }

    fn on_host_fault(&mut self, fault: &HostFault, message: &str) {
        self.events.push(TraceEvent::HostFault {
            kind: fault.kind_name().to_owned(),
            message: message.to_owned(),
        });
    }

    fn on_opaque_fault(&mut self, fault: &OpaqueFault, message: &str) {
        self.events.push(TraceEvent::OpaqueFault {
            label: fault.label().to_owned(),
            message: message.to_owned(),
        });
    }
}
