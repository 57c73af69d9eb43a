//! The host-side carrier for a captured foreign exception.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    format,
    handle::Owned,
    pending::{self, ErrorTriple},
    runtime::ForeignRuntime,
};

/// A foreign exception reified on the host side.
///
/// Owns the captured (type, value, traceback) triple and the message rendered from it
/// at construction time. The carrier can be propagated through host code with `?`
/// like any other error; when it reaches a boundary it is restored into the foreign
/// runtime verbatim, so nothing about the original exception is lost.
///
/// Accessors that return components hand out new strong references. The carrier keeps
/// its own, and releases each of them exactly once when dropped.
pub struct ForeignException<R: ForeignRuntime> {
    triple: ErrorTriple<R>,
    message: String,
}

impl<R: ForeignRuntime> ForeignException<R> {
    /// Wraps a captured triple, rendering its message.
    #[must_use]
    pub fn new(triple: ErrorTriple<R>) -> Self {
        let message = format::render(&triple);
        Self { triple, message }
    }

    /// Captures the pending foreign error into a carrier, if there is one.
    #[must_use]
    pub fn capture() -> Option<Self> {
        pending::capture::<R>().map(Self::new)
    }

    /// Converts a pending foreign error into `Err`.
    ///
    /// Useful after foreign calls whose return value doesn't signal failure by itself.
    pub fn check() -> Result<(), Self> {
        match Self::capture() {
            Some(exc) => Err(exc),
            None => Ok(()),
        }
    }

    /// The rendered, human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// A new reference to the exception type.
    #[must_use]
    pub fn kind(&self) -> Option<Owned<R>> {
        self.triple.kind().map(Owned::clone_ref)
    }

    /// A new reference to the exception value.
    #[must_use]
    pub fn payload(&self) -> Option<Owned<R>> {
        self.triple.payload().map(Owned::clone_ref)
    }

    /// A new reference to the traceback.
    #[must_use]
    pub fn trace(&self) -> Option<Owned<R>> {
        self.triple.trace().map(Owned::clone_ref)
    }

    /// Borrows the captured triple.
    #[must_use]
    pub fn triple(&self) -> &ErrorTriple<R> {
        &self.triple
    }

    /// Releases the carrier, returning the triple it owned.
    #[must_use]
    pub fn into_triple(self) -> ErrorTriple<R> {
        self.triple
    }

    /// The value's own `message` (or `msg`) attribute, or an empty string.
    #[must_use]
    pub fn py_message(&self) -> String {
        self.with_payload(String::new(), |payload| {
            payload
                .getattr(c"message")
                .or_else(|| payload.getattr(c"msg"))
                .and_then(|msg| msg.text())
                .unwrap_or_default()
        })
    }

    /// The value's `offset` attribute (1-based column of a syntax error), or -1.
    #[must_use]
    pub fn py_offset(&self) -> i64 {
        self.with_payload(-1, |payload| {
            payload
                .getattr(c"offset")
                .and_then(|offset| offset.as_index())
                .unwrap_or(-1)
        })
    }

    /// Restores the exception into the pending-error slot, co-owning its components.
    ///
    /// The carrier keeps its own references and stays usable.
    pub fn restore(&self) {
        let (kind, payload, trace) = (self.kind(), self.payload(), self.trace());
        ErrorTriple::new(kind, payload, trace).restore();
    }

    /// Moves the exception into the pending-error slot.
    ///
    /// A carrier without a type leaves the slot empty, as [`ErrorTriple::restore`] does.
    pub fn into_pending(self) {
        self.triple.restore();
    }

    /// A serializable snapshot for host-side diagnostics.
    #[must_use]
    pub fn summary(&self) -> ExceptionSummary {
        let type_name = self
            .with_payload(None, Owned::type_name)
            .unwrap_or_default();
        let offset = self.py_offset();
        ExceptionSummary {
            type_name,
            message: self.py_message(),
            offset: (offset >= 0).then_some(offset),
            rendered: self.message.clone(),
        }
    }

    /// Introspects the payload with the pending-error slot set aside.
    fn with_payload<T>(&self, default: T, f: impl FnOnce(&Owned<R>) -> T) -> T {
        match self.triple.payload() {
            Some(payload) => pending::preserving::<R, _>(|| f(payload)),
            None => default,
        }
    }
}

impl<R: ForeignRuntime> fmt::Display for ForeignException<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<R: ForeignRuntime> fmt::Debug for ForeignException<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignException")
            .field("message", &self.message)
            .field("triple", &self.triple)
            .finish()
    }
}

impl<R: ForeignRuntime> std::error::Error for ForeignException<R> {}

/// A detached description of a foreign exception.
///
/// Holds no foreign references, so it can outlive the runtime, cross threads or be
/// written to logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionSummary {
    /// Name of the exception's runtime type, e.g. `ZeroDivisionError`.
    pub type_name: String,
    /// The value's own `message`/`msg` attribute, empty when it has none.
    pub message: String,
    /// Column of a syntax error, when the value carries one.
    pub offset: Option<i64>,
    /// The carrier's rendered message.
    pub rendered: String,
}
