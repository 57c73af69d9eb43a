//! Failures that can reach a boundary.
//!
//! A boundary body fails in exactly one of three ways, each a variant of
//! [`BoundaryError`]:
//!
//! - a captured foreign exception, restored verbatim by the guard;
//! - a [`HostFault`], the closed set of failures the host layer knows about;
//! - an [`OpaqueFault`], anything else, described by a label and a message.

use std::{any::Any, fmt, io};

use strum::IntoStaticStr;

use crate::{exception::ForeignException, runtime::ForeignRuntime};

/// Result type alias for boundary bodies.
pub type BoundaryResult<T, R> = Result<T, BoundaryError<R>>;

/// A structured host-side failure with no foreign exception attached.
#[derive(Debug, IntoStaticStr)]
pub enum HostFault {
    /// An argument received from the foreign side was unusable.
    InvalidArgument(String),
    /// A value couldn't be converted between host and foreign representations.
    Conversion(String),
    /// A foreign call reported failure but left no error pending.
    MissingError { operation: String },
    /// An I/O operation on the host side failed.
    Io(io::Error),
    /// Any other host failure.
    Other(String),
}

impl HostFault {
    /// The variant name, e.g. `"InvalidArgument"`.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for HostFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Conversion(msg) => write!(f, "conversion failed: {msg}"),
            Self::MissingError { operation } => {
                write!(f, "{operation} failed without setting an error")
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for HostFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for HostFault {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A host failure outside the [`HostFault`] hierarchy.
///
/// Carries an identifying label (an error type name, `panic`, ...) alongside the
/// description, since nothing else is known about its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueFault {
    label: String,
    description: String,
}

impl OpaqueFault {
    /// Label used for faults recovered from a Rust panic.
    pub const PANIC_LABEL: &'static str = "panic";

    #[must_use]
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }

    /// Describes an arbitrary error, labelled with the last segment of its type name.
    #[must_use]
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let label = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::new(label, err.to_string())
    }

    /// Describes a panic payload as returned by `std::panic::catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let description = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };
        Self::new(Self::PANIC_LABEL, description)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for OpaqueFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.description)
    }
}

impl std::error::Error for OpaqueFault {}

/// Any failure a boundary body can report.
pub enum BoundaryError<R: ForeignRuntime> {
    /// A foreign exception captured deeper in the host, to be restored as-is.
    Foreign(ForeignException<R>),
    /// A structured host failure.
    Host(HostFault),
    /// An unstructured host failure.
    Opaque(OpaqueFault),
}

impl<R: ForeignRuntime> BoundaryError<R> {
    /// Shorthand for an [`OpaqueFault`].
    #[must_use]
    pub fn opaque(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Opaque(OpaqueFault::new(label, description))
    }
}

impl<R: ForeignRuntime> From<ForeignException<R>> for BoundaryError<R> {
    fn from(exc: ForeignException<R>) -> Self {
        Self::Foreign(exc)
    }
}

impl<R: ForeignRuntime> From<HostFault> for BoundaryError<R> {
    fn from(fault: HostFault) -> Self {
        Self::Host(fault)
    }
}

impl<R: ForeignRuntime> From<OpaqueFault> for BoundaryError<R> {
    fn from(fault: OpaqueFault) -> Self {
        Self::Opaque(fault)
    }
}

impl<R: ForeignRuntime> From<io::Error> for BoundaryError<R> {
    fn from(err: io::Error) -> Self {
        Self::Host(HostFault::Io(err))
    }
}

impl<R: ForeignRuntime> fmt::Display for BoundaryError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foreign(exc) => fmt::Display::fmt(exc, f),
            Self::Host(fault) => fmt::Display::fmt(fault, f),
            Self::Opaque(fault) => fmt::Display::fmt(fault, f),
        }
    }
}

impl<R: ForeignRuntime> fmt::Debug for BoundaryError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foreign(exc) => f.debug_tuple("Foreign").field(exc).finish(),
            Self::Host(fault) => f.debug_tuple("Host").field(fault).finish(),
            Self::Opaque(fault) => f.debug_tuple("Opaque").field(fault).finish(),
        }
    }
}

impl<R: ForeignRuntime> std::error::Error for BoundaryError<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Foreign(exc) => Some(exc),
            Self::Host(fault) => Some(fault),
            Self::Opaque(fault) => Some(fault),
        }
    }
}
