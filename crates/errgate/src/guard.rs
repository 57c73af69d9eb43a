//! The boundary guard.
//!
//! Every entry point the foreign runtime calls into is a thin shim around [`guard`]:
//! the shim's body does the real work and returns a [`BoundaryResult`], and the guard
//! turns any failure into the foreign calling convention, a pending error plus the
//! return shape's [`Sentinel`]. Nothing raised by the body, panics included, escapes.

use std::{
    ffi::CString,
    panic::{self, AssertUnwindSafe},
};

use crate::{
    config::GuardConfig,
    fault::{BoundaryError, BoundaryResult, HostFault, OpaqueFault},
    runtime::ForeignRuntime,
    sentinel::Sentinel,
    tracer::{BoundaryTracer, NoopTracer},
};

/// Runs a boundary body with the default configuration and no tracing.
///
/// On success the body's value is returned unchanged. On failure the pending-error
/// slot is set and `T::sentinel()` returned:
///
/// - a [`ForeignException`](crate::ForeignException) is restored verbatim;
/// - a [`HostFault`] becomes a runtime error `host error: <fault>`;
/// - an [`OpaqueFault`] or a panic becomes a runtime error
///   `unexpected host fault <label>: <description>`.
pub fn guard<R, T, F>(body: F) -> T
where
    R: ForeignRuntime,
    T: Sentinel,
    F: FnOnce() -> BoundaryResult<T, R>,
{
    guard_with(&GuardConfig::default(), &mut NoopTracer, body)
}

/// Runs a boundary body with explicit configuration and tracer.
pub fn guard_with<R, T, F, Tr>(config: &GuardConfig, tracer: &mut Tr, body: F) -> T
where
    R: ForeignRuntime,
    T: Sentinel,
    F: FnOnce() -> BoundaryResult<T, R>,
    Tr: BoundaryTracer,
{
    let outcome = if config.catch_panics {
        panic::catch_unwind(AssertUnwindSafe(body))
            .unwrap_or_else(|payload| Err(OpaqueFault::from_panic(payload.as_ref()).into()))
    } else {
        body()
    };

    match outcome {
        Ok(value) => {
            tracer.on_success();
            value
        }
        Err(err) => {
            raise(config, tracer, err);
            T::sentinel()
        }
    }
}

/// Sets the pending-error slot from a boundary failure.
fn raise<R: ForeignRuntime, Tr: BoundaryTracer>(config: &GuardConfig, tracer: &mut Tr, err: BoundaryError<R>) {
    match err {
        // Restoring a triple without a type clears the slot, so it is reported instead.
        BoundaryError::Foreign(exc) if exc.triple().kind().is_none() => {
            let message = set_runtime_error::<R>(config, exc.message().to_owned());
            tracer.on_foreign_restored(&message);
        }
        BoundaryError::Foreign(exc) => {
            tracer.on_foreign_restored(exc.message());
            exc.into_pending();
        }
        BoundaryError::Host(fault) => {
            let message = set_runtime_error::<R>(config, host_fault_message(&fault));
            tracer.on_host_fault(&fault, &message);
        }
        BoundaryError::Opaque(fault) => {
            let message = set_runtime_error::<R>(config, opaque_fault_message(&fault));
            tracer.on_opaque_fault(&fault, &message);
        }
    }
}

/// The runtime-error message for a structured host fault.
#[must_use]
pub fn host_fault_message(fault: &HostFault) -> String {
    format!("host error: {fault}")
}

/// The runtime-error message for an unstructured host fault.
#[must_use]
pub fn opaque_fault_message(fault: &OpaqueFault) -> String {
    format!("unexpected host fault {}: {}", fault.label(), fault.description())
}

/// Replaces the pending error with the runtime's generic runtime error, returning the
/// message actually set.
fn set_runtime_error<R: ForeignRuntime>(config: &GuardConfig, message: String) -> String {
    let mut message = if message.contains('\0') {
        message.replace('\0', "\\0")
    } else {
        message
    };
    if let Some(limit) = config.max_message_len {
        truncate(&mut message, limit);
    }
    let c_message = CString::new(message.as_str()).unwrap_or_default();

    R::error_clear();
    // SAFETY: `runtime_error` is a live type owned by the runtime; `set_string` borrows it.
    unsafe { R::error_set_string(R::runtime_error(), &c_message) };
    message
}

/// Truncates to at most `limit` bytes without splitting a character.
fn truncate(message: &mut String, limit: usize) {
    if message.len() <= limit {
        return;
    }
    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut message = "héllo".to_owned();
        truncate(&mut message, 2);
        assert_eq!(message, "h");

        let mut message = "hello".to_owned();
        truncate(&mut message, 10);
        assert_eq!(message, "hello");
    }

    #[test]
    fn fault_messages() {
        let fault = HostFault::InvalidArgument("expected a callable".to_owned());
        assert_eq!(host_fault_message(&fault), "host error: invalid argument: expected a callable");

        let fault = OpaqueFault::new("OutOfMemory", "arena exhausted");
        assert_eq!(
            opaque_fault_message(&fault),
            "unexpected host fault OutOfMemory: arena exhausted"
        );
    }
}
