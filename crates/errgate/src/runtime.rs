//! The seam between errgate and an embedded foreign runtime.
//!
//! [`ForeignRuntime`] mirrors the C-level error API of the embedded interpreter one
//! function at a time: the pending-error slot (`occurred`, `fetch`, `normalize`,
//! `restore`, `set_string`, `clear`), reference counting, attribute access, type
//! introspection and the text codec. Everything else in the crate is written against
//! this trait, so the same capture/format/guard logic drives both the CPython backend
//! in `errgate-python` and the in-process [`LocalRuntime`](crate::local::LocalRuntime).
//!
//! The trait works purely with associated functions: runtimes are zero-sized marker
//! types and their state (the interpreter, the thread-local error slot) lives behind
//! the C API. Functions that take raw object references are `unsafe` because the
//! caller must guarantee those references are alive; functions without object
//! arguments are safe.

use std::{ffi::CStr, fmt};

/// The C-level error and object API errgate needs from an embedded runtime.
///
/// # Safety
///
/// Implementors guarantee that every function may be called from any thread that
/// uses the bridge, acquiring or checking the runtime's execution context (e.g. the
/// interpreter lock) themselves. Reference-count and ownership semantics must match
/// the documentation on each function exactly, since [`Owned`](crate::Owned) relies
/// on them for exactly-once release.
pub unsafe trait ForeignRuntime: Sized + 'static {
    /// A raw, nullable object reference.
    type Object: Copy + Eq + fmt::Debug + 'static;

    /// The null reference.
    const NULL: Self::Object;

    /// Returns `true` if the pending-error slot is set.
    fn error_occurred() -> bool;

    /// Takes the pending triple out of the slot and clears it.
    ///
    /// Ownership of each non-null component transfers to the caller.
    fn error_fetch_clear() -> (Self::Object, Self::Object, Self::Object);

    /// Canonicalizes a fetched triple in place, constructing the exception
    /// instance if the runtime deferred it.
    ///
    /// # Safety
    /// Each non-null component must be an owned reference obtained from
    /// [`error_fetch_clear`](Self::error_fetch_clear); replaced components are released.
    unsafe fn error_normalize(kind: &mut Self::Object, payload: &mut Self::Object, trace: &mut Self::Object);

    /// Sets the pending-error slot, taking ownership of each non-null component and
    /// releasing whatever the slot held before.
    ///
    /// # Safety
    /// Each non-null component must be an owned reference the caller gives up.
    unsafe fn error_restore(kind: Self::Object, payload: Self::Object, trace: Self::Object);

    /// Sets the pending-error slot to `kind` with a string message.
    ///
    /// # Safety
    /// `kind` must be a live exception type; it is borrowed, not consumed.
    unsafe fn error_set_string(kind: Self::Object, message: &CStr);

    /// Clears the pending-error slot, releasing its contents.
    fn error_clear();

    /// Adds one strong reference.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn incref(obj: Self::Object);

    /// Releases one strong reference.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference owned by the caller.
    unsafe fn decref(obj: Self::Object);

    /// Looks up an attribute, returning a new reference or null.
    ///
    /// On null the runtime may leave an error pending; callers clear it.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn get_attr(obj: Self::Object, name: &CStr) -> Self::Object;

    /// Stringifies an object, returning a new reference to a runtime string or null.
    ///
    /// On null the runtime leaves an error pending; callers clear it.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn str(obj: Self::Object) -> Self::Object;

    /// Returns the name of the object's runtime type.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn type_name(obj: Self::Object) -> Option<String>;

    /// Converts a runtime string (or byte string) into host text.
    ///
    /// Returns `None` for anything that isn't textual; never leaves an error pending.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn decode_text(obj: Self::Object) -> Option<String>;

    /// Extracts an integer value, returning `None` for non-integers without leaving
    /// an error pending.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn as_index(obj: Self::Object) -> Option<i64>;

    /// Returns `true` if `obj` is an instance of the runtime's syntax error class.
    ///
    /// # Safety
    /// `obj` must be a live, non-null reference.
    unsafe fn is_syntax_error(obj: Self::Object) -> bool;

    /// Returns a borrowed reference to the generic runtime-error type that host
    /// faults are reported as.
    fn runtime_error() -> Self::Object;

    /// Returns `true` for the null reference.
    #[inline]
    fn is_null(obj: Self::Object) -> bool {
        obj == Self::NULL
    }
}
