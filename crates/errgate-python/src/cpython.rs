//! [`ForeignRuntime`] over the CPython C API.

use std::{ffi::CStr, ptr};

use errgate::ForeignRuntime;
use pyo3::{
    exceptions::PySyntaxError,
    ffi,
    prelude::*,
    types::{PyBytes, PyInt, PyString},
};

/// Marker type for the CPython interpreter.
///
/// Every operation attaches to the interpreter for its duration, so the calling
/// thread always holds the GIL (or is attached to a free-threaded build) while it
/// touches the error indicator or any reference count. Attaching from a thread that
/// is already attached only bumps a counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CPython;

/// Borrows a live object as a `Bound` for the duration of `f`.
///
/// # Safety
/// `obj` must be a live, non-null object.
unsafe fn with_bound<T>(obj: *mut ffi::PyObject, f: impl FnOnce(&Bound<'_, PyAny>) -> T) -> T {
    Python::attach(|py| {
        // SAFETY: the caller guarantees `obj` is live; the `Bound` takes and later
        // releases its own reference.
        let obj = unsafe { Bound::from_borrowed_ptr(py, obj) };
        f(&obj)
    })
}

// SAFETY: each function attaches to the interpreter before calling into the C API and
// follows its reference conventions: `PyErr_Fetch` transfers ownership of the triple,
// `PyErr_Restore` steals it, `PyErr_SetString` borrows the type, and attribute lookup
// and `PyObject_Str` return new references or null with an exception set.
unsafe impl ForeignRuntime for CPython {
    type Object = *mut ffi::PyObject;

    const NULL: *mut ffi::PyObject = ptr::null_mut();

    fn error_occurred() -> bool {
        // SAFETY: attached; `PyErr_Occurred` returns a borrowed reference we only test.
        Python::attach(|_| unsafe { !ffi::PyErr_Occurred().is_null() })
    }

    fn error_fetch_clear() -> (Self::Object, Self::Object, Self::Object) {
        Python::attach(|_| {
            let (mut kind, mut payload, mut trace) = (ptr::null_mut(), ptr::null_mut(), ptr::null_mut());
            // SAFETY: attached; the out-pointers are valid locals.
            unsafe { ffi::PyErr_Fetch(&raw mut kind, &raw mut payload, &raw mut trace) };
            (kind, payload, trace)
        })
    }

    unsafe fn error_normalize(kind: &mut Self::Object, payload: &mut Self::Object, trace: &mut Self::Object) {
        Python::attach(|_| {
            // SAFETY: attached; the components are owned by the caller and
            // normalization replaces them in place.
            unsafe {
                ffi::PyErr_NormalizeException(kind, payload, trace);
                if !trace.is_null() && !payload.is_null() {
                    ffi::PyException_SetTraceback(*payload, *trace);
                }
            }
        });
    }

    unsafe fn error_restore(kind: Self::Object, payload: Self::Object, trace: Self::Object) {
        // SAFETY: attached; `PyErr_Restore` steals the caller's references.
        Python::attach(|_| unsafe { ffi::PyErr_Restore(kind, payload, trace) });
    }

    unsafe fn error_set_string(kind: Self::Object, message: &CStr) {
        // SAFETY: attached; `kind` is a live type and `message` is NUL-terminated.
        Python::attach(|_| unsafe { ffi::PyErr_SetString(kind, message.as_ptr()) });
    }

    fn error_clear() {
        // SAFETY: attached.
        Python::attach(|_| unsafe { ffi::PyErr_Clear() });
    }

    unsafe fn incref(obj: Self::Object) {
        // SAFETY: attached; the caller guarantees `obj` is live.
        Python::attach(|_| unsafe { ffi::Py_IncRef(obj) });
    }

    unsafe fn decref(obj: Self::Object) {
        // SAFETY: attached; the caller owns the reference being released.
        Python::attach(|_| unsafe { ffi::Py_DecRef(obj) });
    }

    unsafe fn get_attr(obj: Self::Object, name: &CStr) -> Self::Object {
        // SAFETY: attached; `obj` is live and `name` is NUL-terminated.
        Python::attach(|_| unsafe { ffi::PyObject_GetAttrString(obj, name.as_ptr()) })
    }

    unsafe fn str(obj: Self::Object) -> Self::Object {
        // SAFETY: attached; `obj` is live.
        Python::attach(|_| unsafe { ffi::PyObject_Str(obj) })
    }

    unsafe fn type_name(obj: Self::Object) -> Option<String> {
        // SAFETY: forwarded from the caller.
        unsafe { with_bound(obj, |obj| obj.get_type().name().ok().map(|name| name.to_string())) }
    }

    unsafe fn decode_text(obj: Self::Object) -> Option<String> {
        // SAFETY: forwarded from the caller.
        unsafe {
            with_bound(obj, |obj| {
                if let Ok(text) = obj.cast::<PyString>() {
                    Some(text.to_string_lossy().into_owned())
                } else if let Ok(bytes) = obj.cast::<PyBytes>() {
                    Some(String::from_utf8_lossy(bytes.as_bytes()).into_owned())
                } else {
                    None
                }
            })
        }
    }

    unsafe fn as_index(obj: Self::Object) -> Option<i64> {
        // SAFETY: forwarded from the caller.
        unsafe { with_bound(obj, |obj| obj.cast::<PyInt>().ok()?.extract::<i64>().ok()) }
    }

    unsafe fn is_syntax_error(obj: Self::Object) -> bool {
        // SAFETY: forwarded from the caller.
        unsafe { with_bound(obj, |obj| obj.is_instance_of::<PySyntaxError>()) }
    }

    fn runtime_error() -> Self::Object {
        // SAFETY: the exception type statics are initialized with the interpreter and
        // never change.
        unsafe { ffi::PyExc_RuntimeError }
    }
}
