//! Guarded entry points exported by the `_errgate` module.
//!
//! Each function does its work inside [`guard`] exactly as a hand-written C
//! extension function would, then hands the sentinel-or-value result back to pyo3.

use std::ptr;

use errgate::{BoundaryResult, ForeignException, HostFault, Owned};
use pyo3::{exceptions::PyBaseException, ffi, prelude::*, types::PyTuple};

use crate::{
    cpython::CPython,
    interop::{count_result, exception_from_value, guard, object_result},
};

/// Calls `callable(*args)`.
///
/// Raises `RuntimeError` if `callable` isn't callable; an exception raised by the
/// callee propagates unchanged.
#[pyfunction]
#[pyo3(signature = (callable, *args))]
pub fn call(py: Python<'_>, callable: &Bound<'_, PyAny>, args: &Bound<'_, PyTuple>) -> PyResult<Py<PyAny>> {
    let result = guard(py, |_| -> BoundaryResult<*mut ffi::PyObject, CPython> {
        if !callable.is_callable() {
            let type_name = callable
                .get_type()
                .name()
                .map_or_else(|_| "object".to_owned(), |name| name.to_string());
            return Err(HostFault::InvalidArgument(format!("'{type_name}' object is not callable")).into());
        }
        // SAFETY: both arguments are live; `PyObject_Call` returns a new reference or
        // null with an error set.
        let returned = unsafe {
            let obj = ffi::PyObject_Call(callable.as_ptr(), args.as_ptr(), ptr::null_mut());
            Owned::<CPython>::from_owned_or_capture(obj, "PyObject_Call")?
        };
        Ok(returned.into_raw())
    });
    // SAFETY: the guarded body returns a new reference or null with an error set.
    unsafe { object_result(py, result) }
}

/// Returns `len(obj)`.
#[pyfunction]
pub fn size(py: Python<'_>, obj: &Bound<'_, PyAny>) -> PyResult<isize> {
    let count = guard(py, |_| -> BoundaryResult<isize, CPython> {
        // SAFETY: `obj` is live.
        let count = unsafe { ffi::PyObject_Size(obj.as_ptr()) };
        if count < 0 {
            ForeignException::check()?;
            return Err(HostFault::MissingError {
                operation: "PyObject_Size".to_owned(),
            }
            .into());
        }
        Ok(count)
    });
    count_result(py, count)
}

/// Renders an exception the way errgate reports it.
#[pyfunction]
pub fn render(exc: &Bound<'_, PyBaseException>) -> String {
    exception_from_value(exc).message().to_owned()
}

/// The exception's `message` or `msg` attribute, or `""`.
#[pyfunction]
pub fn exception_message(exc: &Bound<'_, PyBaseException>) -> String {
    exception_from_value(exc).py_message()
}

/// The exception's `offset` attribute, or `-1`.
#[pyfunction]
pub fn exception_offset(exc: &Bound<'_, PyBaseException>) -> i64 {
    exception_from_value(exc).py_offset()
}
