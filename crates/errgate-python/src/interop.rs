//! Moving exceptions between errgate carriers and pyo3.

use errgate::{BoundaryError, BoundaryResult, ErrorTriple, ForeignException, Sentinel};
use pyo3::{
    exceptions::{PyBaseException, PyRuntimeError},
    ffi,
    prelude::*,
};

use crate::cpython::CPython;

/// A captured Python exception.
pub type PythonException = ForeignException<CPython>;

/// Builds a carrier from an exception instance, co-owning its type and traceback.
#[must_use]
pub fn exception_from_value(value: &Bound<'_, PyBaseException>) -> PythonException {
    let kind = value.get_type().into_any().into_ptr();
    let payload = value.clone().into_any().into_ptr();
    // SAFETY: `value` is a live exception; `PyException_GetTraceback` returns a new
    // reference or null and never sets an error.
    let trace = unsafe { ffi::PyException_GetTraceback(value.as_ptr()) };
    // SAFETY: `into_ptr` and `PyException_GetTraceback` both hand us new references.
    let triple = unsafe { ErrorTriple::from_raw(kind, payload, trace) };
    ForeignException::new(triple)
}

/// Builds a carrier from a `PyErr` without going through the error indicator.
#[must_use]
pub fn exception_from_pyerr(py: Python<'_>, err: PyErr) -> PythonException {
    let value = err.into_value(py);
    exception_from_value(value.bind(py))
}

/// Runs a boundary body that needs the `Python` token.
///
/// Identical to [`errgate::guard`]: failures are left in the error indicator and the
/// return shape's sentinel is returned.
pub fn guard<'py, T, F>(py: Python<'py>, body: F) -> T
where
    T: Sentinel,
    F: FnOnce(Python<'py>) -> BoundaryResult<T, CPython>,
{
    errgate::guard(|| body(py))
}

/// Conversion of a carrier into a `PyErr`, for returning it from pyo3 functions.
pub trait IntoPyErr {
    /// Converts into a `PyErr` raising the same exception object.
    fn into_pyerr(self) -> PyErr;
}

impl IntoPyErr for PythonException {
    fn into_pyerr(self) -> PyErr {
        let message = self.message().to_owned();
        let (_, payload, trace) = self.into_triple().into_parts();
        Python::attach(|py| {
            let Some(payload) = payload else {
                return PyRuntimeError::new_err(message);
            };
            // SAFETY: `into_raw` gives the handle's strong reference to the `Bound`.
            let value = unsafe { Bound::from_owned_ptr(py, payload.into_raw()) };
            if let Some(trace) = trace {
                // SAFETY: both objects are live; the exception takes its own reference
                // to the traceback.
                unsafe { ffi::PyException_SetTraceback(value.as_ptr(), trace.as_ptr()) };
            }
            PyErr::from_value(value)
        })
    }
}

impl IntoPyErr for BoundaryError<CPython> {
    /// Foreign exceptions convert as-is; host faults become the same `RuntimeError`
    /// the guard would raise.
    fn into_pyerr(self) -> PyErr {
        match self {
            Self::Foreign(exc) => exc.into_pyerr(),
            Self::Host(fault) => PyRuntimeError::new_err(errgate::host_fault_message(&fault)),
            Self::Opaque(fault) => PyRuntimeError::new_err(errgate::opaque_fault_message(&fault)),
        }
    }
}

/// Lifts pyo3 results into boundary results.
pub trait PyResultExt<T> {
    /// Converts a `PyErr` into a captured foreign exception.
    fn into_boundary(self) -> BoundaryResult<T, CPython>;
}

impl<T> PyResultExt<T> for PyResult<T> {
    fn into_boundary(self) -> BoundaryResult<T, CPython> {
        self.map_err(|err| Python::attach(|py| exception_from_pyerr(py, err)).into())
    }
}

/// Turns a guarded object return back into a `PyResult`.
///
/// # Safety
/// `obj` must be a new reference, or null with the error indicator set, as returned by
/// [`guard`] over an object-returning body.
pub unsafe fn object_result(py: Python<'_>, obj: *mut ffi::PyObject) -> PyResult<Py<PyAny>> {
    // SAFETY: forwarded from the caller.
    unsafe { Py::from_owned_ptr_or_err(py, obj) }
}

/// Turns a guarded count return back into a `PyResult`.
pub fn count_result(py: Python<'_>, count: isize) -> PyResult<isize> {
    if count == isize::sentinel()
        && let Some(err) = PyErr::take(py)
    {
        return Err(err);
    }
    Ok(count)
}
