//! CPython backend for errgate.
//!
//! [`CPython`] implements [`errgate::ForeignRuntime`] over `pyo3::ffi`, so the core
//! crate's capture, carrier and guard work against a real interpreter. The interop
//! helpers move exceptions between errgate carriers and pyo3's `PyErr`.
//!
//! Built as an extension module the crate exposes `_errgate`, a set of guarded entry
//! points for exercising the bridge from Python.

mod cpython;
pub mod entry_points;
mod interop;

pub use cpython::CPython;
pub use interop::{
    IntoPyErr, PyResultExt, PythonException, count_result, exception_from_pyerr, exception_from_value, guard,
    object_result,
};
use pyo3::prelude::*;

/// errgate - exception translation between Rust hosts and Python.
#[pymodule]
mod _errgate {
    use pyo3::prelude::*;

    #[pymodule_export]
    use super::entry_points::call;
    #[pymodule_export]
    use super::entry_points::exception_message;
    #[pymodule_export]
    use super::entry_points::exception_offset;
    #[pymodule_export]
    use super::entry_points::render;
    #[pymodule_export]
    use super::entry_points::size;

    #[pymodule_init]
    fn init(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        Ok(())
    }
}
