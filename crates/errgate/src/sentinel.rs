//! Failure values for each boundary return shape.
//!
//! A boundary entry point can't raise: it reports failure by returning the value the
//! foreign calling convention reserves for "failed, check the pending error". Only
//! the shapes listed here have such a value, so guarding a body that returns
//! anything else is a compile error rather than a guess.

/// A return type with a reserved failure value.
pub trait Sentinel {
    /// The value returned when the boundary call failed.
    fn sentinel() -> Self;
}

/// Object references fail with null.
impl<T> Sentinel for *mut T {
    #[inline]
    fn sentinel() -> Self {
        std::ptr::null_mut()
    }
}

/// `Py_ssize_t` counts and indexes fail with -1.
impl Sentinel for isize {
    #[inline]
    fn sentinel() -> Self {
        -1
    }
}

impl Sentinel for i64 {
    #[inline]
    fn sentinel() -> Self {
        -1
    }
}

/// C `int` status codes fail with -1.
impl Sentinel for i32 {
    #[inline]
    fn sentinel() -> Self {
        -1
    }
}

/// Calls without a result have nothing to return; the pending error alone signals failure.
impl Sentinel for () {
    #[inline]
    fn sentinel() -> Self {}
}
