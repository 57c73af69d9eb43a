//! Owning handles to foreign object references.

use std::{ffi::CStr, fmt, marker::PhantomData, mem::ManuallyDrop};

use crate::{
    exception::ForeignException,
    fault::{BoundaryError, BoundaryResult, HostFault},
    runtime::ForeignRuntime,
};

/// One strong reference to a foreign object.
///
/// The handle releases its reference exactly once, when dropped. Lending the object
/// to someone else is always explicit: [`as_ptr`](Self::as_ptr) hands out a borrowed
/// view without touching the count, [`clone_ref`](Self::clone_ref) takes a new strong
/// reference, and [`into_raw`](Self::into_raw) gives this one away.
///
/// Handles are neither `Send` nor `Sync`: the runtime's pending-error slot is
/// thread-local, and so is the context every reference must be used under.
pub struct Owned<R: ForeignRuntime> {
    /// Never null.
    ptr: R::Object,
    _marker: PhantomData<(R, *mut ())>,
}

impl<R: ForeignRuntime> Owned<R> {
    /// Wraps a reference the caller owns. Returns `None` for null.
    ///
    /// # Safety
    /// A non-null `ptr` must be a live strong reference whose ownership the caller
    /// transfers to the handle.
    #[must_use]
    pub unsafe fn from_owned(ptr: R::Object) -> Option<Self> {
        if R::is_null(ptr) {
            None
        } else {
            Some(Self {
                ptr,
                _marker: PhantomData,
            })
        }
    }

    /// Wraps a reference known to be non-null.
    ///
    /// # Safety
    /// `ptr` must be a non-null, live strong reference owned by the caller.
    pub(crate) unsafe fn from_owned_nonnull(ptr: R::Object) -> Self {
        debug_assert!(!R::is_null(ptr), "Owned::from_owned_nonnull: null reference");
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Takes a new strong reference to a borrowed object. Returns `None` for null.
    ///
    /// # Safety
    /// A non-null `ptr` must be live for the duration of the call.
    #[must_use]
    pub unsafe fn from_borrowed(ptr: R::Object) -> Option<Self> {
        if R::is_null(ptr) {
            return None;
        }
        // SAFETY: the caller guarantees `ptr` is live; the increment makes the new
        // handle a co-owner.
        unsafe { R::incref(ptr) };
        Some(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Wraps the return value of a foreign call that signals failure with null.
    ///
    /// A null return is reported as the pending foreign error, captured into a
    /// [`ForeignException`]. If the runtime returned null without setting an error
    /// the failure is reported as [`HostFault::MissingError`].
    ///
    /// # Safety
    /// Same contract as [`from_owned`](Self::from_owned).
    pub unsafe fn from_owned_or_capture(ptr: R::Object, operation: &str) -> BoundaryResult<Self, R> {
        // SAFETY: forwarded from the caller.
        if let Some(owned) = unsafe { Self::from_owned(ptr) } {
            return Ok(owned);
        }
        match ForeignException::capture() {
            Some(exc) => Err(BoundaryError::Foreign(exc)),
            None => Err(HostFault::MissingError {
                operation: operation.to_owned(),
            }
            .into()),
        }
    }

    /// Returns a borrowed view of the reference, valid while `self` is alive.
    #[must_use]
    pub fn as_ptr(&self) -> R::Object {
        self.ptr
    }

    /// Gives the reference away without releasing it.
    #[must_use]
    pub fn into_raw(self) -> R::Object {
        let this = ManuallyDrop::new(self);
        this.ptr
    }

    /// Takes an additional strong reference to the same object.
    #[must_use]
    pub fn clone_ref(&self) -> Self {
        // SAFETY: `self.ptr` is live for as long as `self` is.
        unsafe { R::incref(self.ptr) };
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    /// Looks up an attribute. Lookup failures are cleared and reported as `None`.
    #[must_use]
    pub fn getattr(&self, name: &CStr) -> Option<Self> {
        // SAFETY: `self.ptr` is live; `get_attr` returns a new reference or null.
        let attr = unsafe { Self::from_owned(R::get_attr(self.ptr, name)) };
        if attr.is_none() {
            R::error_clear();
        }
        attr
    }

    /// Stringifies the object. A failing `__str__` is cleared and reported as `None`.
    #[must_use]
    pub fn str(&self) -> Option<Self> {
        // SAFETY: `self.ptr` is live; `str` returns a new reference or null.
        let text = unsafe { Self::from_owned(R::str(self.ptr)) };
        if text.is_none() {
            R::error_clear();
        }
        text
    }

    /// Decodes a runtime string or byte string into host text.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        // SAFETY: `self.ptr` is live.
        unsafe { R::decode_text(self.ptr) }
    }

    /// Returns the name of the object's runtime type.
    #[must_use]
    pub fn type_name(&self) -> Option<String> {
        // SAFETY: `self.ptr` is live.
        unsafe { R::type_name(self.ptr) }
    }

    /// Extracts an integer value.
    #[must_use]
    pub fn as_index(&self) -> Option<i64> {
        // SAFETY: `self.ptr` is live.
        unsafe { R::as_index(self.ptr) }
    }

    /// Returns `true` if the object is a syntax error instance.
    #[must_use]
    pub fn is_syntax_error(&self) -> bool {
        // SAFETY: `self.ptr` is live.
        unsafe { R::is_syntax_error(self.ptr) }
    }
}

impl<R: ForeignRuntime> Drop for Owned<R> {
    fn drop(&mut self) {
        // SAFETY: the handle owns exactly one strong reference to a live object and
        // this is the only place it is released.
        unsafe { R::decref(self.ptr) };
    }
}

impl<R: ForeignRuntime> fmt::Debug for Owned<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.ptr).finish()
    }
}
