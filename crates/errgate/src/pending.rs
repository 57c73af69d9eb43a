//! Access to the foreign runtime's pending-error slot.
//!
//! The slot is only ever read by taking its contents: [`capture`] fetches, clears
//! and normalizes in one step, and [`ErrorTriple::restore`] hands a triple back.

use std::fmt;

use crate::{handle::Owned, runtime::ForeignRuntime};

/// One foreign exception: its type, its value and its traceback.
///
/// Each component may be absent. Present components are owned strong references,
/// released when the triple is dropped unless it is restored into the slot first.
pub struct ErrorTriple<R: ForeignRuntime> {
    kind: Option<Owned<R>>,
    payload: Option<Owned<R>>,
    trace: Option<Owned<R>>,
}

impl<R: ForeignRuntime> ErrorTriple<R> {
    /// Builds a triple from owned handles.
    #[must_use]
    pub fn new(kind: Option<Owned<R>>, payload: Option<Owned<R>>, trace: Option<Owned<R>>) -> Self {
        Self { kind, payload, trace }
    }

    /// Takes ownership of three raw, nullable references.
    ///
    /// # Safety
    /// Every non-null component must be a live strong reference the caller gives up.
    #[must_use]
    pub unsafe fn from_raw(kind: R::Object, payload: R::Object, trace: R::Object) -> Self {
        // SAFETY: forwarded from the caller.
        unsafe {
            Self {
                kind: Owned::from_owned(kind),
                payload: Owned::from_owned(payload),
                trace: Owned::from_owned(trace),
            }
        }
    }

    /// Fetches and clears the slot without normalizing.
    fn take() -> Option<Self> {
        if !R::error_occurred() {
            return None;
        }
        let (kind, payload, trace) = R::error_fetch_clear();
        // SAFETY: `error_fetch_clear` transfers ownership of each component.
        Some(unsafe { Self::from_raw(kind, payload, trace) })
    }

    /// The exception type.
    #[must_use]
    pub fn kind(&self) -> Option<&Owned<R>> {
        self.kind.as_ref()
    }

    /// The exception instance.
    #[must_use]
    pub fn payload(&self) -> Option<&Owned<R>> {
        self.payload.as_ref()
    }

    /// The traceback.
    #[must_use]
    pub fn trace(&self) -> Option<&Owned<R>> {
        self.trace.as_ref()
    }

    /// Splits the triple into its three handles.
    #[must_use]
    pub fn into_parts(self) -> (Option<Owned<R>>, Option<Owned<R>>, Option<Owned<R>>) {
        (self.kind, self.payload, self.trace)
    }

    /// Moves the triple into the pending-error slot, replacing whatever was there.
    ///
    /// Without a type this leaves the slot empty.
    pub fn restore(self) {
        let kind = self.kind.map_or(R::NULL, Owned::into_raw);
        let payload = self.payload.map_or(R::NULL, Owned::into_raw);
        let trace = self.trace.map_or(R::NULL, Owned::into_raw);
        // SAFETY: each non-null component is a strong reference we just gave up.
        unsafe { R::error_restore(kind, payload, trace) };
    }
}

impl<R: ForeignRuntime> fmt::Debug for ErrorTriple<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTriple")
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .field("trace", &self.trace)
            .finish()
    }
}

/// Claims the pending foreign error, if there is one.
///
/// Returns `None` without side effects when the slot is empty. Otherwise the slot is
/// fetched and cleared, the triple normalized, and ownership handed to the caller.
#[must_use]
pub fn capture<R: ForeignRuntime>() -> Option<ErrorTriple<R>> {
    if !R::error_occurred() {
        return None;
    }
    let (mut kind, mut payload, mut trace) = R::error_fetch_clear();
    // SAFETY: the components were just fetched and are owned by us; normalization
    // swaps them in place, releasing anything it replaces.
    unsafe {
        R::error_normalize(&mut kind, &mut payload, &mut trace);
        Some(ErrorTriple::from_raw(kind, payload, trace))
    }
}

/// Returns `true` if a foreign error is pending.
#[must_use]
pub fn is_pending<R: ForeignRuntime>() -> bool {
    R::error_occurred()
}

/// Discards any pending foreign error.
pub fn clear<R: ForeignRuntime>() {
    R::error_clear();
}

/// Runs `f` with the pending-error slot emptied, then puts back whatever was pending
/// before. Errors `f` leaves behind are discarded.
pub(crate) fn preserving<R: ForeignRuntime, T>(f: impl FnOnce() -> T) -> T {
    let stashed = ErrorTriple::<R>::take();
    let result = f();
    match stashed {
        Some(triple) => triple.restore(),
        None => R::error_clear(),
    }
    result
}
