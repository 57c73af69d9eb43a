/// Tests for claiming and restoring the pending-error slot.
use errgate::{
    ErrorTriple, ForeignRuntime, capture, clear, is_pending,
    local::{Builtin, LocalRef, LocalRuntime},
};
use pretty_assertions::assert_eq;

/// Sets an unnormalized `ZeroDivisionError("division by zero")`.
fn raise_zero_division() {
    let kind = LocalRuntime::builtin(Builtin::ZeroDivisionError);
    // SAFETY: `kind` is alive for the call; `set_string` takes its own reference.
    unsafe { LocalRuntime::error_set_string(kind.as_ptr(), c"division by zero") };
}

#[test]
fn capture_without_pending_error_is_noop() {
    let live_before = LocalRuntime::live_objects();
    assert!(capture::<LocalRuntime>().is_none());
    assert!(!is_pending::<LocalRuntime>());
    assert_eq!(LocalRuntime::live_objects(), live_before);
}

#[test]
fn capture_claims_and_clears_slot() {
    raise_zero_division();
    assert!(is_pending::<LocalRuntime>());

    let triple = capture::<LocalRuntime>().expect("error should be pending");
    assert!(!is_pending::<LocalRuntime>());
    assert!(capture::<LocalRuntime>().is_none(), "second capture must find nothing");

    let kind = triple.kind().expect("kind present");
    assert_eq!(kind.as_ptr(), LocalRuntime::builtin(Builtin::ZeroDivisionError).as_ptr());
    assert!(triple.trace().is_none());
}

#[test]
fn capture_normalizes_deferred_payload() {
    raise_zero_division();
    let (_, raw_payload, _) = LocalRuntime::peek_pending().unwrap();

    let triple = capture::<LocalRuntime>().unwrap();
    let payload = triple.payload().expect("payload present");
    assert_eq!(payload.type_name().as_deref(), Some("ZeroDivisionError"));
    assert_ne!(payload.as_ptr(), raw_payload);
    assert!(
        !LocalRuntime::is_alive(raw_payload),
        "the deferred message string is released by normalization"
    );
}

#[test]
fn restore_round_trip_preserves_identities() {
    let class = LocalRuntime::new_type("CustomError", Some(&LocalRuntime::builtin(Builtin::Exception)));
    let payload = LocalRuntime::new_instance(&class, Some("boom"));
    let trace = LocalRuntime::new_traceback(12);
    let expected = (class.as_ptr(), payload.as_ptr(), trace.as_ptr());

    ErrorTriple::new(Some(class.clone_ref()), Some(payload.clone_ref()), Some(trace.clone_ref())).restore();
    assert_eq!(LocalRuntime::peek_pending(), Some(expected));

    let triple = capture::<LocalRuntime>().unwrap();
    triple.restore();
    assert_eq!(LocalRuntime::peek_pending(), Some(expected));

    clear::<LocalRuntime>();
    assert_eq!(LocalRuntime::peek_pending(), None);
    assert_eq!(LocalRuntime::refcount(expected.1), 1, "only our handle remains");
}

#[test]
fn restore_replaces_previous_error() {
    raise_zero_division();
    let (_, first_payload, _) = LocalRuntime::peek_pending().unwrap();

    let kind = LocalRuntime::builtin(Builtin::TypeError);
    ErrorTriple::new(Some(kind), None, None).restore();

    assert!(!LocalRuntime::is_alive(first_payload), "replaced triple is released");
    let (kind, payload, trace) = LocalRuntime::peek_pending().unwrap();
    assert_eq!(kind, LocalRuntime::builtin(Builtin::TypeError).as_ptr());
    assert_eq!(payload, LocalRef::NULL);
    assert_eq!(trace, LocalRef::NULL);
    clear::<LocalRuntime>();
}

#[test]
fn dropping_captured_triple_releases_everything() {
    let live_before = LocalRuntime::live_objects();
    raise_zero_division();
    let triple = capture::<LocalRuntime>().unwrap();
    assert!(LocalRuntime::live_objects() > live_before);
    drop(triple);
    assert_eq!(LocalRuntime::live_objects(), live_before);
}

#[test]
fn into_parts_hands_over_handles() {
    raise_zero_division();
    let (kind, payload, trace) = capture::<LocalRuntime>().unwrap().into_parts();
    assert!(kind.is_some());
    assert_eq!(payload.unwrap().str().and_then(|s| s.text()).as_deref(), Some("division by zero"));
    assert!(trace.is_none());
}
