/// Tests for the foreign exception carrier: rendering, accessors and reference counts.
use errgate::{
    ErrorTriple, ExceptionSummary, ForeignException, ForeignRuntime, Owned, is_pending,
    local::{Builtin, LocalRef, LocalRuntime},
};
use pretty_assertions::assert_eq;

type Exc = ForeignException<LocalRuntime>;

fn raise_zero_division() {
    let kind = LocalRuntime::builtin(Builtin::ZeroDivisionError);
    // SAFETY: `kind` is alive for the call; `set_string` takes its own reference.
    unsafe { LocalRuntime::error_set_string(kind.as_ptr(), c"division by zero") };
}

/// Builds a `SyntaxError` instance with the given attributes.
fn syntax_error(text: Option<&str>, offset: Option<i64>, msg: Option<&str>) -> Owned<LocalRuntime> {
    let class = LocalRuntime::builtin(Builtin::SyntaxError);
    let exc = LocalRuntime::new_instance(&class, msg);
    if let Some(text) = text {
        LocalRuntime::set_attr(&exc, "text", &LocalRuntime::new_str(text));
    }
    if let Some(offset) = offset {
        LocalRuntime::set_attr(&exc, "offset", &LocalRuntime::new_int(offset));
    }
    if let Some(msg) = msg {
        LocalRuntime::set_attr(&exc, "msg", &LocalRuntime::new_str(msg));
    }
    exc
}

fn raise(payload: &Owned<LocalRuntime>, trace: Option<&Owned<LocalRuntime>>) {
    let class = with_class(payload);
    ErrorTriple::new(Some(class), Some(payload.clone_ref()), trace.map(Owned::clone_ref)).restore();
}

/// The builtin class matching an instance's type name.
fn with_class(payload: &Owned<LocalRuntime>) -> Owned<LocalRuntime> {
    match payload.type_name().as_deref() {
        Some("SyntaxError") => LocalRuntime::builtin(Builtin::SyntaxError),
        Some("ZeroDivisionError") => LocalRuntime::builtin(Builtin::ZeroDivisionError),
        _ => LocalRuntime::builtin(Builtin::Exception),
    }
}

#[test]
fn zero_division_message() {
    raise_zero_division();
    let exc = Exc::capture().expect("error should be pending");
    assert_eq!(exc.message(), "ZeroDivisionError: division by zero");
    assert_eq!(exc.to_string(), "ZeroDivisionError: division by zero");
    assert!(exc.trace().is_none());
    assert!(!is_pending::<LocalRuntime>());
}

#[test]
fn syntax_error_message() {
    let payload = syntax_error(Some("x = = 1"), Some(5), Some("invalid syntax"));
    raise(&payload, None);

    let exc = Exc::capture().unwrap();
    assert_eq!(exc.message(), "x = = 1\n    ^\nSyntaxError: invalid syntax");
    let lines: Vec<&str> = exc.message().lines().collect();
    assert_eq!(lines, ["x = = 1", "    ^", "SyntaxError: invalid syntax"]);
}

#[test]
fn syntax_error_accessors() {
    let payload = syntax_error(Some("x = = 1"), Some(5), Some("invalid syntax"));
    raise(&payload, None);
    let exc = Exc::capture().unwrap();

    assert_eq!(exc.py_message(), "invalid syntax");
    assert_eq!(exc.py_offset(), 5);
    assert!(!is_pending::<LocalRuntime>());
}

#[test]
fn accessors_degrade_silently() {
    raise_zero_division();
    let exc = Exc::capture().unwrap();

    assert_eq!(exc.py_message(), "");
    assert_eq!(exc.py_offset(), -1);
    assert!(!is_pending::<LocalRuntime>(), "failed lookups must not leave errors behind");
}

#[test]
fn py_message_prefers_message_attribute() {
    let class = LocalRuntime::builtin(Builtin::Exception);
    let payload = LocalRuntime::new_instance(&class, Some("shown"));
    LocalRuntime::set_attr(&payload, "message", &LocalRuntime::new_str("from message"));
    LocalRuntime::set_attr(&payload, "msg", &LocalRuntime::new_str("from msg"));
    raise(&payload, None);

    assert_eq!(Exc::capture().unwrap().py_message(), "from message");
}

#[test]
fn teardown_releases_each_component_once() {
    let class = LocalRuntime::new_type("CustomError", Some(&LocalRuntime::builtin(Builtin::Exception)));
    let payload = LocalRuntime::new_instance(&class, Some("boom"));
    let trace = LocalRuntime::new_traceback(3);
    let ptrs = [class.as_ptr(), payload.as_ptr(), trace.as_ptr()];
    let baseline = ptrs.map(LocalRuntime::refcount);

    ErrorTriple::new(Some(class.clone_ref()), Some(payload.clone_ref()), Some(trace.clone_ref())).restore();
    let pre_capture = ptrs.map(LocalRuntime::refcount);
    assert_eq!(pre_capture, baseline.map(|count| count + 1));

    let exc = Exc::capture().unwrap();
    assert_eq!(ptrs.map(LocalRuntime::refcount), pre_capture, "capture transfers, never copies");

    drop(exc);
    assert_eq!(ptrs.map(LocalRuntime::refcount), pre_capture.map(|count| count - 1));
}

#[test]
fn accessors_take_co_ownership() {
    raise_zero_division();
    let exc = Exc::capture().unwrap();
    let payload_ptr = exc.triple().payload().unwrap().as_ptr();
    let before = LocalRuntime::refcount(payload_ptr);

    let first = exc.payload().unwrap();
    let second = exc.payload().unwrap();
    assert_eq!(LocalRuntime::refcount(payload_ptr), before + 2);
    assert!(first.is(&second));

    drop(first);
    drop(second);
    assert_eq!(LocalRuntime::refcount(payload_ptr), before);

    let kept = exc.payload().unwrap();
    drop(exc);
    assert_eq!(LocalRuntime::refcount(payload_ptr), 1, "accessor reference outlives the carrier");
    assert_eq!(kept.type_name().as_deref(), Some("ZeroDivisionError"));
}

#[test]
fn restore_co_owns_and_carrier_stays_valid() {
    raise_zero_division();
    let exc = Exc::capture().unwrap();
    let payload_ptr = exc.triple().payload().unwrap().as_ptr();
    let before = LocalRuntime::refcount(payload_ptr);

    exc.restore();
    assert_eq!(LocalRuntime::refcount(payload_ptr), before + 1);
    assert_eq!(LocalRuntime::peek_pending().map(|(_, payload, _)| payload), Some(payload_ptr));
    assert_eq!(exc.message(), "ZeroDivisionError: division by zero");

    drop(exc);
    assert_eq!(LocalRuntime::refcount(payload_ptr), 1, "slot holds the only reference");

    let recaptured = Exc::capture().unwrap();
    assert_eq!(recaptured.message(), "ZeroDivisionError: division by zero");
}

#[test]
fn into_pending_transfers_ownership() {
    let live_before = LocalRuntime::live_objects();
    raise_zero_division();
    let exc = Exc::capture().unwrap();
    let payload_ptr = exc.triple().payload().unwrap().as_ptr();

    exc.into_pending();
    assert_eq!(LocalRuntime::refcount(payload_ptr), 1);

    errgate::clear::<LocalRuntime>();
    assert_eq!(LocalRuntime::live_objects(), live_before);
}

#[test]
fn check_reports_pending_error() {
    assert!(Exc::check().is_ok());
    raise_zero_division();
    let err = Exc::check().unwrap_err();
    assert_eq!(err.message(), "ZeroDivisionError: division by zero");
}

#[test]
fn carrier_over_empty_triple() {
    let exc = Exc::new(ErrorTriple::new(None, None, None));
    assert_eq!(exc.message(), "");
    assert!(exc.kind().is_none());
    assert!(exc.payload().is_none());
    assert_eq!(exc.py_message(), "");
    assert_eq!(exc.py_offset(), -1);
}

#[test]
fn summary_snapshot() {
    let payload = syntax_error(Some("x = = 1"), Some(5), Some("invalid syntax"));
    raise(&payload, None);
    let summary = Exc::capture().unwrap().summary();

    assert_eq!(
        summary,
        ExceptionSummary {
            type_name: "SyntaxError".to_owned(),
            message: "invalid syntax".to_owned(),
            offset: Some(5),
            rendered: "x = = 1\n    ^\nSyntaxError: invalid syntax".to_owned(),
        }
    );

    let json = serde_json::to_string(&summary).unwrap();
    let decoded: ExceptionSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, summary);
}

#[test]
fn traceback_is_kept() {
    let class = LocalRuntime::builtin(Builtin::Exception);
    let payload = LocalRuntime::new_instance(&class, Some("with trace"));
    let trace = LocalRuntime::new_traceback(7);
    raise(&payload, Some(&trace));

    let exc = Exc::capture().unwrap();
    assert_eq!(exc.trace().map(|t| t.as_ptr()), Some(trace.as_ptr()));
    assert_ne!(trace.as_ptr(), LocalRef::NULL);
}
