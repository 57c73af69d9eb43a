//! An in-process foreign runtime.
//!
//! [`LocalRuntime`] implements [`ForeignRuntime`] on top of a small thread-local object
//! arena with explicit reference counts and a pending-error slot, following the same
//! conventions as the CPython C API: fetch transfers ownership, restore takes it,
//! `set_string` defers construction of the exception instance until the triple is
//! normalized, and failed attribute lookups or stringification leave an error pending.
//!
//! It lets hosts exercise boundary code without an interpreter, and it makes reference
//! counting observable: [`LocalRuntime::refcount`], [`LocalRuntime::is_alive`] and
//! [`LocalRuntime::live_objects`] report the arena's state, and releasing an object
//! that has already been freed panics instead of corrupting memory.
//!
//! The arena is per thread, as is the pending-error slot; handles are `!Send`, so
//! objects never cross between arenas.

use std::{borrow::Cow, cell::RefCell, ffi::CStr};

use strum::IntoStaticStr;

use crate::{handle::Owned, runtime::ForeignRuntime, sentinel::Sentinel};

/// A raw reference into the current thread's arena. Index 0 is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalRef(u32);

impl LocalRef {
    pub const NULL: Self = Self(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Object references fail with null.
impl Sentinel for LocalRef {
    fn sentinel() -> Self {
        Self::NULL
    }
}

/// Exception classes every arena starts with.
///
/// `Exception` is the root; every other builtin derives directly from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Builtin {
    Exception,
    RuntimeError,
    SyntaxError,
    TypeError,
    AttributeError,
    ZeroDivisionError,
}

impl Builtin {
    const ALL: [Self; 6] = [
        Self::Exception,
        Self::RuntimeError,
        Self::SyntaxError,
        Self::TypeError,
        Self::AttributeError,
        Self::ZeroDivisionError,
    ];
}

/// Marker type for the in-process runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRuntime;

impl LocalRuntime {
    /// Creates a string object.
    #[must_use]
    pub fn new_str(value: &str) -> Owned<Self> {
        own(with_arena(|arena| arena.alloc(Data::Str(value.to_owned()))))
    }

    /// Creates a byte string object.
    #[must_use]
    pub fn new_bytes(value: &[u8]) -> Owned<Self> {
        own(with_arena(|arena| arena.alloc(Data::Bytes(value.to_vec()))))
    }

    /// Creates an integer object.
    #[must_use]
    pub fn new_int(value: i64) -> Owned<Self> {
        own(with_arena(|arena| arena.alloc(Data::Int(value))))
    }

    /// Creates a traceback object.
    #[must_use]
    pub fn new_traceback(line: u32) -> Owned<Self> {
        own(with_arena(|arena| arena.alloc(Data::Traceback { line })))
    }

    /// Creates an exception class deriving from `base` (or from nothing).
    #[must_use]
    pub fn new_type(name: &str, base: Option<&Owned<Self>>) -> Owned<Self> {
        let base = base.map_or(LocalRef::NULL, Owned::as_ptr);
        own(with_arena(|arena| {
            if base != LocalRef::NULL {
                arena.incref(base);
            }
            arena.alloc(Data::Type {
                name: name.to_owned(),
                base,
            })
        }))
    }

    /// Creates an instance of `class`.
    ///
    /// `display` is what stringifying the instance produces; `None` makes
    /// stringification fail with a pending `TypeError`.
    #[must_use]
    pub fn new_instance(class: &Owned<Self>, display: Option<&str>) -> Owned<Self> {
        let class = class.as_ptr();
        own(with_arena(|arena| {
            arena.incref(class);
            arena.alloc(Data::Instance {
                class,
                attrs: Vec::new(),
                display: display.map(str::to_owned),
            })
        }))
    }

    /// A new reference to one of the builtin exception classes.
    #[must_use]
    pub fn builtin(builtin: Builtin) -> Owned<Self> {
        own(with_arena(|arena| {
            let class = arena.builtin(builtin);
            arena.incref(class);
            class
        }))
    }

    /// Sets an attribute on an instance, taking a new reference to `value`.
    ///
    /// # Panics
    /// Panics if `obj` is not an instance.
    pub fn set_attr(obj: &Owned<Self>, name: &str, value: &Owned<Self>) {
        with_arena(|arena| arena.set_attr(obj.as_ptr(), name, value.as_ptr()));
    }

    /// Current reference count of an object, or 0 once it has been freed.
    #[must_use]
    pub fn refcount(obj: LocalRef) -> usize {
        with_arena(|arena| arena.entry(obj).map_or(0, |entry| entry.refcount))
    }

    /// Returns `true` while the object has not been freed.
    #[must_use]
    pub fn is_alive(obj: LocalRef) -> bool {
        Self::refcount(obj) > 0
    }

    /// Number of live objects in this thread's arena, builtins included.
    #[must_use]
    pub fn live_objects() -> usize {
        with_arena(|arena| arena.entries.iter().filter(|slot| slot.is_some()).count())
    }

    /// The raw triple in the pending-error slot, without taking it.
    #[must_use]
    pub fn peek_pending() -> Option<(LocalRef, LocalRef, LocalRef)> {
        with_arena(|arena| arena.pending)
    }
}

// SAFETY: the arena is thread-local and needs no execution context; every operation
// follows the documented ownership rules, and invalid references panic rather than
// touching freed memory.
unsafe impl ForeignRuntime for LocalRuntime {
    type Object = LocalRef;

    const NULL: LocalRef = LocalRef::NULL;

    fn error_occurred() -> bool {
        with_arena(|arena| arena.pending.is_some())
    }

    fn error_fetch_clear() -> (LocalRef, LocalRef, LocalRef) {
        with_arena(|arena| arena.pending.take()).unwrap_or((LocalRef::NULL, LocalRef::NULL, LocalRef::NULL))
    }

    unsafe fn error_normalize(kind: &mut LocalRef, payload: &mut LocalRef, _trace: &mut LocalRef) {
        with_arena(|arena| arena.normalize(*kind, payload));
    }

    unsafe fn error_restore(kind: LocalRef, payload: LocalRef, trace: LocalRef) {
        with_arena(|arena| arena.restore(kind, payload, trace));
    }

    unsafe fn error_set_string(kind: LocalRef, message: &CStr) {
        let message = message.to_string_lossy();
        with_arena(|arena| arena.set_error(kind, &message));
    }

    fn error_clear() {
        with_arena(|arena| arena.restore(LocalRef::NULL, LocalRef::NULL, LocalRef::NULL));
    }

    unsafe fn incref(obj: LocalRef) {
        with_arena(|arena| arena.incref(obj));
    }

    unsafe fn decref(obj: LocalRef) {
        with_arena(|arena| arena.decref(obj));
    }

    unsafe fn get_attr(obj: LocalRef, name: &CStr) -> LocalRef {
        let name = name.to_string_lossy();
        with_arena(|arena| arena.get_attr(obj, &name))
    }

    unsafe fn str(obj: LocalRef) -> LocalRef {
        with_arena(|arena| arena.str(obj))
    }

    unsafe fn type_name(obj: LocalRef) -> Option<String> {
        with_arena(|arena| Some(arena.type_name(obj).into_owned()))
    }

    unsafe fn decode_text(obj: LocalRef) -> Option<String> {
        with_arena(|arena| match &arena.live(obj).data {
            Data::Str(s) => Some(s.clone()),
            Data::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        })
    }

    unsafe fn as_index(obj: LocalRef) -> Option<i64> {
        with_arena(|arena| match arena.live(obj).data {
            Data::Int(i) => Some(i),
            _ => None,
        })
    }

    unsafe fn is_syntax_error(obj: LocalRef) -> bool {
        with_arena(|arena| {
            let syntax_error = arena.builtin(Builtin::SyntaxError);
            arena.is_instance(obj, syntax_error)
        })
    }

    fn runtime_error() -> LocalRef {
        with_arena(|arena| arena.builtin(Builtin::RuntimeError))
    }
}

thread_local! {
    static ARENA: RefCell<Arena> = RefCell::new(Arena::new());
}

fn with_arena<T>(f: impl FnOnce(&mut Arena) -> T) -> T {
    ARENA.with(|arena| f(&mut arena.borrow_mut()))
}

fn own(obj: LocalRef) -> Owned<LocalRuntime> {
    // SAFETY: `obj` was just allocated (or increfed) on behalf of the caller.
    unsafe { Owned::from_owned_nonnull(obj) }
}

#[derive(Debug)]
enum Data {
    Str(String),
    Bytes(Vec<u8>),
    Int(i64),
    Traceback {
        line: u32,
    },
    Type {
        name: String,
        /// Owned reference, or null for a root class.
        base: LocalRef,
    },
    Instance {
        /// Owned reference.
        class: LocalRef,
        /// Owned references.
        attrs: Vec<(String, LocalRef)>,
        display: Option<String>,
    },
}

impl Data {
    /// Pushes the references this value owns.
    fn children(&self, out: &mut Vec<LocalRef>) {
        match self {
            Self::Type { base, .. } if *base != LocalRef::NULL => out.push(*base),
            Self::Instance { class, attrs, .. } => {
                out.push(*class);
                out.extend(attrs.iter().map(|(_, value)| *value));
            }
            _ => {}
        }
    }
}

#[derive(Debug)]
struct Entry {
    refcount: usize,
    data: Data,
}

#[derive(Debug)]
struct Arena {
    /// Slot 0 is never used so that `LocalRef(0)` can be null. Freed slots are not
    /// reused, which keeps object identities unique for the thread's lifetime.
    entries: Vec<Option<Entry>>,
    pending: Option<(LocalRef, LocalRef, LocalRef)>,
    /// Indexed by `Builtin as usize`; the arena owns one reference to each.
    builtins: Vec<LocalRef>,
}

impl Arena {
    fn new() -> Self {
        let mut arena = Self {
            entries: vec![None],
            pending: None,
            builtins: Vec::with_capacity(Builtin::ALL.len()),
        };
        let root = arena.alloc(Data::Type {
            name: <&str>::from(Builtin::Exception).to_owned(),
            base: LocalRef::NULL,
        });
        arena.builtins.push(root);
        for builtin in &Builtin::ALL[1..] {
            arena.incref(root);
            let class = arena.alloc(Data::Type {
                name: <&str>::from(*builtin).to_owned(),
                base: root,
            });
            arena.builtins.push(class);
        }
        arena
    }

    fn builtin(&self, builtin: Builtin) -> LocalRef {
        self.builtins[builtin as usize]
    }

    fn alloc(&mut self, data: Data) -> LocalRef {
        let id = u32::try_from(self.entries.len()).expect("LocalRuntime: arena exhausted");
        self.entries.push(Some(Entry { refcount: 1, data }));
        LocalRef(id)
    }

    fn entry(&self, obj: LocalRef) -> Option<&Entry> {
        self.entries.get(obj.index()).and_then(Option::as_ref)
    }

    /// # Panics
    /// Panics if the object is null, unknown or already freed.
    fn live(&self, obj: LocalRef) -> &Entry {
        self.entries
            .get(obj.index())
            .expect("LocalRuntime: slot missing")
            .as_ref()
            .expect("LocalRuntime: object already freed")
    }

    fn incref(&mut self, obj: LocalRef) {
        self.entries
            .get_mut(obj.index())
            .expect("LocalRuntime::incref: slot missing")
            .as_mut()
            .expect("LocalRuntime::incref: object already freed")
            .refcount += 1;
    }

    /// Releases one reference, freeing the object (and releasing its children) at zero.
    fn decref(&mut self, obj: LocalRef) {
        let mut work = vec![obj];
        while let Some(obj) = work.pop() {
            let slot = self
                .entries
                .get_mut(obj.index())
                .expect("LocalRuntime::decref: slot missing");
            let entry = slot.as_mut().expect("LocalRuntime::decref: object already freed");
            if entry.refcount > 1 {
                entry.refcount -= 1;
                continue;
            }
            if let Some(entry) = slot.take() {
                entry.data.children(&mut work);
            }
        }
    }

    fn decref_nullable(&mut self, obj: LocalRef) {
        if obj != LocalRef::NULL {
            self.decref(obj);
        }
    }

    /// Replaces the pending triple, taking ownership of the new components.
    ///
    /// A null `kind` clears the slot, as `PyErr_Restore` does.
    fn restore(&mut self, kind: LocalRef, payload: LocalRef, trace: LocalRef) {
        let new = if kind == LocalRef::NULL {
            self.decref_nullable(payload);
            self.decref_nullable(trace);
            None
        } else {
            Some((kind, payload, trace))
        };
        if let Some((kind, payload, trace)) = std::mem::replace(&mut self.pending, new) {
            self.decref_nullable(kind);
            self.decref_nullable(payload);
            self.decref_nullable(trace);
        }
    }

    /// Sets an unnormalized error: the payload is the bare message string.
    fn set_error(&mut self, kind: LocalRef, message: &str) {
        self.incref(kind);
        let payload = self.alloc(Data::Str(message.to_owned()));
        self.restore(kind, payload, LocalRef::NULL);
    }

    fn normalize(&mut self, kind: LocalRef, payload: &mut LocalRef) {
        if kind == LocalRef::NULL || (*payload != LocalRef::NULL && self.is_instance(*payload, kind)) {
            return;
        }
        let display = if *payload == LocalRef::NULL {
            String::new()
        } else {
            self.str_value(*payload).unwrap_or_default()
        };
        self.incref(kind);
        let instance = self.alloc(Data::Instance {
            class: kind,
            attrs: Vec::new(),
            display: Some(display),
        });
        self.decref_nullable(*payload);
        *payload = instance;
    }

    fn is_instance(&self, obj: LocalRef, class: LocalRef) -> bool {
        let Data::Instance { class: mut current, .. } = self.live(obj).data else {
            return false;
        };
        while current != LocalRef::NULL {
            if current == class {
                return true;
            }
            current = match self.live(current).data {
                Data::Type { base, .. } => base,
                _ => LocalRef::NULL,
            };
        }
        false
    }

    fn type_name(&self, obj: LocalRef) -> Cow<'_, str> {
        match &self.live(obj).data {
            Data::Str(_) => "str".into(),
            Data::Bytes(_) => "bytes".into(),
            Data::Int(_) => "int".into(),
            Data::Traceback { .. } => "traceback".into(),
            Data::Type { .. } => "type".into(),
            Data::Instance { class, .. } => match &self.live(*class).data {
                Data::Type { name, .. } => name.as_str().into(),
                _ => "object".into(),
            },
        }
    }

    fn set_attr(&mut self, obj: LocalRef, name: &str, value: LocalRef) {
        self.incref(value);
        let entry = self
            .entries
            .get_mut(obj.index())
            .and_then(Option::as_mut)
            .expect("LocalRuntime::set_attr: object already freed");
        let Data::Instance { attrs, .. } = &mut entry.data else {
            panic!("LocalRuntime::set_attr: attributes can only be set on instances");
        };
        let replaced = match attrs.iter_mut().find(|(attr, _)| attr == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                attrs.push((name.to_owned(), value));
                None
            }
        };
        if let Some(old) = replaced {
            self.decref(old);
        }
    }

    fn get_attr(&mut self, obj: LocalRef, name: &str) -> LocalRef {
        let found = match &self.live(obj).data {
            Data::Instance { attrs, .. } => attrs.iter().find(|(attr, _)| attr == name).map(|(_, value)| *value),
            _ => None,
        };
        if let Some(value) = found {
            self.incref(value);
            return value;
        }
        let message = format!("'{}' object has no attribute '{name}'", self.type_name(obj));
        let attribute_error = self.builtin(Builtin::AttributeError);
        self.set_error(attribute_error, &message);
        LocalRef::NULL
    }

    /// The text `str()` produces, or `None` if stringification fails.
    fn str_value(&self, obj: LocalRef) -> Option<String> {
        match &self.live(obj).data {
            Data::Str(s) => Some(s.clone()),
            Data::Bytes(b) => Some(format!("b'{}'", String::from_utf8_lossy(b))),
            Data::Int(i) => Some(i.to_string()),
            Data::Traceback { line } => Some(format!("<traceback line {line}>")),
            Data::Type { name, .. } => Some(format!("<class '{name}'>")),
            Data::Instance { display, .. } => display.clone(),
        }
    }

    fn str(&mut self, obj: LocalRef) -> LocalRef {
        if matches!(self.live(obj).data, Data::Str(_)) {
            self.incref(obj);
            return obj;
        }
        if let Some(text) = self.str_value(obj) {
            return self.alloc(Data::Str(text));
        }
        let message = format!("__str__ of '{}' object failed", self.type_name(obj));
        let type_error = self.builtin(Builtin::TypeError);
        self.set_error(type_error, &message);
        LocalRef::NULL
    }
}
