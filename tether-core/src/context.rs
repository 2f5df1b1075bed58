//! Per-request context.
//!
//! A [`Context`] carries the outgoing request, the response once one exists,
//! the error slot, the transport handle and a key/value store that inherits
//! from an optional parent. Lookups walk local store first, then the parent
//! chain; writes, deletes and clears only touch the local store.
//!
//! ```
//! use std::sync::Arc;
//! use tether_core::Context;
//!
//! let mut client = Context::new();
//! client.set("tenant", "acme");
//!
//! let mut request = Context::new();
//! request.use_parent(Arc::new(client));
//! assert_eq!(request.get_string("tenant").as_deref(), Some("acme"));
//!
//! request.set("tenant", "globex");
//! assert_eq!(request.get_string("tenant").as_deref(), Some("globex"));
//! request.delete("tenant");
//! assert_eq!(request.get_string("tenant").as_deref(), Some("acme"));
//! ```

use crate::error::Error;
use crate::message::{HttpRequest, HttpResponse};
use crate::phase::PHASE_KEY;
use crate::transport::{Transport, TransportHandle};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Types usable as context keys.
pub trait KeyLike: Hash + Eq + fmt::Debug + Send + Sync + 'static {}

impl<T> KeyLike for T where T: Hash + Eq + fmt::Debug + Send + Sync + 'static {}

trait DynKey: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynKey) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T: KeyLike> DynKey for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// Type-erased store key.
///
/// Keys of different types never compare equal. String literals are stored
/// as `String`, so `"id"` and `String::from("id")` address the same entry.
#[derive(Clone)]
pub struct Key(Arc<dyn DynKey>);

impl Key {
    pub fn new<K: KeyLike>(key: K) -> Self {
        let any: &dyn Any = &key;
        if let Some(key) = any.downcast_ref::<Key>() {
            return key.clone();
        }
        if let Some(text) = any.downcast_ref::<&'static str>() {
            return Self(Arc::new(text.to_string()));
        }
        Self(Arc::new(key))
    }

    /// Borrow the key as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// Borrow the key as its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(&*other.0)
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Type-erased store value.
///
/// [`Value::null`] is a stored "no value", which is different from a key
/// that is absent.
#[derive(Clone)]
pub struct Value {
    inner: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let any: &dyn Any = &value;
        if let Some(value) = any.downcast_ref::<Value>() {
            return value.clone();
        }
        Self {
            inner: Some(Arc::new(value)),
            type_name: type_name::<T>(),
        }
    }

    /// Explicit "no value".
    pub fn null() -> Self {
        Self {
            inner: None,
            type_name: "null",
        }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Borrow the value as `T`; `None` on a type mismatch or null.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_deref()?.downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Name of the stored type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn as_string(&self) -> Option<String> {
        if let Some(text) = self.downcast_ref::<String>() {
            return Some(text.clone());
        }
        self.downcast_ref::<&'static str>().map(|text| text.to_string())
    }

    fn as_int(&self) -> Option<i64> {
        macro_rules! widen {
            ($($ty:ty),*) => {
                $(
                    if let Some(n) = self.downcast_ref::<$ty>() {
                        return i64::try_from(*n).ok();
                    }
                )*
            };
        }
        widen!(i64, i32, i16, i8, isize, u64, u32, u16, u8, usize);
        None
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.as_string() {
            return f.debug_tuple("Value").field(&text).finish();
        }
        if let Some(n) = self.as_int() {
            return f.debug_tuple("Value").field(&n).finish();
        }
        if let Some(b) = self.downcast_ref::<bool>() {
            return f.debug_tuple("Value").field(b).finish();
        }
        write!(f, "Value(<{}>)", self.type_name)
    }
}

/// State shared by every plugin that runs for one request.
pub struct Context {
    /// Outgoing request.
    pub request: HttpRequest,
    /// Response, once received or synthesized by a handler.
    pub response: Option<HttpResponse>,
    /// Pending error. The error phase may clear it.
    pub error: Option<Error>,
    transport: TransportHandle,
    store: HashMap<Key, Value>,
    parent: Option<Arc<Context>>,
}

impl Context {
    /// Create an empty context without a transport.
    pub fn new() -> Self {
        Self::with_transport_handle(TransportHandle::default())
    }

    /// Create an empty context using the given transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::with_transport_handle(TransportHandle::new(transport))
    }

    fn with_transport_handle(transport: TransportHandle) -> Self {
        Self {
            request: HttpRequest::default(),
            response: None,
            error: None,
            transport,
            store: HashMap::new(),
            parent: None,
        }
    }

    fn lookup(&self, key: &Key) -> Option<&Value> {
        match self.store.get(key) {
            Some(value) => Some(value),
            None => self.parent.as_deref()?.lookup(key),
        }
    }

    /// Nearest value for `key`, local store first.
    pub fn get<K: KeyLike>(&self, key: K) -> Option<Value> {
        self.lookup(&Key::new(key)).cloned()
    }

    /// Like [`Context::get`] with an explicit found flag. Absent keys yield
    /// a null value.
    pub fn get_ok<K: KeyLike>(&self, key: K) -> (Value, bool) {
        match self.get(key) {
            Some(value) => (value, true),
            None => (Value::null(), false),
        }
    }

    /// Value as `T`, `None` when absent or of another type.
    pub fn get_as<T, K>(&self, key: K) -> Option<T>
    where
        T: Clone + 'static,
        K: KeyLike,
    {
        self.lookup(&Key::new(key))?.downcast_ref::<T>().cloned()
    }

    /// String value (`String` or `&'static str`).
    pub fn get_string<K: KeyLike>(&self, key: K) -> Option<String> {
        self.lookup(&Key::new(key))?.as_string()
    }

    /// Integer value of any primitive integer type that fits in `i64`.
    pub fn get_int<K: KeyLike>(&self, key: K) -> Option<i64> {
        self.lookup(&Key::new(key))?.as_int()
    }

    pub fn get_bool<K: KeyLike>(&self, key: K) -> Option<bool> {
        self.get_as::<bool, K>(key)
    }

    /// Store a value locally. Passing a [`Value`] stores it as is.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: KeyLike,
        V: Any + Send + Sync,
    {
        self.store.insert(Key::new(key), Value::new(value));
    }

    /// Store an explicit null, shadowing any parent value.
    pub fn set_null<K: KeyLike>(&mut self, key: K) {
        self.store.insert(Key::new(key), Value::null());
    }

    /// Remove a key from the local store. A parent value becomes visible again.
    pub fn delete<K: KeyLike>(&mut self, key: K) -> Option<Value> {
        self.store.remove(&Key::new(key))
    }

    pub fn contains<K: KeyLike>(&self, key: K) -> bool {
        self.lookup(&Key::new(key)).is_some()
    }

    /// Snapshot of every visible entry; local entries override the parent's.
    pub fn get_all(&self) -> HashMap<Key, Value> {
        let mut all = self
            .parent
            .as_deref()
            .map(Context::get_all)
            .unwrap_or_default();
        all.extend(self.store.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    /// Empty the local store.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn use_parent(&mut self, parent: Arc<Context>) {
        self.parent = Some(parent);
    }

    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    /// Top-most ancestor, or `self` when there is no parent.
    pub fn root(&self) -> &Context {
        let mut ctx = self;
        while let Some(parent) = ctx.parent.as_deref() {
            ctx = parent;
        }
        ctx
    }

    /// Copy the visible entries into `other`'s local store.
    pub fn copy_to(&self, other: &mut Context) {
        other.store.extend(self.get_all());
    }

    /// Phase currently being run, if any.
    pub fn phase(&self) -> Option<String> {
        self.get_string(PHASE_KEY)
    }

    pub fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }

    pub fn clear_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Attach a response. Attaching one before the network call makes the
    /// dispatcher skip the call.
    pub fn set_response(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    /// Current transport, decorators included.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.get()
    }

    pub fn transport_handle(&self) -> &TransportHandle {
        &self.transport
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport.set(transport);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Context {
    /// Copies the local store and descriptors and gives the copy its own
    /// transport slot. The parent is shared.
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            response: self.response.clone(),
            error: self.error.clone(),
            transport: self.transport.detached(),
            store: self.store.clone(),
            parent: self.parent.clone(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("error", &self.error)
            .field("store", &self.store)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
