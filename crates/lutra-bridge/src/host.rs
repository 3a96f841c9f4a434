//! Host objects and the protocol the bridge drives on them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::HostError;
use crate::value::HostValue;

/// The property protocol a host object exposes to script.
///
/// Script-side proxy traps forward to these methods. Implementations use
/// interior mutability; the bridge is single-threaded, so a plain `RefCell`
/// is enough.
pub trait HostObject {
    /// Look up a key. `None` means absent (script sees `undefined` and
    /// `in` reports false); `Some(HostValue::Void)` is a present key whose
    /// value is `undefined`.
    fn get(&self, key: &str) -> Option<HostValue>;

    /// Store a value under a key.
    fn set(&self, key: &str, value: HostValue);

    /// Remove a key. Returns false when the key cannot be removed;
    /// removing an absent key is a no-op reported as true, like `delete`.
    fn remove(&self, key: &str) -> bool;

    /// Key presence; drives `in` and `hasOwnProperty` on the script side.
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Enumerable keys, in the object's own order.
    fn keys(&self) -> Vec<String>;

    /// Element count for sequence-like objects.
    fn len(&self) -> Option<usize> {
        None
    }

    /// Invoke the object. Errors are thrown into script as `Error`s.
    fn call(&self, _args: &[HostValue]) -> Result<HostValue, HostError> {
        Err(HostError::new("object is not callable"))
    }

    fn is_callable(&self) -> bool {
        false
    }
}

/// Cloneable handle to a host object; identity is the `Rc` pointer.
#[derive(Clone)]
pub struct HostRef(Rc<dyn HostObject>);

impl HostRef {
    pub fn new(object: Rc<dyn HostObject>) -> Self {
        Self(object)
    }

    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Cache key for the host -> script wrapper cache.
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl std::ops::Deref for HostRef {
    type Target = dyn HostObject;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl std::fmt::Debug for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostRef({:p})", Rc::as_ptr(&self.0))
    }
}

impl<T: HostObject + 'static> From<Rc<T>> for HostRef {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl From<Rc<dyn HostObject>> for HostRef {
    fn from(rc: Rc<dyn HostObject>) -> Self {
        Self(rc)
    }
}

/// String-keyed host dictionary with deterministic (sorted) enumeration.
#[derive(Default)]
pub struct HostDict {
    entries: RefCell<BTreeMap<String, HostValue>>,
}

impl HostDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: HostValue) {
        self.entries.borrow_mut().insert(key.into(), value);
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, HostValue> {
        self.entries.borrow().clone()
    }
}

impl HostObject for HostDict {
    fn get(&self, key: &str) -> Option<HostValue> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: HostValue) {
        self.entries.borrow_mut().insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.borrow_mut().remove(key);
        true
    }

    fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    fn len(&self) -> Option<usize> {
        Some(self.entries.borrow().len())
    }
}

/// Host list presented to script with array semantics.
///
/// Indices are canonical numeric strings. `length` reads the element count;
/// assigning it truncates or pads with `Void`. Reading out of range is
/// absent (script sees `undefined`), deleting an index leaves a `Void` hole
/// and writing past the end pads the gap, all as a script array would.
#[derive(Default)]
pub struct HostList {
    items: RefCell<Vec<HostValue>>,
}

impl HostList {
    pub fn new(items: Vec<HostValue>) -> Self {
        Self {
            items: RefCell::new(items),
        }
    }

    pub fn snapshot(&self) -> Vec<HostValue> {
        self.items.borrow().clone()
    }

    fn set_length(&self, value: &HostValue) {
        let Some(n) = value.as_f64() else { return };
        if n < 0.0 || n.fract() != 0.0 {
            return;
        }
        let n = n as usize;
        let mut items = self.items.borrow_mut();
        if n <= items.len() {
            items.truncate(n);
        } else {
            items.resize(n, HostValue::Void);
        }
    }
}

/// Canonical array index: digits only, no leading zeros.
fn parse_index(key: &str) -> Option<usize> {
    if key == "0" {
        return Some(0);
    }
    if key.is_empty() || key.starts_with('0') || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

impl HostObject for HostList {
    fn get(&self, key: &str) -> Option<HostValue> {
        if key == "length" {
            return Some(HostValue::Int(self.items.borrow().len() as i64));
        }
        parse_index(key).and_then(|i| self.items.borrow().get(i).cloned())
    }

    fn set(&self, key: &str, value: HostValue) {
        if key == "length" {
            self.set_length(&value);
            return;
        }
        let Some(i) = parse_index(key) else { return };
        let mut items = self.items.borrow_mut();
        if i < items.len() {
            items[i] = value;
        } else {
            items.resize(i, HostValue::Void);
            items.push(value);
        }
    }

    fn remove(&self, key: &str) -> bool {
        if key == "length" {
            return false;
        }
        if let Some(i) = parse_index(key) {
            let mut items = self.items.borrow_mut();
            if i < items.len() {
                items[i] = HostValue::Void;
            }
        }
        true
    }

    fn keys(&self) -> Vec<String> {
        (0..self.items.borrow().len()).map(|i| i.to_string()).collect()
    }

    fn len(&self) -> Option<usize> {
        Some(self.items.borrow().len())
    }
}

type HostFnImpl = dyn Fn(&[HostValue]) -> Result<HostValue, HostError>;

/// A host closure callable from script.
pub struct HostFn {
    f: Box<HostFnImpl>,
}

impl HostFn {
    pub fn new(f: impl Fn(&[HostValue]) -> Result<HostValue, HostError> + 'static) -> Self {
        Self { f: Box::new(f) }
    }
}

impl HostObject for HostFn {
    fn get(&self, _key: &str) -> Option<HostValue> {
        None
    }

    fn set(&self, _key: &str, _value: HostValue) {}

    fn remove(&self, _key: &str) -> bool {
        true
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn call(&self, args: &[HostValue]) -> Result<HostValue, HostError> {
        (self.f)(args)
    }

    fn is_callable(&self) -> bool {
        true
    }
}
