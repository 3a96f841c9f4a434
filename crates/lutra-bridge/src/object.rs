//! Host-side wrapper for script objects.
//!
//! `ScriptObject` exposes two views of the same object. The attribute view
//! follows the full lookup chain (`in` semantics): an absent attribute is
//! an error, a present-but-`undefined` one is `Void`. The mapping view
//! covers own enumerable properties only (`Object.keys` semantics), the way
//! a dictionary would. Script functions are plain objects under both views.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rquickjs::{Array, Ctx, Object, Persistent, Value};

use crate::array::ArrayCore;
use crate::cache::note_script_wrapper_dropped;
use crate::context::{ContextCore, helper_call};
use crate::error::{BridgeError, BridgeResult};
use crate::marshal::{host_to_js, js_to_host, lift};
use crate::value::HostValue;

/// Shared state of one wrapped script object.
///
/// The wrapper pins its object through a `Persistent` and its whole context
/// through the `Rc<ContextCore>`, so a wrapper stays functional after every
/// `BridgeContext` handle is gone.
pub(crate) struct ScriptObjectCore {
    pub(crate) obj: Persistent<Object<'static>>,
    /// Receiver captured when a function-valued property was read
    pub(crate) bound_this: Option<Persistent<Value<'static>>>,
    pub(crate) key: usize,
    /// Sequence adapter, shared so `as_seq` preserves identity
    pub(crate) seq: RefCell<Weak<ArrayCore>>,
    pub(crate) ctx: Rc<ContextCore>,
}

impl Drop for ScriptObjectCore {
    fn drop(&mut self) {
        note_script_wrapper_dropped();
        // Wrappers can drop inside engine callbacks; leave a stale entry
        // behind rather than fight an active borrow.
        if let Ok(mut caches) = self.ctx.caches.try_borrow_mut() {
            if let Some(entry) = caches.script_wrappers.get(&self.key) {
                if entry.upgrade().is_none() {
                    caches.script_wrappers.remove(&self.key);
                }
            }
        }
        tracing::trace!(key = self.key, "script object wrapper dropped");
    }
}

/// A script object wrapped for the host.
///
/// Clones share the wrapper; identity of the underlying script object is
/// `ptr_eq` (wrapping the same object twice yields the same wrapper).
#[derive(Clone)]
pub struct ScriptObject {
    core: Rc<ScriptObjectCore>,
}

impl ScriptObject {
    pub(crate) fn from_core(core: Rc<ScriptObjectCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Rc<ScriptObjectCore> {
        &self.core
    }

    pub(crate) fn context_core(&self) -> &Rc<ContextCore> {
        &self.core.ctx
    }

    pub(crate) fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        Ok(self.core.obj.clone().restore(ctx)?.into_value())
    }

    /// True when both handles wrap the same script object.
    pub fn ptr_eq(&self, other: &ScriptObject) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Enter the engine with this object restored.
    pub(crate) fn enter<R>(
        &self,
        f: impl for<'js> FnOnce(&Rc<ContextCore>, &Ctx<'js>, &Object<'js>) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        let core = self.core.ctx.clone();
        core.with(|ctx| {
            let obj = lift(&core, ctx, self.core.obj.clone().restore(ctx))?;
            f(&core, ctx, &obj)
        })
    }

    fn has_own<'js>(
        core: &Rc<ContextCore>,
        ctx: &Ctx<'js>,
        obj: &Object<'js>,
        key: &str,
    ) -> BridgeResult<bool> {
        lift(
            core,
            ctx,
            helper_call(&core.helpers.has_own, ctx, (obj.clone(), key)),
        )
    }

    /// Attribute read (inherited lookup). Absent is an error; a present
    /// attribute whose value is `undefined` reads as `Void`.
    pub fn attr(&self, name: &str) -> BridgeResult<HostValue> {
        self.enter(|core, ctx, obj| {
            let present: bool = lift(
                core,
                ctx,
                helper_call(&core.helpers.has_prop, ctx, (obj.clone(), name)),
            )?;
            if !present {
                return Err(BridgeError::attribute_not_found(name));
            }
            let value: Value = lift(core, ctx, obj.get(name))?;
            lift(core, ctx, js_to_host(core, ctx, value, Some(obj)))
        })
    }

    pub fn set_attr(&self, name: &str, value: impl Into<HostValue>) -> BridgeResult<()> {
        let value = value.into();
        self.enter(|core, ctx, obj| {
            let js = lift(core, ctx, host_to_js(core, ctx, &value))?;
            lift(core, ctx, obj.set(name, js))
        })
    }

    pub fn has_attr(&self, name: &str) -> BridgeResult<bool> {
        self.enter(|core, ctx, obj| {
            lift(
                core,
                ctx,
                helper_call(&core.helpers.has_prop, ctx, (obj.clone(), name)),
            )
        })
    }

    pub fn del_attr(&self, name: &str) -> BridgeResult<()> {
        self.enter(|core, ctx, obj| {
            let present: bool = lift(
                core,
                ctx,
                helper_call(&core.helpers.has_prop, ctx, (obj.clone(), name)),
            )?;
            if !present {
                return Err(BridgeError::attribute_not_found(name));
            }
            lift(
                core,
                ctx,
                helper_call(&core.helpers.del, ctx, (obj.clone(), name)),
            )
        })
    }

    /// Mapping read (own enumerable). Missing key is an error.
    pub fn item(&self, key: &str) -> BridgeResult<HostValue> {
        self.enter(|core, ctx, obj| {
            if !Self::has_own(core, ctx, obj, key)? {
                return Err(BridgeError::key_not_found(key));
            }
            let value: Value = lift(core, ctx, obj.get(key))?;
            lift(core, ctx, js_to_host(core, ctx, value, Some(obj)))
        })
    }

    pub fn set_item(&self, key: &str, value: impl Into<HostValue>) -> BridgeResult<()> {
        self.set_attr(key, value)
    }

    pub fn del_item(&self, key: &str) -> BridgeResult<()> {
        self.enter(|core, ctx, obj| {
            if !Self::has_own(core, ctx, obj, key)? {
                return Err(BridgeError::key_not_found(key));
            }
            lift(
                core,
                ctx,
                helper_call(&core.helpers.del, ctx, (obj.clone(), key)),
            )
        })
    }

    pub fn contains_key(&self, key: &str) -> BridgeResult<bool> {
        self.enter(|core, ctx, obj| Self::has_own(core, ctx, obj, key))
    }

    /// Like `item`, but a missing key yields `default`. A present key whose
    /// value is `undefined` still yields `Void`, not the default.
    pub fn get_or(&self, key: &str, default: impl Into<HostValue>) -> BridgeResult<HostValue> {
        let default = default.into();
        self.enter(|core, ctx, obj| {
            if !Self::has_own(core, ctx, obj, key)? {
                return Ok(default);
            }
            let value: Value = lift(core, ctx, obj.get(key))?;
            lift(core, ctx, js_to_host(core, ctx, value, Some(obj)))
        })
    }

    /// Remove a key and return its value; missing key is an error.
    pub fn pop(&self, key: &str) -> BridgeResult<HostValue> {
        self.enter(|core, ctx, obj| {
            if !Self::has_own(core, ctx, obj, key)? {
                return Err(BridgeError::key_not_found(key));
            }
            let value: Value = lift(core, ctx, obj.get(key))?;
            let value = lift(core, ctx, js_to_host(core, ctx, value, None))?;
            let _: () = lift(
                core,
                ctx,
                helper_call(&core.helpers.del, ctx, (obj.clone(), key)),
            )?;
            Ok(value)
        })
    }

    pub fn pop_or(&self, key: &str, default: impl Into<HostValue>) -> BridgeResult<HostValue> {
        match self.pop(key) {
            Err(BridgeError::KeyNotFound(_)) => Ok(default.into()),
            other => other,
        }
    }

    /// Return the value under `key`, storing and returning `default` when
    /// the key is missing.
    pub fn setdefault(&self, key: &str, default: impl Into<HostValue>) -> BridgeResult<HostValue> {
        let default = default.into();
        self.enter(|core, ctx, obj| {
            if Self::has_own(core, ctx, obj, key)? {
                let value: Value = lift(core, ctx, obj.get(key))?;
                return lift(core, ctx, js_to_host(core, ctx, value, None));
            }
            let js = lift(core, ctx, host_to_js(core, ctx, &default))?;
            lift(core, ctx, obj.set(key, js))?;
            Ok(default)
        })
    }

    pub fn update<I>(&self, pairs: I) -> BridgeResult<()>
    where
        I: IntoIterator<Item = (String, HostValue)>,
    {
        self.enter(|core, ctx, obj| {
            for (key, value) in pairs {
                let js = lift(core, ctx, host_to_js(core, ctx, &value))?;
                lift(core, ctx, obj.set(key.as_str(), js))?;
            }
            Ok(())
        })
    }

    /// Own enumerable keys, in the engine's enumeration order.
    pub fn keys(&self) -> BridgeResult<Vec<String>> {
        self.enter(|core, ctx, obj| {
            let mut out = Vec::new();
            for key in obj.keys::<String>() {
                out.push(lift(core, ctx, key)?);
            }
            Ok(out)
        })
    }

    pub fn values(&self) -> BridgeResult<Vec<HostValue>> {
        Ok(self.items()?.into_iter().map(|(_, v)| v).collect())
    }

    pub fn items(&self) -> BridgeResult<Vec<(String, HostValue)>> {
        self.enter(|core, ctx, obj| {
            let mut out = Vec::new();
            for key in obj.keys::<String>() {
                let key: String = lift(core, ctx, key)?;
                let value: Value = lift(core, ctx, obj.get(key.as_str()))?;
                let value = lift(core, ctx, js_to_host(core, ctx, value, Some(obj)))?;
                out.push((key, value));
            }
            Ok(out)
        })
    }

    /// Number of own enumerable keys.
    pub fn len(&self) -> BridgeResult<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_callable(&self) -> bool {
        self.enter(|_, _, obj| Ok(obj.as_value().is_function()))
            .unwrap_or(false)
    }

    /// Invoke the object as a function.
    ///
    /// When the wrapper came from a function-valued property read, the
    /// object it was read from is used as `this`; otherwise the call
    /// carries no receiver and a non-strict function sees the global
    /// object.
    pub fn call(&self, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.enter(|core, ctx, obj| {
            if !obj.as_value().is_function() {
                return Err(BridgeError::type_mismatch("object is not callable"));
            }
            let this = match &self.core.bound_this {
                Some(receiver) => lift(core, ctx, receiver.clone().restore(ctx))?,
                None => Value::new_undefined(ctx.clone()),
            };
            let call_args = lift(core, ctx, Array::new(ctx.clone()))?;
            for (i, arg) in args.iter().enumerate() {
                let js = lift(core, ctx, host_to_js(core, ctx, arg))?;
                lift(core, ctx, call_args.set(i, js))?;
            }
            let result: Value = lift(
                core,
                ctx,
                helper_call(&core.helpers.apply, ctx, (obj.clone(), this, call_args)),
            )?;
            lift(core, ctx, js_to_host(core, ctx, result, None))
        })
    }
}

impl PartialEq for ScriptObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScriptObject({:#x})", self.core.key)
    }
}
