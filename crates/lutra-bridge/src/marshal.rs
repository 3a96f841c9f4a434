//! Value marshaling between the engine and `HostValue`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rquickjs::{Ctx, Object, Persistent, Value};

use crate::cache::note_script_wrapper_created;
use crate::context::{ContextCore, helper_call};
use crate::error::{BridgeError, BridgeResult};
use crate::object::{ScriptObject, ScriptObjectCore};
use crate::proxy::wrap_host_object;
use crate::value::HostValue;

/// Identity key of a script object within its context.
pub(crate) fn object_key(obj: &Object<'_>) -> usize {
    let raw = obj.as_value().as_raw();
    // Live cache entries pin their object through a Persistent, so the
    // pointer cannot be reused while the entry exists.
    unsafe { raw.u.ptr as usize }
}

/// Marshal an engine value for the host.
///
/// `receiver` is the object a function-valued property was read from; it is
/// captured as the wrapper's bound `this` so the host can call methods with
/// the receiver they came from.
pub(crate) fn js_to_host<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    value: Value<'js>,
    receiver: Option<&Object<'js>>,
) -> rquickjs::Result<HostValue> {
    if value.is_undefined() {
        return Ok(HostValue::Void);
    }
    if value.is_null() {
        return Ok(HostValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(HostValue::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(HostValue::Int(i64::from(i)));
    }
    if let Some(f) = value.as_float() {
        return Ok(HostValue::from_number(f));
    }
    if let Some(s) = value.as_string() {
        return Ok(HostValue::Str(s.to_string()?));
    }
    if let Some(obj) = value.as_object() {
        // A proxy for one of our own host objects unwraps to the original.
        let slot: i32 = helper_call(&core.helpers.slot_of, ctx, (value.clone(),))?;
        if slot >= 0 {
            if let Some(entry) = core.caches.borrow().host_slots.get(&(slot as u32)) {
                return Ok(HostValue::Object(entry.host.clone()));
            }
        }
        let receiver = if value.is_function() { receiver } else { None };
        let bound_this = receiver.map(|r| r.clone().into_value());
        let wrapper = wrap_script_object(core, ctx, obj.clone(), bound_this)?;
        return Ok(HostValue::Script(wrapper));
    }
    tracing::debug!("unsupported engine value type reached the bridge");
    Ok(HostValue::Void)
}

/// Marshal a host value into the engine.
pub(crate) fn host_to_js<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    value: &HostValue,
) -> rquickjs::Result<Value<'js>> {
    match value {
        HostValue::Void => Ok(Value::new_undefined(ctx.clone())),
        HostValue::Null => Ok(Value::new_null(ctx.clone())),
        HostValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        HostValue::Int(i) => Ok(match i32::try_from(*i) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_number(ctx.clone(), *i as f64),
        }),
        HostValue::Float(f) => Ok(Value::new_number(ctx.clone(), *f)),
        HostValue::Str(s) => Ok(rquickjs::String::from_str(ctx.clone(), s)?.into_value()),
        HostValue::Object(host) => wrap_host_object(core, ctx, host),
        HostValue::Script(obj) => {
            if !Rc::ptr_eq(obj.context_core(), core) {
                let err: Value = helper_call(
                    &core.helpers.mk_type_err,
                    ctx,
                    ("value belongs to a different script context",),
                )?;
                return Err(ctx.throw(err));
            }
            obj.restore(ctx)
        }
    }
}

/// Wrap a script object through the identity cache.
pub(crate) fn wrap_script_object<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: Object<'js>,
    bound_this: Option<Value<'js>>,
) -> rquickjs::Result<ScriptObject> {
    let key = object_key(&obj);
    let cached = core
        .caches
        .borrow()
        .script_wrappers
        .get(&key)
        .and_then(Weak::upgrade);
    if let Some(existing) = cached {
        return Ok(ScriptObject::from_core(existing));
    }
    let wrapper = Rc::new(ScriptObjectCore {
        obj: Persistent::save(ctx, obj),
        bound_this: bound_this.map(|v| Persistent::save(ctx, v)),
        key,
        seq: RefCell::new(Weak::new()),
        ctx: core.clone(),
    });
    note_script_wrapper_created();
    core.caches
        .borrow_mut()
        .script_wrappers
        .insert(key, Rc::downgrade(&wrapper));
    tracing::trace!(key, "script object wrapped");
    Ok(ScriptObject::from_core(wrapper))
}

/// Map an engine error into the bridge taxonomy, pulling the pending
/// exception off the context when there is one.
pub(crate) fn lift<'js, T>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    result: rquickjs::Result<T>,
) -> BridgeResult<T> {
    result.map_err(|err| match err {
        rquickjs::Error::Exception => catch_script_error(core, ctx),
        rquickjs::Error::Allocation => BridgeError::OutOfMemory,
        other => BridgeError::engine(other.to_string()),
    })
}

pub(crate) fn catch_script_error(core: &Rc<ContextCore>, ctx: &Ctx<'_>) -> BridgeError {
    let thrown = ctx.catch();
    let message = exception_message(&thrown);
    let value = js_to_host(core, ctx, thrown, None).ok().map(Box::new);
    BridgeError::Script { message, value }
}

fn exception_message(value: &Value<'_>) -> String {
    if let Some(obj) = value.as_object() {
        if let Ok(m) = obj.get::<_, Value>("message") {
            if let Some(s) = m.as_string() {
                if let Ok(s) = s.to_string() {
                    return s;
                }
            }
        }
    }
    if let Some(s) = value.as_string() {
        if let Ok(s) = s.to_string() {
            return s;
        }
    }
    if let Some(i) = value.as_int() {
        return i.to_string();
    }
    if let Some(f) = value.as_float() {
        return f.to_string();
    }
    if let Some(b) = value.as_bool() {
        return b.to_string();
    }
    "uncaught script exception".to_owned()
}
