//! Host objects surfaced into script.
//!
//! A host object appears in script as a `Proxy`; its target is a native
//! function for callable hosts and a plain object otherwise, so `typeof`
//! and call errors come out right. The traps forward to an object of
//! native hook closures over the `HostObject`, so property reads, writes,
//! deletes, enumeration and calls all reach the host protocol. One hook
//! owns a finalize guard; when the engine frees the proxy subgraph the
//! guard drops and evicts the cache entry, which is how wrapper counts
//! return to baseline.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rquickjs::function::Rest;
use rquickjs::{Array, Ctx, Function, Object, Persistent, Value};

use crate::cache::{Caches, HostSlotEntry, note_host_wrapper_created, note_host_wrapper_dropped};
use crate::context::{ContextCore, helper_call};
use crate::host::HostRef;
use crate::marshal::{host_to_js, js_to_host};
use crate::value::HostValue;

struct FinalizeGuard {
    slot: u32,
    key: usize,
    caches: Weak<RefCell<Caches>>,
}

impl FinalizeGuard {
    fn new(slot: u32, key: usize, caches: &Rc<RefCell<Caches>>) -> Self {
        note_host_wrapper_created();
        Self {
            slot,
            key,
            caches: Rc::downgrade(caches),
        }
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        note_host_wrapper_dropped();
        if let Some(caches) = self.caches.upgrade() {
            // Finalization can run while the caches are borrowed elsewhere;
            // stale entries are also evicted lazily on the lookup path.
            if let Ok(mut caches) = caches.try_borrow_mut() {
                caches.evict_host_slot(self.slot, self.key);
            }
        }
        tracing::trace!(slot = self.slot, "host proxy finalized");
    }
}

/// Surface a host object in script, reusing the cached proxy when the same
/// object crossed before.
pub(crate) fn wrap_host_object<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    host: &HostRef,
) -> rquickjs::Result<Value<'js>> {
    let key = host.key();
    let hit = core.caches.borrow().host_wrappers.get(&key).copied();
    if let Some(slot) = hit {
        let proxy_ref = core
            .caches
            .borrow()
            .host_slots
            .get(&slot)
            .map(|entry| entry.proxy_ref.clone());
        if let Some(proxy_ref) = proxy_ref {
            let weak_ref = proxy_ref.restore(ctx)?;
            let proxy: Value = helper_call(&core.helpers.deref_weak, ctx, (weak_ref,))?;
            if !proxy.is_undefined() {
                return Ok(proxy);
            }
        }
        // Proxy already collected but its guard has not run; rebuild.
        core.caches.borrow_mut().evict_host_slot(slot, key);
    }

    let slot = core.caches.borrow_mut().alloc_slot();
    let weak_core = Rc::downgrade(core);
    let hooks = Object::new(ctx.clone())?;

    let get_host = host.clone();
    let get_core = weak_core.clone();
    hooks.set(
        "get",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, key: String| -> rquickjs::Result<Value<'js>> {
                let core = get_core.upgrade().ok_or(rquickjs::Error::Unknown)?;
                match get_host.get(&key) {
                    Some(value) => host_to_js(&core, &ctx, &value),
                    // Hosts reporting an element count expose it read-only
                    None if key == "length" => match get_host.len() {
                        Some(n) => host_to_js(&core, &ctx, &HostValue::Int(n as i64)),
                        None => Ok(Value::new_undefined(ctx)),
                    },
                    None => Ok(Value::new_undefined(ctx)),
                }
            },
        )?,
    )?;

    let set_host = host.clone();
    let set_core = weak_core.clone();
    hooks.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, key: String, value: Value<'js>| -> rquickjs::Result<()> {
                let core = set_core.upgrade().ok_or(rquickjs::Error::Unknown)?;
                let value = js_to_host(&core, &ctx, value, None)?;
                set_host.set(&key, value);
                Ok(())
            },
        )?,
    )?;

    let has_host = host.clone();
    hooks.set(
        "has",
        Function::new(ctx.clone(), move |key: String| -> rquickjs::Result<bool> {
            Ok(has_host.has(&key))
        })?,
    )?;

    let remove_host = host.clone();
    hooks.set(
        "remove",
        Function::new(ctx.clone(), move |key: String| -> rquickjs::Result<bool> {
            Ok(remove_host.remove(&key))
        })?,
    )?;

    let keys_host = host.clone();
    let guard = FinalizeGuard::new(slot, key, &core.caches);
    hooks.set(
        "keys",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>| -> rquickjs::Result<Array<'js>> {
                let _ = &guard;
                let keys = Array::new(ctx)?;
                for (i, key) in keys_host.keys().into_iter().enumerate() {
                    keys.set(i, key)?;
                }
                Ok(keys)
            },
        )?,
    )?;

    let target: Value<'js> = if host.is_callable() {
        let call_host = host.clone();
        let call_core = weak_core.clone();
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                let core = call_core.upgrade().ok_or(rquickjs::Error::Unknown)?;
                let mut host_args = Vec::with_capacity(args.0.len());
                for arg in args.0 {
                    host_args.push(js_to_host(&core, &ctx, arg, None)?);
                }
                match call_host.call(&host_args) {
                    Ok(result) => host_to_js(&core, &ctx, &result),
                    Err(err) => {
                        let thrown: Value =
                            helper_call(&core.helpers.mk_err, &ctx, (err.message(),))?;
                        Err(ctx.throw(thrown))
                    }
                }
            },
        )?
        .into_value()
    } else {
        Object::new(ctx.clone())?.into_value()
    };

    let make_proxy = core.helpers.make_proxy.clone().restore(ctx)?;
    let proxy: Value = make_proxy.call((target, hooks, slot as i32))?;
    let weak_ref: Value = helper_call(&core.helpers.mk_weak, ctx, (proxy.clone(),))?;
    {
        let mut caches = core.caches.borrow_mut();
        caches.host_wrappers.insert(key, slot);
        caches.host_slots.insert(
            slot,
            HostSlotEntry {
                host: host.clone(),
                key,
                proxy_ref: Persistent::save(ctx, weak_ref),
            },
        );
    }
    tracing::trace!(slot, "host object proxied into script");
    Ok(proxy)
}
