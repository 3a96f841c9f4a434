//! Context ownership and engine entry.
//!
//! `BridgeContext` is a cloneable handle over `ContextCore`, which owns the
//! QuickJS runtime, the wrapper caches and the persistent helper functions
//! installed by the bootstrap script. Every script-object wrapper holds a
//! strong `Rc<ContextCore>`, so the engine outlives all wrappers no matter
//! what order handles are dropped in.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rquickjs::context::EvalOptions;
use rquickjs::{Context, Ctx, Function, Object, Persistent, Runtime, Value};

use crate::cache::Caches;
use crate::error::{BridgeError, BridgeResult};
use crate::marshal::{js_to_host, lift, wrap_script_object};
use crate::object::ScriptObject;
use crate::value::HostValue;

/// Helper functions installed once per context.
///
/// Everything the bridge needs from the script side that has no direct
/// engine API goes through these: property probes, `delete`, `apply` with
/// an explicit receiver, error construction, `WeakRef` handling and the
/// proxy factory for host objects.
const BOOTSTRAP: &str = r#"
(function () {
    var SLOT = Symbol('lutraSlot');
    return {
        hasOwn: function (o, k) { return Object.prototype.hasOwnProperty.call(o, k); },
        hasProp: function (o, k) { return k in o; },
        del: function (o, k) { delete o[k]; },
        apply: function (f, t, a) { return f.apply(t, a); },
        mkErr: function (m) { return new Error(m); },
        mkTypeErr: function (m) { return new TypeError(m); },
        mkWeak: function (o) { return new WeakRef(o); },
        derefWeak: function (w) { return w.deref(); },
        slotOf: function (o) {
            if (o !== null && (typeof o === 'object' || typeof o === 'function')) {
                var s = o[SLOT];
                if (typeof s === 'number') { return s; }
            }
            return -1;
        },
        makeProxy: function (target, hooks, slot) {
            target[SLOT] = slot;
            return new Proxy(target, {
                get: function (t, key) {
                    if (typeof key === 'symbol') { return Reflect.get(t, key); }
                    var v = hooks.get(key);
                    if (v !== undefined || hooks.has(key)) { return v; }
                    return Reflect.get(t, key);
                },
                set: function (t, key, value) {
                    if (typeof key === 'symbol') { return Reflect.set(t, key, value); }
                    hooks.set(key, value);
                    return true;
                },
                has: function (t, key) {
                    if (typeof key === 'symbol') { return Reflect.has(t, key); }
                    return hooks.has(key) || Reflect.has(t, key);
                },
                deleteProperty: function (t, key) {
                    if (typeof key === 'symbol') { return Reflect.deleteProperty(t, key); }
                    return hooks.remove(key);
                },
                ownKeys: function (t) { return hooks.keys(); },
                getOwnPropertyDescriptor: function (t, key) {
                    if (typeof key === 'symbol') { return Reflect.getOwnPropertyDescriptor(t, key); }
                    if (hooks.has(key)) {
                        return {
                            value: hooks.get(key),
                            writable: true,
                            enumerable: true,
                            configurable: true
                        };
                    }
                    return Reflect.getOwnPropertyDescriptor(t, key);
                }
            });
        }
    };
})()
"#;

/// Persistent handles to the bootstrap helpers.
pub(crate) struct Helpers {
    pub(crate) has_own: Persistent<Function<'static>>,
    pub(crate) has_prop: Persistent<Function<'static>>,
    pub(crate) del: Persistent<Function<'static>>,
    pub(crate) apply: Persistent<Function<'static>>,
    pub(crate) mk_err: Persistent<Function<'static>>,
    pub(crate) mk_type_err: Persistent<Function<'static>>,
    pub(crate) mk_weak: Persistent<Function<'static>>,
    pub(crate) deref_weak: Persistent<Function<'static>>,
    pub(crate) slot_of: Persistent<Function<'static>>,
    pub(crate) make_proxy: Persistent<Function<'static>>,
}

impl Helpers {
    fn install(ctx: &Ctx<'_>) -> rquickjs::Result<Self> {
        let table: Object = ctx.eval(BOOTSTRAP)?;
        let save = |name: &str| -> rquickjs::Result<Persistent<Function<'static>>> {
            let f: Function = table.get(name)?;
            Ok(Persistent::save(ctx, f))
        };
        Ok(Self {
            has_own: save("hasOwn")?,
            has_prop: save("hasProp")?,
            del: save("del")?,
            apply: save("apply")?,
            mk_err: save("mkErr")?,
            mk_type_err: save("mkTypeErr")?,
            mk_weak: save("mkWeak")?,
            deref_weak: save("derefWeak")?,
            slot_of: save("slotOf")?,
            make_proxy: save("makeProxy")?,
        })
    }
}

/// Non-strict evaluation, so top-level assignment to an undeclared name
/// creates a global.
fn eval_options() -> EvalOptions {
    let mut options = EvalOptions::default();
    options.strict = false;
    options
}

/// Restore a persistent helper and call it.
pub(crate) fn helper_call<'js, A, R>(
    helper: &Persistent<Function<'static>>,
    ctx: &Ctx<'js>,
    args: A,
) -> rquickjs::Result<R>
where
    A: rquickjs::function::IntoArgs<'js>,
    R: rquickjs::FromJs<'js>,
{
    let f = helper.clone().restore(ctx)?;
    f.call(args)
}

/// Owner of one engine instance and its bridge state.
///
/// Field order matters: caches (holding persistents) and helpers must drop
/// before the context and runtime.
pub(crate) struct ContextCore {
    pub(crate) caches: Rc<RefCell<Caches>>,
    pub(crate) helpers: Helpers,
    /// Pointer to the `Ctx` of the innermost active `with`, if any
    active: Cell<Option<*const ()>>,
    context: Context,
    _runtime: Runtime,
}

impl ContextCore {
    /// Enter the engine.
    ///
    /// Nested entry (a host callable invoked from script turning around and
    /// driving the bridge again) reuses the already-active `Ctx` instead of
    /// locking the context a second time.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&Ctx<'_>) -> R) -> R {
        if let Some(ptr) = self.active.get() {
            // Invariant: the pointer is only set while the Ctx it points at
            // is alive on this stack, and the bridge is single threaded.
            let ctx = unsafe { &*(ptr as *const Ctx<'_>) };
            return f(ctx);
        }
        self.context.with(|ctx| {
            self.active
                .set(Some(std::ptr::addr_of!(ctx) as *const ()));
            let out = f(&ctx);
            self.active.set(None);
            out
        })
    }
}

/// Limits applied to a context's runtime at creation.
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    /// Engine heap limit in bytes. Default: unlimited.
    pub memory_limit: Option<usize>,

    /// Engine stack limit in bytes. Default: the engine's own default.
    pub max_stack_size: Option<usize>,
}

/// A scripting context.
///
/// Cloning is cheap and yields a handle to the same context. Dropping the
/// last handle while wrappers obtained from it are still alive is fine;
/// the wrappers keep the engine alive and stay functional.
#[derive(Clone)]
pub struct BridgeContext {
    core: Rc<ContextCore>,
}

impl BridgeContext {
    /// Create a context with default limits.
    pub fn new() -> BridgeResult<Self> {
        Self::with_config(&ContextConfig::default())
    }

    /// Create a context with explicit limits.
    pub fn with_config(config: &ContextConfig) -> BridgeResult<Self> {
        let runtime = Runtime::new()
            .map_err(|e| BridgeError::engine(format!("runtime creation failed: {e}")))?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        let context = Context::full(&runtime)
            .map_err(|e| BridgeError::engine(format!("context creation failed: {e}")))?;
        let helpers = context
            .with(|ctx| Helpers::install(&ctx))
            .map_err(|e| BridgeError::engine(format!("bootstrap installation failed: {e}")))?;
        tracing::debug!("bridge context created");
        Ok(Self {
            core: Rc::new(ContextCore {
                caches: Rc::new(RefCell::new(Caches::new())),
                helpers,
                active: Cell::new(None),
                context,
                _runtime: runtime,
            }),
        })
    }

    /// Evaluate script source and marshal the completion value.
    pub fn eval(&self, source: &str) -> BridgeResult<HostValue> {
        let core = &self.core;
        core.with(|ctx| {
            tracing::trace!(len = source.len(), "eval");
            let value: Value = lift(core, ctx, ctx.eval_with_options(source, eval_options()))?;
            lift(core, ctx, js_to_host(core, ctx, value, None))
        })
    }

    /// The global object, wrapped like any other script object.
    pub fn global(&self) -> BridgeResult<ScriptObject> {
        let core = &self.core;
        core.with(|ctx| {
            let globals = ctx.globals();
            lift(core, ctx, wrap_script_object(core, ctx, globals, None))
        })
    }

}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BridgeContext({:p})", Rc::as_ptr(&self.core))
    }
}
