//! Per-context wrapper caches and process-wide wrapper counters.
//!
//! Both directions of the bridge cache wrappers so identity survives
//! repeated crossings: wrapping the same script object twice yields the
//! same handle, and the same host object always surfaces as the same
//! proxy in script.

use std::collections::HashMap;
use std::rc::Weak;
use std::sync::atomic::{AtomicUsize, Ordering};

use rquickjs::{Persistent, Value};

use crate::host::HostRef;
use crate::object::ScriptObjectCore;

static WRAPPED_SCRIPT_OBJS: AtomicUsize = AtomicUsize::new(0);
static WRAPPED_HOST_OBJS: AtomicUsize = AtomicUsize::new(0);

/// Live wrapper counts across all contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Script objects currently wrapped for the host
    pub wrapped_script_objs: usize,
    /// Host objects currently proxied into script
    pub wrapped_host_objs: usize,
}

/// Snapshot of the process-wide wrapper counters.
///
/// Both counts return to their baseline once all wrappers are dropped and
/// their contexts torn down; useful for leak checks.
pub fn cached_stats() -> CacheStats {
    CacheStats {
        wrapped_script_objs: WRAPPED_SCRIPT_OBJS.load(Ordering::Relaxed),
        wrapped_host_objs: WRAPPED_HOST_OBJS.load(Ordering::Relaxed),
    }
}

pub(crate) fn note_script_wrapper_created() {
    WRAPPED_SCRIPT_OBJS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn note_script_wrapper_dropped() {
    WRAPPED_SCRIPT_OBJS.fetch_sub(1, Ordering::Relaxed);
}

pub(crate) fn note_host_wrapper_created() {
    WRAPPED_HOST_OBJS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn note_host_wrapper_dropped() {
    WRAPPED_HOST_OBJS.fetch_sub(1, Ordering::Relaxed);
}

/// Cache entry for a host object proxied into script.
pub(crate) struct HostSlotEntry {
    /// The host object the proxy forwards to
    pub(crate) host: HostRef,
    /// Host identity key, for reverse-map cleanup
    pub(crate) key: usize,
    /// WeakRef to the proxy; lets cache hits return the identical proxy
    /// without keeping it alive
    pub(crate) proxy_ref: Persistent<Value<'static>>,
}

/// Both wrapper caches of one context.
#[derive(Default)]
pub(crate) struct Caches {
    /// Engine object pointer -> host-side wrapper core
    pub(crate) script_wrappers: HashMap<usize, Weak<ScriptObjectCore>>,
    /// Host object identity -> proxy slot
    pub(crate) host_wrappers: HashMap<usize, u32>,
    /// Proxy slot -> entry
    pub(crate) host_slots: HashMap<u32, HostSlotEntry>,
    next_slot: u32,
}

impl Caches {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc_slot(&mut self) -> u32 {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Drop the entries for a proxy slot. Called from finalize guards and
    /// from stale-entry cleanup; tolerant of entries already gone, and the
    /// reverse map is only touched if it still points at this slot.
    pub(crate) fn evict_host_slot(&mut self, slot: u32, key: usize) {
        self.host_slots.remove(&slot);
        if self.host_wrappers.get(&key) == Some(&slot) {
            self.host_wrappers.remove(&key);
        }
    }
}
