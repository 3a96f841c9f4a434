//! Leak checks over the process-wide wrapper counters. These live in their
//! own binary so no concurrently running test shifts the counts.

use std::rc::Rc;

use lutra_bridge::{BridgeContext, HostDict, HostValue, cached_stats};
use serial_test::serial;

#[test]
#[serial]
fn script_wrapper_count_returns_to_baseline() {
    let ctx = BridgeContext::new().unwrap();
    let base = cached_stats().wrapped_script_objs;

    let o1 = match ctx.eval("o = {}; o").unwrap() {
        HostValue::Script(obj) => obj,
        other => panic!("expected script object, got {other:?}"),
    };
    assert_eq!(cached_stats().wrapped_script_objs, base + 1);

    // A cache hit reuses the wrapper instead of counting a second one
    let o2 = match ctx.eval("o").unwrap() {
        HostValue::Script(obj) => obj,
        other => panic!("expected script object, got {other:?}"),
    };
    assert!(o1.ptr_eq(&o2));
    assert_eq!(cached_stats().wrapped_script_objs, base + 1);

    drop(o2);
    assert_eq!(cached_stats().wrapped_script_objs, base + 1);
    drop(o1);
    assert_eq!(cached_stats().wrapped_script_objs, base);
}

#[test]
#[serial]
fn host_wrapper_count_returns_to_baseline() {
    let base = cached_stats().wrapped_host_objs;
    let ctx = BridgeContext::new().unwrap();
    let dict = Rc::new(HostDict::new());
    dict.insert("a", HostValue::Int(1));

    let global = ctx.global().unwrap();
    global.set_attr("h", HostValue::object(dict.clone())).unwrap();
    assert_eq!(cached_stats().wrapped_host_objs, base + 1);

    // The same host object surfaces as the same proxy, not a second one
    global.set_attr("h2", HostValue::object(dict)).unwrap();
    assert_eq!(cached_stats().wrapped_host_objs, base + 1);
    assert_eq!(ctx.eval("h === h2").unwrap(), HostValue::Bool(true));

    drop(global);
    drop(ctx);
    // Context teardown finalizes the proxy and runs the cache eviction
    assert_eq!(cached_stats().wrapped_host_objs, base);
}

#[test]
#[serial]
fn wrapper_outliving_context_still_counts_until_dropped() {
    let ctx = BridgeContext::new().unwrap();
    let base = cached_stats().wrapped_script_objs;
    let obj = match ctx.eval("({a: 1})").unwrap() {
        HostValue::Script(obj) => obj,
        other => panic!("expected script object, got {other:?}"),
    };
    drop(ctx);
    assert_eq!(cached_stats().wrapped_script_objs, base + 1);
    assert_eq!(obj.attr("a").unwrap(), HostValue::Int(1));
    drop(obj);
    assert_eq!(cached_stats().wrapped_script_objs, base);
}
