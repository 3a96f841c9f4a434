//! Bidirectional object bridge between QuickJS and Rust.
//!
//! Script objects cross into Rust as [`ScriptObject`] wrappers with
//! attribute, mapping and call protocols; Rust objects implementing
//! [`HostObject`] cross into script as proxies that behave like ordinary
//! objects there. Both directions preserve identity through per-context
//! wrapper caches, and values round-trip through the [`HostValue`] enum.
//!
//! # Example
//!
//! ```
//! use lutra_bridge::{BridgeContext, HostValue};
//!
//! let ctx = BridgeContext::new().unwrap();
//! assert_eq!(ctx.eval("3 + 2").unwrap(), HostValue::Int(5));
//!
//! let obj = ctx.eval("({ greet: function (n) { return 'hi ' + n; } })").unwrap();
//! let obj = obj.as_script().unwrap();
//! let greet = obj.attr("greet").unwrap();
//! let result = greet.as_script().unwrap().call(&["otter".into()]).unwrap();
//! assert_eq!(result, HostValue::Str("hi otter".into()));
//! ```
//!
//! # Thread safety
//!
//! Contexts and wrappers are `!Send` and `!Sync`; a context and everything
//! obtained from it stay on the thread that created them.

mod array;
mod cache;
mod context;
mod error;
mod host;
mod marshal;
mod object;
mod proxy;
mod value;

pub use array::{ScriptArray, ScriptArrayIter, Slice, as_seq};
pub use cache::{CacheStats, cached_stats};
pub use context::{BridgeContext, ContextConfig};
pub use error::{BridgeError, BridgeResult, HostError};
pub use host::{HostDict, HostFn, HostList, HostObject, HostRef};
pub use object::ScriptObject;
pub use value::{HostValue, Null};
