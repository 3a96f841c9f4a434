//! Sequence view over array-like script objects.
//!
//! `as_seq` adapts a wrapped script object to list semantics: negative
//! indices, range-checked access, slices with clamping, in-place splice
//! for simple-slice assignment and exact-length element-wise assignment
//! for extended slices. The adapter is cached on the wrapper, so adapting
//! the same object twice yields the same adapter.

use std::rc::Rc;

use rquickjs::{Ctx, Object, Value};

use crate::context::ContextCore;
use crate::error::{BridgeError, BridgeResult};
use crate::marshal::{host_to_js, js_to_host, lift};
use crate::object::ScriptObject;
use crate::value::HostValue;

/// A slice selection; `None` fields take their defaults (`0`, `len`, `1`).
///
/// Only positive steps are supported; zero or negative steps are a
/// `TypeMismatch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// `start..stop` with step 1
    pub fn range(start: i64, stop: i64) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// The whole sequence
    pub fn full() -> Self {
        Self::default()
    }

    fn resolve(&self, len: usize) -> BridgeResult<ResolvedSlice> {
        let step = self.step.unwrap_or(1);
        if step <= 0 {
            return Err(BridgeError::type_mismatch(
                "slice step must be a positive integer",
            ));
        }
        let len = len as i64;
        let norm = |v: i64| -> i64 {
            let v = if v < 0 { v + len } else { v };
            v.clamp(0, len)
        };
        let start = norm(self.start.unwrap_or(0));
        let stop = norm(self.stop.unwrap_or(len));
        let count = if stop > start {
            ((stop - start + step - 1) / step) as usize
        } else {
            0
        };
        Ok(ResolvedSlice {
            start: start as usize,
            stop: stop.max(start) as usize,
            step: step as usize,
            count,
        })
    }
}

struct ResolvedSlice {
    start: usize,
    stop: usize,
    step: usize,
    count: usize,
}

impl ResolvedSlice {
    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).map(move |k| self.start + k * self.step)
    }
}

pub(crate) struct ArrayCore {
    obj: ScriptObject,
}

/// Adapt an array-like script object to sequence semantics.
pub fn as_seq(obj: &ScriptObject) -> ScriptArray {
    obj.as_seq()
}

impl ScriptObject {
    /// Sequence view of this object. Identity-preserving: repeated calls
    /// on the same object return the same adapter.
    pub fn as_seq(&self) -> ScriptArray {
        let existing = self.core().seq.borrow().upgrade();
        if let Some(core) = existing {
            return ScriptArray { core };
        }
        let core = Rc::new(ArrayCore { obj: self.clone() });
        *self.core().seq.borrow_mut() = Rc::downgrade(&core);
        ScriptArray { core }
    }
}

fn length<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
) -> BridgeResult<usize> {
    let value: Value = lift(core, ctx, obj.get("length"))?;
    if let Some(i) = value.as_int() {
        if i >= 0 {
            return Ok(i as usize);
        }
    }
    if let Some(f) = value.as_float() {
        if f >= 0.0 && f.fract() == 0.0 {
            return Ok(f as usize);
        }
    }
    Err(BridgeError::type_mismatch("object has no array length"))
}

fn read_at<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
    index: usize,
) -> BridgeResult<HostValue> {
    let value: Value = lift(core, ctx, obj.get(index.to_string().as_str()))?;
    lift(core, ctx, js_to_host(core, ctx, value, None))
}

fn write_at<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
    index: usize,
    value: &HostValue,
) -> BridgeResult<()> {
    let js = lift(core, ctx, host_to_js(core, ctx, value))?;
    lift(core, ctx, obj.set(index.to_string().as_str(), js))
}

fn write_len<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
    len: usize,
) -> BridgeResult<()> {
    let js = lift(core, ctx, host_to_js(core, ctx, &HostValue::Int(len as i64)))?;
    lift(core, ctx, obj.set("length", js))
}

fn read_all<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
) -> BridgeResult<Vec<HostValue>> {
    let len = length(core, ctx, obj)?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(read_at(core, ctx, obj, i)?);
    }
    Ok(out)
}

fn write_all<'js>(
    core: &Rc<ContextCore>,
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
    items: &[HostValue],
) -> BridgeResult<()> {
    for (i, value) in items.iter().enumerate() {
        write_at(core, ctx, obj, i, value)?;
    }
    write_len(core, ctx, obj, items.len())
}

fn resolve_index(index: i64, len: usize) -> BridgeResult<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        return Err(BridgeError::IndexOutOfRange(index));
    }
    Ok(resolved as usize)
}

/// Sequence view over an array-like script object.
#[derive(Clone)]
pub struct ScriptArray {
    core: Rc<ArrayCore>,
}

impl ScriptArray {
    fn obj(&self) -> &ScriptObject {
        &self.core.obj
    }

    /// True when both adapters view the same script object.
    pub fn ptr_eq(&self, other: &ScriptArray) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// The object this adapter views.
    pub fn object(&self) -> &ScriptObject {
        self.obj()
    }

    pub fn len(&self) -> BridgeResult<usize> {
        self.obj().enter(|core, ctx, obj| length(core, ctx, obj))
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Element read; negative indices count from the end.
    pub fn get(&self, index: i64) -> BridgeResult<HostValue> {
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            let i = resolve_index(index, len)?;
            read_at(core, ctx, obj, i)
        })
    }

    pub fn set(&self, index: i64, value: impl Into<HostValue>) -> BridgeResult<()> {
        let value = value.into();
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            let i = resolve_index(index, len)?;
            write_at(core, ctx, obj, i, &value)
        })
    }

    /// Remove and return the element at `index`, shifting the tail down.
    pub fn remove(&self, index: i64) -> BridgeResult<HostValue> {
        self.obj().enter(|core, ctx, obj| {
            let mut items = read_all(core, ctx, obj)?;
            let i = resolve_index(index, items.len())?;
            let removed = items.remove(i);
            write_all(core, ctx, obj, &items)?;
            Ok(removed)
        })
    }

    /// Typed subscript: only integral indices are valid.
    pub fn item(&self, index: &HostValue) -> BridgeResult<HostValue> {
        match index {
            HostValue::Int(i) => self.get(*i),
            HostValue::Float(_) => Err(BridgeError::type_mismatch(
                "sequence indices must be integers, not float",
            )),
            HostValue::Str(_) => Err(BridgeError::type_mismatch(
                "sequence indices must be integers, not str",
            )),
            _ => Err(BridgeError::type_mismatch(
                "sequence indices must be integers",
            )),
        }
    }

    pub fn get_slice(&self, slice: &Slice) -> BridgeResult<Vec<HostValue>> {
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            let resolved = slice.resolve(len)?;
            let mut out = Vec::with_capacity(resolved.count);
            for i in resolved.indices() {
                out.push(read_at(core, ctx, obj, i)?);
            }
            Ok(out)
        })
    }

    /// Slice assignment.
    ///
    /// A simple slice (step 1) splices: the selected range is replaced by
    /// `values` and the sequence resizes. An extended slice requires
    /// `values` to match the selection count exactly.
    pub fn set_slice(&self, slice: &Slice, values: &[HostValue]) -> BridgeResult<()> {
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            let resolved = slice.resolve(len)?;
            if resolved.step == 1 {
                let mut items = read_all(core, ctx, obj)?;
                items.splice(resolved.start..resolved.stop, values.iter().cloned());
                return write_all(core, ctx, obj, &items);
            }
            if values.len() != resolved.count {
                return Err(BridgeError::length_mismatch(format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    values.len(),
                    resolved.count
                )));
            }
            for (value, i) in values.iter().zip(resolved.indices()) {
                write_at(core, ctx, obj, i, value)?;
            }
            Ok(())
        })
    }

    /// Slice deletion; extended slices remove the selected indices.
    pub fn del_slice(&self, slice: &Slice) -> BridgeResult<()> {
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            let resolved = slice.resolve(len)?;
            let mut items = read_all(core, ctx, obj)?;
            if resolved.step == 1 {
                items.splice(resolved.start..resolved.stop, std::iter::empty());
            } else {
                let selected: Vec<usize> = resolved.indices().collect();
                for &i in selected.iter().rev() {
                    items.remove(i);
                }
            }
            write_all(core, ctx, obj, &items)
        })
    }

    /// Insert before `index`, clamping the position into `[0, len]`.
    pub fn insert(&self, index: i64, value: impl Into<HostValue>) -> BridgeResult<()> {
        let value = value.into();
        self.obj().enter(|core, ctx, obj| {
            let mut items = read_all(core, ctx, obj)?;
            let len = items.len() as i64;
            let pos = if index < 0 { index + len } else { index }.clamp(0, len) as usize;
            items.insert(pos, value);
            write_all(core, ctx, obj, &items)
        })
    }

    pub fn append(&self, value: impl Into<HostValue>) -> BridgeResult<()> {
        let value = value.into();
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            write_at(core, ctx, obj, len, &value)?;
            write_len(core, ctx, obj, len + 1)
        })
    }

    pub fn extend(&self, values: &[HostValue]) -> BridgeResult<()> {
        self.obj().enter(|core, ctx, obj| {
            let len = length(core, ctx, obj)?;
            for (i, value) in values.iter().enumerate() {
                write_at(core, ctx, obj, len + i, value)?;
            }
            write_len(core, ctx, obj, len + values.len())
        })
    }

    pub fn reverse(&self) -> BridgeResult<()> {
        self.obj().enter(|core, ctx, obj| {
            let mut items = read_all(core, ctx, obj)?;
            items.reverse();
            write_all(core, ctx, obj, &items)
        })
    }

    /// Occurrences equal to `value` (identity-aware for objects).
    pub fn count(&self, value: &HostValue) -> BridgeResult<usize> {
        Ok(self.to_vec()?.iter().filter(|v| *v == value).count())
    }

    pub fn contains(&self, value: &HostValue) -> BridgeResult<bool> {
        Ok(self.to_vec()?.iter().any(|v| v == value))
    }

    pub fn to_vec(&self) -> BridgeResult<Vec<HostValue>> {
        self.obj().enter(|core, ctx, obj| read_all(core, ctx, obj))
    }

    /// Independent iterator; interleaved iterators do not disturb each
    /// other. Reads are live, so mutation during iteration is visible.
    pub fn iter(&self) -> ScriptArrayIter {
        ScriptArrayIter {
            array: self.clone(),
            pos: 0,
        }
    }
}

impl PartialEq for ScriptArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for ScriptArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScriptArray({:?})", self.core.obj)
    }
}

pub struct ScriptArrayIter {
    array: ScriptArray,
    pos: usize,
}

impl Iterator for ScriptArrayIter {
    type Item = BridgeResult<HostValue>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.array.len() {
            Err(err) => {
                self.pos = usize::MAX;
                Some(Err(err))
            }
            Ok(len) if self.pos >= len => None,
            Ok(_) => {
                let item = self.array.get(self.pos as i64);
                self.pos += 1;
                Some(item)
            }
        }
    }
}

impl IntoIterator for &ScriptArray {
    type Item = BridgeResult<HostValue>;
    type IntoIter = ScriptArrayIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
