//! Base-part serialization for composed ("inherited") types.
//!
//! Rust models inheritance as composition: a derived type embeds its base
//! and exposes it through `DerivesFrom`. `BaseClass` recurses into the base
//! part unconditionally; `VirtualBaseClass` serializes a given base value
//! at most once per most-derived object, which is the semantics of a
//! virtually inherited base.
//!
//! Identity is by address: "the same base subobject" means "the same base
//! value in memory". The `InheritanceContext` keeps the visited set and
//! clears it whenever the parent object changes, so two siblings each get
//! their bases serialized afresh.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::ser::Serializer;

/// Access to the embedded base part of a composed type.
pub trait DerivesFrom<Base> {
    fn base(&self) -> &Base;
    fn base_mut(&mut self) -> &mut Base;
}

/// Tracks which virtual bases of the current parent object have already
/// been serialized. Required for `VirtualBaseClass`, optional for
/// `BaseClass`.
#[derive(Default)]
pub struct InheritanceContext {
    state: RefCell<State>,
}

#[derive(Default)]
struct State {
    depth: usize,
    parent: usize,
    visited: HashSet<usize>,
}

impl InheritanceContext {
    pub fn new() -> Self {
        InheritanceContext::default()
    }

    fn begin_base(&self, parent: usize) {
        let mut state = self.state.borrow_mut();
        if state.depth == 0 {
            if state.parent != parent {
                state.visited.clear();
            }
            state.parent = parent;
        }
        state.depth += 1;
    }

    fn begin_virtual_base(&self, parent: usize, base: usize) -> bool {
        self.begin_base(parent);
        self.state.borrow_mut().visited.insert(base)
    }

    fn end(&self) {
        self.state.borrow_mut().depth -= 1;
    }
}

/// Serialize the base part of a derived value.
pub struct BaseClass<Base> {
    _base: std::marker::PhantomData<fn(Base)>,
}

impl<Base> BaseClass<Base> {
    pub fn new() -> Self {
        BaseClass {
            _base: std::marker::PhantomData,
        }
    }
}

impl<Base> Default for BaseClass<Base> {
    fn default() -> Self {
        BaseClass::new()
    }
}

impl<T, Base> Ext<T> for BaseClass<Base>
where
    T: DerivesFrom<Base>,
{
    type Inner = Base;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut Base),
    {
        let parent = v as *const T as usize;
        if let Some(ctx) = ser.try_context_ref::<InheritanceContext>() {
            ctx.begin_base(parent);
            f(ser, v.base_mut());
            ctx.end();
        } else {
            f(ser, v.base_mut());
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut Base),
    {
        let parent = v as *const T as usize;
        if let Some(ctx) = de.try_context_ref::<InheritanceContext>() {
            ctx.begin_base(parent);
            f(de, v.base_mut());
            ctx.end();
        } else {
            f(de, v.base_mut());
        }
    }
}

/// Serialize a virtually inherited base part: once per most-derived object.
pub struct VirtualBaseClass<Base> {
    _base: std::marker::PhantomData<fn(Base)>,
}

impl<Base> VirtualBaseClass<Base> {
    pub fn new() -> Self {
        VirtualBaseClass {
            _base: std::marker::PhantomData,
        }
    }
}

impl<Base> Default for VirtualBaseClass<Base> {
    fn default() -> Self {
        VirtualBaseClass::new()
    }
}

impl<T, Base> Ext<T> for VirtualBaseClass<Base>
where
    T: DerivesFrom<Base>,
{
    type Inner = Base;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut Base),
    {
        let ctx = ser.context_ref::<InheritanceContext>();
        let parent = v as *const T as usize;
        let base = v.base() as *const Base as usize;
        if ctx.begin_virtual_base(parent, base) {
            f(ser, v.base_mut());
        }
        ctx.end();
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut Base),
    {
        let ctx = de.context_ref::<InheritanceContext>();
        let parent = v as *const T as usize;
        let base = v.base() as *const Base as usize;
        if ctx.begin_virtual_base(parent, base) {
            f(de, v.base_mut());
        }
        ctx.end();
    }
}
