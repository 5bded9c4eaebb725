//! Extensions: policy objects that wrap a value's serialization.
//!
//! An extension owns the wire shape around a value (a presence flag, a
//! quantized range, a pointer id) and delegates the value itself back to
//! the engine through the closure it is handed. The engine's `ext`,
//! `ext_value`, and `ext_with` operations choose what that closure does;
//! extensions that never invoke it use `()` as their inner type.

use crate::de::Deserializer;
use crate::ser::Serializer;

pub mod compact;
pub mod entropy;
pub mod growable;
pub mod inherit;
pub mod optional;
pub mod std_containers;
pub mod value_range;

pub use compact::CompactValue;
pub use entropy::{Entropy, Substitution};
pub use growable::Growable;
pub use inherit::{BaseClass, DerivesFrom, InheritanceContext, VirtualBaseClass};
pub use optional::Optional;
pub use std_containers::{StdMap, StdSet};
pub use value_range::ValueRange;

/// A stateless serialization policy for values of type `T`.
///
/// The two methods are the two directions of one wire shape; `f` drives the
/// inner value (`Inner`) when the extension decides it belongs on the wire.
pub trait Ext<T> {
    type Inner;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut Self::Inner);

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut Self::Inner);
}
