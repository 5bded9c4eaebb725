//! Polymorphic pointee serialization.
//!
//! A trait-object pointee cannot rely on the program to know its type; the
//! wire carries a derived-index instead. The `PolymorphicContext` maps each
//! registered base trait to an ordered list of derived types (the index
//! into that list is the wire tag, so it is platform-independent as long as
//! both peers register in the same order), and keeps, per `(base, derived)`
//! pair, a handler that can construct a boxed derived value and drive its
//! `serialize` program.
//!
//! Runtime type identity goes through the `Rtti` seam, whose default
//! implementation is `std::any`. Base traits opt in by listing it as a
//! supertrait:
//!
//! ```ignore
//! trait Shape: Rtti {}
//!
//! let mut registry = PolymorphicContext::new();
//! registry.register::<dyn Shape, Circle>(|d| d);
//! registry.register::<dyn Shape, RoundedRectangle>(|d| d);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::flow::{Flow, Serialize};
use crate::ptr::{Ownership, PointerLinkingContext};
use crate::read::{Reader, ReaderError};
use crate::ser::Serializer;
use crate::size;

/// Runtime type identity for polymorphic pointees: the four primitives the
/// engine needs from the host's reflection. The blanket impl binds them to
/// `std::any`; a custom table would implement this trait instead.
pub trait Rtti: Any {
    /// The dynamic type of this value (the most-derived type).
    fn type_id_dyn(&self) -> TypeId;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> Rtti for T {
    fn type_id_dyn(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-`(base, derived)` glue: construct, upcast, and drive one derived
/// type through a type-erased engine.
trait PolyHandler {
    /// A fresh default-constructed derived value, upcast and boxed as
    /// `Box<Box<B>>` behind `Any`.
    fn create_boxed(&self) -> Box<dyn Any>;

    /// Serialize the derived body; `obj` is the derived value as `Any`.
    fn serialize_body(&self, ser: &mut Serializer<'_>, obj: &mut dyn Any);

    /// Serialize the derived body from a shared reference, cloning to get
    /// the mutable view the symmetric program needs.
    fn serialize_body_cloned(&self, ser: &mut Serializer<'_>, obj: &dyn Any);

    /// Deserialize into a derived value; `obj` is the derived as `Any`.
    fn deserialize_body(&self, de: &mut Deserializer<'_>, obj: &mut dyn Any);
}

struct Handler<B: ?Sized + 'static, D> {
    upcast: fn(Box<D>) -> Box<B>,
}

impl<B, D> PolyHandler for Handler<B, D>
where
    B: ?Sized + 'static,
    D: Serialize + Clone + Default + 'static,
{
    fn create_boxed(&self) -> Box<dyn Any> {
        Box::new((self.upcast)(Box::new(D::default())))
    }

    fn serialize_body(&self, ser: &mut Serializer<'_>, obj: &mut dyn Any) {
        let derived = obj
            .downcast_mut::<D>()
            .expect("polymorphic handler fed a foreign type");
        derived.serialize(ser);
    }

    fn serialize_body_cloned(&self, ser: &mut Serializer<'_>, obj: &dyn Any) {
        let derived = obj
            .downcast_ref::<D>()
            .expect("polymorphic handler fed a foreign type");
        let mut copy = derived.clone();
        copy.serialize(ser);
    }

    fn deserialize_body(&self, de: &mut Deserializer<'_>, obj: &mut dyn Any) {
        let derived = obj
            .downcast_mut::<D>()
            .expect("polymorphic handler fed a foreign type");
        derived.serialize(de);
    }
}

/// The base→derived registry. Built explicitly at startup; registration
/// order defines the wire tags.
#[derive(Default)]
pub struct PolymorphicContext {
    handlers: HashMap<(TypeId, TypeId), Box<dyn PolyHandler>>,
    order: HashMap<TypeId, Vec<TypeId>>,
}

impl PolymorphicContext {
    pub fn new() -> Self {
        PolymorphicContext::default()
    }

    /// Register derived type `D` under base trait `B`. The `upcast`
    /// function is the coercion `Box<D> -> Box<B>`, written `|d| d` at a
    /// call site where both types are concrete.
    pub fn register<B, D>(&mut self, upcast: fn(Box<D>) -> Box<B>)
    where
        B: ?Sized + 'static,
        D: Serialize + Clone + Default + 'static,
    {
        let key = (TypeId::of::<B>(), TypeId::of::<D>());
        if self
            .handlers
            .insert(key, Box::new(Handler::<B, D> { upcast }))
            .is_none()
        {
            self.order.entry(key.0).or_default().push(key.1);
        }
    }

    fn tag_of(&self, base: TypeId, derived: TypeId) -> Option<usize> {
        self.order
            .get(&base)?
            .iter()
            .position(|id| *id == derived)
    }

    /// Write the derived tag and body of `obj` through its base trait.
    pub fn serialize_ptr<B>(&self, ser: &mut Serializer<'_>, obj: &mut B)
    where
        B: ?Sized + Rtti,
    {
        let base = TypeId::of::<B>();
        let derived = (&*obj).type_id_dyn();
        let tag = self
            .tag_of(base, derived)
            .expect("derived type not registered under this base");
        size::write_size(ser.writer(), tag);
        self.handlers[&(base, derived)].serialize_body(ser, obj.as_any_mut());
    }

    /// Like `serialize_ptr`, from a shared reference (shared owners).
    pub fn serialize_ptr_shared<B>(&self, ser: &mut Serializer<'_>, obj: &B)
    where
        B: ?Sized + Rtti,
    {
        let base = TypeId::of::<B>();
        let derived = obj.type_id_dyn();
        let tag = self
            .tag_of(base, derived)
            .expect("derived type not registered under this base");
        size::write_size(ser.writer(), tag);
        self.handlers[&(base, derived)].serialize_body_cloned(ser, obj.as_any());
    }

    /// Read the derived tag, construct the matching derived value, and
    /// deserialize its body. `None` means the tag was out of range, with
    /// `InvalidPointer` latched.
    pub fn deserialize_ptr<B>(&self, de: &mut Deserializer<'_>) -> Option<Box<B>>
    where
        B: ?Sized + Rtti,
    {
        let base = TypeId::of::<B>();
        let tag = size::read_size(de.reader(), size::MAX_SIZE);
        let list = self
            .order
            .get(&base)
            .expect("base trait not registered");
        let derived = match list.get(tag) {
            Some(id) => *id,
            None => {
                de.reader().set_error(ReaderError::InvalidPointer);
                return None;
            }
        };
        let handler = &self.handlers[&(base, derived)];
        let mut holder = handler.create_boxed();
        let boxed = holder
            .downcast_mut::<Box<B>>()
            .expect("handler produced a foreign base box");
        handler.deserialize_body(de, (**boxed).as_any_mut());
        eprintln!("DEBUG after deserialize_body: type_id_dyn={:?} as_any type_id={:?}", (&**boxed).type_id_dyn(), (&**boxed).as_any().type_id());
        let result = Some(*holder.downcast::<Box<B>>().expect("checked just above"));
        if let Some(ref b) = result {
            eprintln!("DEBUG result type_id_dyn={:?} as_any type_id={:?}", (&**b).type_id_dyn(), (&**b).as_any().type_id());
        }
        return result;
        Some(*holder.downcast::<Box<B>>().expect("checked just above"))
    }
}

/// Pointer extension for polymorphic pointees behind trait objects.
pub struct DynPtr;

fn thin(addr: *const ()) -> usize {
    addr as usize
}

impl<B: ?Sized + Rtti> Ext<Box<B>> for DynPtr {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Box<B>, _f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        let linking = ser.context_ref::<PointerLinkingContext>();
        let registry = ser.context_ref::<PolymorphicContext>();
        let addr = thin(&**v as *const B as *const ());
        let (id, body) = linking.visit_ptr(addr, Ownership::Owner);
        size::write_size(ser.writer(), id as usize);
        if body {
            registry.serialize_ptr(ser, &mut **v);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Box<B>, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        let linking = de.context_ref::<PointerLinkingContext>();
        let registry = de.context_ref::<PolymorphicContext>();
        let id = size::read_size(de.reader(), size::MAX_SIZE) as u64;
        if id == 0 {
            de.reader().set_error(ReaderError::InvalidPointer);
            return;
        }
        linking.visit_id(id, Ownership::Owner);
        if let Some(boxed) = registry.deserialize_ptr::<B>(de) {
            eprintln!("DEBUG before assign: boxed type_id_dyn={:?}", (&*boxed).type_id_dyn());
            *v = boxed;
            eprintln!("DEBUG after assign: v type_id_dyn={:?}", (&**v).type_id_dyn());
            linking.resolve_owner::<B>(id, &**v);
            eprintln!("DEBUG after resolve_owner: v type_id_dyn={:?}", (&**v).type_id_dyn());
        }
    }
}

impl<B: ?Sized + Rtti> Ext<Option<Box<B>>> for DynPtr {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Option<Box<B>>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        match v {
            Some(boxed) => DynPtr.serialize(ser, boxed, &mut f),
            None => size::write_size(ser.writer(), 0),
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Option<Box<B>>, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        let linking = de.context_ref::<PointerLinkingContext>();
        let registry = de.context_ref::<PolymorphicContext>();
        let id = size::read_size(de.reader(), size::MAX_SIZE) as u64;
        if id == 0 {
            *v = None;
            return;
        }
        linking.visit_id(id, Ownership::Owner);
        if let Some(boxed) = registry.deserialize_ptr::<B>(de) {
            *v = Some(boxed);
            linking.resolve_owner::<B>(id, &**v.as_ref().expect("just stored"));
        }
    }
}

impl<B: ?Sized + Rtti> Ext<Rc<B>> for DynPtr {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Rc<B>, _f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        let linking = ser.context_ref::<PointerLinkingContext>();
        let registry = ser.context_ref::<PolymorphicContext>();
        let addr = thin(Rc::as_ptr(v) as *const ());
        let (id, body) = linking.visit_ptr(addr, Ownership::SharedOwner);
        size::write_size(ser.writer(), id as usize);
        if body {
            registry.serialize_ptr_shared(ser, &**v);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Rc<B>, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        let linking = de.context_ref::<PointerLinkingContext>();
        let registry = de.context_ref::<PolymorphicContext>();
        let id = size::read_size(de.reader(), size::MAX_SIZE) as u64;
        if id == 0 {
            de.reader().set_error(ReaderError::InvalidPointer);
            return;
        }
        let processed = linking.visit_id(id, Ownership::SharedOwner);
        if processed {
            if let Some(shared) = linking.shared_state::<Rc<B>>(id) {
                *v = shared;
            }
        } else if let Some(boxed) = registry.deserialize_ptr::<B>(de) {
            let rc: Rc<B> = Rc::from(boxed);
            linking.set_shared_state(id, rc.clone());
            *v = rc;
        } else {
            return;
        }
        linking.resolve_owner::<B>(id, Rc::as_ptr(v));
    }
}

/// Observer of a polymorphic pointee: carries the id, resolved against the
/// owning `Box<B>`/`Rc<B>` by fat-pointer back-patching. The field type is
/// `Option<NonNull<B>>` because an unsized pointee has no null raw-pointer
/// constant; `None` is the null form.
impl<B: ?Sized + Rtti> Ext<Option<NonNull<B>>> for DynPtr {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Option<NonNull<B>>, _f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        match v {
            Some(target) => {
                let linking = ser.context_ref::<PointerLinkingContext>();
                let (id, _) =
                    linking.visit_ptr(thin(target.as_ptr() as *const ()), Ownership::Observer);
                size::write_size(ser.writer(), id as usize);
            }
            None => size::write_size(ser.writer(), 0),
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Option<NonNull<B>>, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        let linking = de.context_ref::<PointerLinkingContext>();
        let id = size::read_size(de.reader(), size::MAX_SIZE) as u64;
        if id == 0 {
            *v = None;
            return;
        }
        linking.visit_id(id, Ownership::Observer);
        // Safe: the observer field outlives the traversal per the linking
        // module's contract.
        unsafe { linking.observe_nonnull::<B>(id, v) };
    }
}
