//! Pointer extensions for owned, shared, and observing pointers.
//!
//! The nullable/non-null distinction of the wire (id 0 = null) maps onto
//! the types themselves: `Option<Box<T>>` and `Option<Rc<T>>` are nullable,
//! bare `Box<T>`/`Rc<T>` are not and latch `InvalidPointer` when the stream
//! says null. Raw pointers are nullable by nature.
//!
//! * `SmartPtr`: `Box<T>` (owner), `Rc<T>` (shared owner), `rc::Weak<T>`
//!   (shared observer), plus the `Option` forms of the owners.
//! * `PointerOwner`: `*mut T` owner; the pointee is allocated through the
//!   linking context's memory resource and released by the caller with
//!   `PointerLinkingContext::destroy_raw`.
//! * `PointerObserver`: `*const T` observer, resolved against whatever
//!   owner carries the same id.
//! * `ReferencedByPointer`: a by-value field that observers elsewhere may
//!   alias; it serializes in place and registers its address as an owner.
//!
//! Serializing through an `Rc` clones the pointee to get a `&mut` for the
//! shared `serialize` program; shared pointees therefore need `Clone`. The
//! alternative would be handing out aliasing mutable references, which this
//! crate does not do.

use std::alloc::Layout;
use std::any::TypeId;
use std::rc::{Rc, Weak};

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::ptr::{Ownership, PointerLinkingContext};
use crate::read::{Reader, ReaderError};
use crate::ser::Serializer;
use crate::size;

fn write_null(ser: &mut Serializer<'_>) {
    size::write_size(ser.writer(), 0);
}

fn write_id(ser: &mut Serializer<'_>, id: u64) {
    size::write_size(ser.writer(), id as usize);
}

fn read_id(de: &mut Deserializer<'_>) -> u64 {
    size::read_size(de.reader(), size::MAX_SIZE) as u64
}

/// Extension for the standard owned and shared pointer types.
pub struct SmartPtr;

impl<T: Default + 'static> Ext<Box<T>> for SmartPtr {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Box<T>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        let ctx = ser.context_ref::<PointerLinkingContext>();
        let addr = &**v as *const T as usize;
        let (id, body) = ctx.visit_ptr(addr, Ownership::Owner);
        write_id(ser, id);
        if body {
            f(ser, &mut **v);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Box<T>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            de.reader().set_error(ReaderError::InvalidPointer);
            return;
        }
        ctx.visit_id(id, Ownership::Owner);
        f(de, &mut **v);
        ctx.resolve_owner::<T>(id, &**v);
    }
}

impl<T: Default + 'static> Ext<Option<Box<T>>> for SmartPtr {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Option<Box<T>>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        match v {
            Some(boxed) => {
                let ctx = ser.context_ref::<PointerLinkingContext>();
                let addr = &**boxed as *const T as usize;
                let (id, body) = ctx.visit_ptr(addr, Ownership::Owner);
                write_id(ser, id);
                if body {
                    f(ser, &mut **boxed);
                }
            }
            None => write_null(ser),
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Option<Box<T>>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            *v = None;
            return;
        }
        ctx.visit_id(id, Ownership::Owner);
        let boxed = v.get_or_insert_with(|| Box::new(T::default()));
        f(de, &mut **boxed);
        ctx.resolve_owner::<T>(id, &**boxed);
    }
}

impl<T: Clone + Default + 'static> Ext<Rc<T>> for SmartPtr {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Rc<T>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        let ctx = ser.context_ref::<PointerLinkingContext>();
        let addr = Rc::as_ptr(v) as usize;
        let (id, body) = ctx.visit_ptr(addr, Ownership::SharedOwner);
        write_id(ser, id);
        if body {
            // A shared pointee cannot be borrowed mutably; serialize a
            // clone, which writes the same bytes.
            let mut copy = (**v).clone();
            f(ser, &mut copy);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Rc<T>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            de.reader().set_error(ReaderError::InvalidPointer);
            return;
        }
        let processed = ctx.visit_id(id, Ownership::SharedOwner);
        if processed {
            if let Some(shared) = ctx.shared_state::<Rc<T>>(id) {
                *v = shared;
            }
        } else {
            let mut rc = Rc::new(T::default());
            f(de, Rc::get_mut(&mut rc).expect("freshly created"));
            ctx.set_shared_state(id, rc.clone());
            *v = rc;
        }
        ctx.resolve_owner::<T>(id, Rc::as_ptr(v));
    }
}

impl<T: Clone + Default + 'static> Ext<Option<Rc<T>>> for SmartPtr {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Option<Rc<T>>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        match v {
            Some(rc) => {
                let mut rc = rc.clone();
                SmartPtr.serialize(ser, &mut rc, &mut f);
            }
            None => write_null(ser),
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Option<Rc<T>>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            *v = None;
            return;
        }
        let processed = ctx.visit_id(id, Ownership::SharedOwner);
        if processed {
            if let Some(shared) = ctx.shared_state::<Rc<T>>(id) {
                *v = Some(shared);
            }
        } else {
            let mut rc = Rc::new(T::default());
            f(de, Rc::get_mut(&mut rc).expect("freshly created"));
            ctx.set_shared_state(id, rc.clone());
            *v = Some(rc);
        }
        if let Some(rc) = v {
            ctx.resolve_owner::<T>(id, Rc::as_ptr(rc));
        }
    }
}

impl<T: Clone + Default + 'static> Ext<Weak<T>> for SmartPtr {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Weak<T>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        match v.upgrade() {
            Some(rc) => {
                let ctx = ser.context_ref::<PointerLinkingContext>();
                let addr = Rc::as_ptr(&rc) as usize;
                let (id, body) = ctx.visit_ptr(addr, Ownership::SharedObserver);
                write_id(ser, id);
                if body {
                    let mut copy = (*rc).clone();
                    f(ser, &mut copy);
                }
            }
            None => write_null(ser),
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Weak<T>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            *v = Weak::new();
            return;
        }
        let processed = ctx.visit_id(id, Ownership::SharedObserver);
        if processed {
            if let Some(shared) = ctx.shared_state::<Rc<T>>(id) {
                *v = Rc::downgrade(&shared);
                return;
            }
        }
        // First visit through a weak handle: the body is on the wire here.
        // The shared state keeps the pointee alive until an owning Rc picks
        // it up (or `clear_shared_state` lets it go).
        let mut rc = Rc::new(T::default());
        f(de, Rc::get_mut(&mut rc).expect("freshly created"));
        ctx.set_shared_state(id, rc.clone());
        ctx.resolve_owner::<T>(id, Rc::as_ptr(&rc));
        *v = Rc::downgrade(&rc);
    }
}

/// Extension for raw owning pointers, allocated through the linking
/// context's memory resource.
pub struct PointerOwner;

impl<T: Default + 'static> Ext<*mut T> for PointerOwner {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut *mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        if v.is_null() {
            write_null(ser);
            return;
        }
        let ctx = ser.context_ref::<PointerLinkingContext>();
        let (id, body) = ctx.visit_ptr(*v as usize, Ownership::Owner);
        write_id(ser, id);
        if body {
            // Safe: the pointer is non-null and owned by the value being
            // serialized.
            f(ser, unsafe { &mut **v });
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut *mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            if !v.is_null() {
                // Safe: a non-null raw owner came out of a previous
                // traversal with this resource.
                unsafe { ctx.destroy_raw(*v) };
            }
            *v = std::ptr::null_mut();
            return;
        }
        ctx.visit_id(id, Ownership::Owner);
        if v.is_null() {
            let raw = ctx
                .resource()
                .allocate(Layout::new::<T>(), TypeId::of::<T>()) as *mut T;
            if raw.is_null() {
                de.reader().set_error(ReaderError::InvalidPointer);
                return;
            }
            // Safe: fresh allocation of the right layout.
            unsafe { std::ptr::write(raw, T::default()) };
            *v = raw;
        }
        // Safe: non-null and exclusively owned by this field.
        f(de, unsafe { &mut **v });
        ctx.resolve_owner::<T>(id, *v);
    }
}

/// Extension for raw observing pointers.
pub struct PointerObserver;

impl<T: 'static> Ext<*const T> for PointerObserver {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut *const T, _f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        if v.is_null() {
            write_null(ser);
            return;
        }
        let ctx = ser.context_ref::<PointerLinkingContext>();
        let (id, _) = ctx.visit_ptr(*v as usize, Ownership::Observer);
        write_id(ser, id);
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut *const T, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            *v = std::ptr::null();
            return;
        }
        ctx.visit_id(id, Ownership::Observer);
        // Safe: the observer field outlives the traversal per the linking
        // module's contract.
        unsafe { ctx.observe::<T>(id, v) };
    }
}

/// Serialize a value in place while granting it a pointer id, so observer
/// pointers elsewhere in the graph can alias it.
pub struct ReferencedByPointer;

impl<T: 'static> Ext<T> for ReferencedByPointer {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        let ctx = ser.context_ref::<PointerLinkingContext>();
        let (id, _) = ctx.visit_ptr(v as *const T as usize, Ownership::Owner);
        write_id(ser, id);
        f(ser, v);
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let ctx = de.context_ref::<PointerLinkingContext>();
        let id = read_id(de);
        if id == 0 {
            // A by-value field is never null on the wire.
            de.reader().set_error(ReaderError::InvalidPointer);
            return;
        }
        ctx.visit_id(id, Ownership::Owner);
        f(de, v);
        ctx.resolve_owner::<T>(id, v as *const T);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Contexts;
    use crate::de::from_slice_with_contexts;
    use crate::flow::{Flow, Serialize};
    use crate::ser::to_vec_with_contexts;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Payload {
        v: u32,
    }

    impl Serialize for Payload {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.value(&mut self.v);
        }
    }

    #[derive(Default)]
    struct Owned {
        boxed: Option<Box<Payload>>,
    }

    impl Serialize for Owned {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.ext(&mut self.boxed, &SmartPtr);
        }
    }

    #[test]
    fn boxed_owner_round_trips() {
        let ctx = PointerLinkingContext::new();
        let mut v = Owned {
            boxed: Some(Box::new(Payload { v: 77 })),
        };
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        // id 1, then the body.
        assert_eq!(bytes, [1, 77, 0, 0, 0]);

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) =
            from_slice_with_contexts::<Owned>(&bytes, Contexts::new().with(&read_ctx));
        assert_eq!(out.boxed.unwrap().v, 77);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert!(read_ctx.is_valid());
    }

    #[test]
    fn null_owner_is_id_zero() {
        let ctx = PointerLinkingContext::new();
        let mut v = Owned { boxed: None };
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        assert_eq!(bytes, [0]);

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) =
            from_slice_with_contexts::<Owned>(&bytes, Contexts::new().with(&read_ctx));
        assert!(out.boxed.is_none());
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }

    struct OwnerAndObservers {
        values: Vec<Payload>,
        first: *const Payload,
        last: *const Payload,
    }

    impl Default for OwnerAndObservers {
        fn default() -> Self {
            OwnerAndObservers {
                values: Vec::new(),
                first: std::ptr::null(),
                last: std::ptr::null(),
            }
        }
    }

    impl Serialize for OwnerAndObservers {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.container_with(&mut self.values, 100, |f, item| {
                f.ext(item, &ReferencedByPointer);
            });
            f.ext(&mut self.first, &PointerObserver);
            f.ext(&mut self.last, &PointerObserver);
        }
    }

    #[test]
    fn observers_alias_container_entries() {
        let ctx = PointerLinkingContext::new();
        let mut v = OwnerAndObservers {
            values: vec![Payload { v: 1 }, Payload { v: 2 }, Payload { v: 3 }],
            first: std::ptr::null(),
            last: std::ptr::null(),
        };
        v.first = &v.values[0];
        v.last = &v.values[2];
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        assert!(ctx.is_valid());

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) =
            from_slice_with_contexts::<OwnerAndObservers>(&bytes, Contexts::new().with(&read_ctx));
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert!(read_ctx.is_valid());
        assert_eq!(out.first, &out.values[0] as *const Payload);
        assert_eq!(out.last, &out.values[2] as *const Payload);
    }

    struct ObserverBeforeOwner {
        early: *const Payload,
        owner: Option<Box<Payload>>,
    }

    impl Default for ObserverBeforeOwner {
        fn default() -> Self {
            ObserverBeforeOwner {
                early: std::ptr::null(),
                owner: None,
            }
        }
    }

    impl Serialize for ObserverBeforeOwner {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.ext(&mut self.early, &PointerObserver);
            f.ext(&mut self.owner, &SmartPtr);
        }
    }

    #[test]
    fn observer_seen_before_its_owner_is_backpatched() {
        let ctx = PointerLinkingContext::new();
        let mut v = ObserverBeforeOwner::default();
        v.owner = Some(Box::new(Payload { v: 123 }));
        v.early = &**v.owner.as_ref().unwrap();
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        assert!(ctx.is_valid());

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) = from_slice_with_contexts::<ObserverBeforeOwner>(
            &bytes,
            Contexts::new().with(&read_ctx),
        );
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert!(read_ctx.is_valid());
        let owner = out.owner.as_ref().unwrap();
        assert_eq!(out.early, &**owner as *const Payload);
        assert_eq!(unsafe { (*out.early).v }, 123);
    }

    #[test]
    fn dangling_observer_invalidates_the_context() {
        struct JustObserver {
            p: *const Payload,
        }
        impl Default for JustObserver {
            fn default() -> Self {
                JustObserver {
                    p: std::ptr::null(),
                }
            }
        }
        impl Serialize for JustObserver {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.ext(&mut self.p, &PointerObserver);
            }
        }
        let payload = Payload { v: 5 };
        let ctx = PointerLinkingContext::new();
        let mut v = JustObserver { p: &payload };
        let _bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        assert!(!ctx.is_valid());
    }

    #[derive(Default, Debug)]
    struct SharedPair {
        a: Option<Rc<Payload>>,
        b: Option<Rc<Payload>>,
    }

    impl Serialize for SharedPair {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.ext(&mut self.a, &SmartPtr);
            f.ext(&mut self.b, &SmartPtr);
        }
    }

    #[test]
    fn shared_owners_reconstruct_one_pointee() {
        let ctx = PointerLinkingContext::new();
        let shared = Rc::new(Payload { v: 9 });
        let mut v = SharedPair {
            a: Some(shared.clone()),
            b: Some(shared),
        };
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        // id, body, id again: 1 + 4 + 1 bytes.
        assert_eq!(bytes.len(), 6);
        assert!(ctx.is_valid());

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) =
            from_slice_with_contexts::<SharedPair>(&bytes, Contexts::new().with(&read_ctx));
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert!(read_ctx.is_valid());
        let (a, b) = (out.a.unwrap(), out.b.unwrap());
        assert_eq!(a.v, 9);
        assert!(Rc::ptr_eq(&a, &b));
        read_ctx.clear_shared_state();
        assert_eq!(Rc::strong_count(&a), 2);
    }

    #[test]
    fn weak_resolves_against_the_shared_owner() {
        #[derive(Default)]
        struct OwnerAndWeak {
            owner: Option<Rc<Payload>>,
            weak: Weak<Payload>,
        }
        impl Serialize for OwnerAndWeak {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.ext(&mut self.owner, &SmartPtr);
                f.ext(&mut self.weak, &SmartPtr);
            }
        }
        let ctx = PointerLinkingContext::new();
        let shared = Rc::new(Payload { v: 40 });
        let mut v = OwnerAndWeak {
            weak: Rc::downgrade(&shared),
            owner: Some(shared),
        };
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        assert!(ctx.is_valid());

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) =
            from_slice_with_contexts::<OwnerAndWeak>(&bytes, Contexts::new().with(&read_ctx));
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert!(read_ctx.is_valid());
        read_ctx.clear_shared_state();
        let owner = out.owner.unwrap();
        let upgraded = out.weak.upgrade().unwrap();
        assert!(Rc::ptr_eq(&owner, &upgraded));
    }

    #[test]
    fn raw_owner_allocates_through_the_resource() {
        struct RawOwner {
            p: *mut Payload,
        }
        impl Default for RawOwner {
            fn default() -> Self {
                RawOwner {
                    p: std::ptr::null_mut(),
                }
            }
        }
        impl Serialize for RawOwner {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.ext(&mut self.p, &PointerOwner);
            }
        }
        let ctx = PointerLinkingContext::new();
        let mut payload = Payload { v: 31 };
        let mut v = RawOwner { p: &mut payload };
        let bytes = to_vec_with_contexts(&mut v, Contexts::new().with(&ctx));
        assert!(ctx.is_valid());

        let read_ctx = PointerLinkingContext::new();
        let (out, err, done) =
            from_slice_with_contexts::<RawOwner>(&bytes, Contexts::new().with(&read_ctx));
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert!(read_ctx.is_valid());
        assert!(!out.p.is_null());
        unsafe {
            assert_eq!((*out.p).v, 31);
            read_ctx.destroy_raw(out.p);
        }
    }
}
