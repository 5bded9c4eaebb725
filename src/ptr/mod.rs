//! Pointer linking: stream-stable identities for pointee reconstruction.
//!
//! Every distinct pointee visited during a traversal gets an id, assigned
//! in order of first observation, starting at 1; id 0 is the null pointer.
//! Owners carry the pointee's body once; observers carry just the id and
//! are resolved against the owner: immediately when the owner came first,
//! or by back-patching when the observer did.
//!
//! The `PointerLinkingContext` holds both directions' tables. It is handed
//! to the engine as a context, lives for the whole traversal, and may be
//! reused across traversals after `clear()`.
//!
//! ## Observer back-patching
//!
//! A pending observer is recorded as the raw address of the observer field.
//! The contract, identical on both container and struct fields: a field
//! registered as an observer must not move between its deserialization and
//! its owner's resolution. The engine itself upholds this for containers by
//! resizing them before filling elements; user programs uphold it by not
//! reshuffling already-deserialized data mid-traversal. A patch whose owner
//! resolves to a different pointee type never writes; it marks the context
//! invalid instead.

pub mod poly;
pub mod smart;

pub use poly::{DynPtr, PolymorphicContext, Rtti};
pub use smart::{PointerObserver, PointerOwner, ReferencedByPointer, SmartPtr};

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::mem::{GlobalHeap, MemResource};

/// How a visit relates to the pointee's lifetime, ordered weakest first.
/// Repeated visits escalate the recorded ownership toward `Owner`; shared
/// kinds mark the pointee processed so its body travels once.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Ownership {
    Observer,
    SharedObserver,
    SharedOwner,
    Owner,
}

struct SerInfo {
    id: u64,
    ownership: Ownership,
    shared_processed: bool,
}

#[derive(Default)]
struct SerTable {
    next_id: u64,
    map: HashMap<usize, SerInfo>,
}

/// Deserialization-side slot for one id.
struct DeSlot {
    ownership: Ownership,
    owner: Option<Box<dyn Any>>,
    shared_state: Option<Box<dyn Any>>,
    pending: Vec<Patch>,
}

/// A recorded observer field, patched when the owner resolves. Returns
/// false when the owner's pointee type does not match the field.
type Patch = Box<dyn Fn(&dyn Any) -> bool>;

impl DeSlot {
    fn new(ownership: Ownership) -> Self {
        DeSlot {
            ownership,
            owner: None,
            shared_state: None,
            pending: Vec::new(),
        }
    }
}

#[derive(Default)]
struct DeTable {
    map: HashMap<u64, DeSlot>,
}

fn update_ownership(current: &mut Ownership, shared_processed: &mut bool, visit: Ownership) {
    if visit == Ownership::Observer {
        return;
    }
    if *current == Ownership::Observer {
        *current = visit;
        return;
    }
    // Only shared ownership legitimately revisits a pointee.
    debug_assert!(matches!(
        visit,
        Ownership::SharedOwner | Ownership::SharedObserver
    ));
    if visit == Ownership::SharedOwner {
        *current = Ownership::SharedOwner;
    }
    *shared_processed = true;
}

/// The per-traversal table of pointer ids, pointees, and pending patches.
pub struct PointerLinkingContext {
    resource: Box<dyn MemResource>,
    ser: RefCell<SerTable>,
    de: RefCell<DeTable>,
    patch_mismatch: Cell<bool>,
}

impl Default for PointerLinkingContext {
    fn default() -> Self {
        PointerLinkingContext::new()
    }
}

impl PointerLinkingContext {
    pub fn new() -> Self {
        PointerLinkingContext::with_resource(Box::new(GlobalHeap))
    }

    /// Use a custom memory resource for raw-pointer pointee allocations.
    pub fn with_resource(resource: Box<dyn MemResource>) -> Self {
        PointerLinkingContext {
            resource,
            ser: RefCell::new(SerTable::default()),
            de: RefCell::new(DeTable::default()),
            patch_mismatch: Cell::new(false),
        }
    }

    pub fn resource(&self) -> &dyn MemResource {
        &*self.resource
    }

    /// Record a serialization-side visit of the pointee at `addr`. Returns
    /// the id to put on the wire and whether this visit carries the body.
    pub fn visit_ptr(&self, addr: usize, visit: Ownership) -> (u64, bool) {
        let mut table = self.ser.borrow_mut();
        let table = &mut *table;
        let fresh_id = table.next_id + 1;
        match table.map.entry(addr) {
            Entry::Occupied(mut entry) => {
                let info = entry.get_mut();
                update_ownership(&mut info.ownership, &mut info.shared_processed, visit);
                (info.id, visit != Ownership::Observer && !info.shared_processed)
            }
            Entry::Vacant(entry) => {
                entry.insert(SerInfo {
                    id: fresh_id,
                    ownership: visit,
                    shared_processed: false,
                });
                table.next_id = fresh_id;
                (fresh_id, visit != Ownership::Observer)
            }
        }
    }

    /// Record a deserialization-side visit of `id`. Returns whether the
    /// pointee body was already consumed by an earlier shared visit.
    pub fn visit_id(&self, id: u64, visit: Ownership) -> bool {
        let mut table = self.de.borrow_mut();
        match table.map.entry(id) {
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                let mut processed = slot.shared_state.is_some();
                update_ownership(&mut slot.ownership, &mut processed, visit);
                slot.shared_state.is_some()
            }
            Entry::Vacant(entry) => {
                entry.insert(DeSlot::new(visit));
                false
            }
        }
    }

    /// Resolve `id`'s owner to `ptr` and run every pending patch.
    pub fn resolve_owner<T: ?Sized + 'static>(&self, id: u64, ptr: *const T) {
        let owner: Box<dyn Any> = Box::new(ptr);
        let pending = {
            let mut table = self.de.borrow_mut();
            let slot = table
                .map
                .get_mut(&id)
                .expect("owner resolution for an unvisited id");
            debug_assert!(slot.ownership != Ownership::Observer);
            std::mem::take(&mut slot.pending)
        };
        for patch in pending {
            if !patch(&*owner) {
                self.patch_mismatch.set(true);
            }
        }
        self.de.borrow_mut().map.get_mut(&id).unwrap().owner = Some(owner);
    }

    /// Point `field` at `id`'s pointee: now if the owner is known, or when
    /// it resolves.
    ///
    /// Safety: `field` must stay valid and unmoved until the traversal
    /// finishes; see the module notes on back-patching.
    pub unsafe fn observe<T: ?Sized + 'static>(&self, id: u64, field: *mut *const T) {
        let mut table = self.de.borrow_mut();
        let slot = table
            .map
            .get_mut(&id)
            .expect("observer registered for an unvisited id");
        match &slot.owner {
            Some(owner) => match owner.downcast_ref::<*const T>() {
                Some(ptr) => *field = *ptr,
                None => self.patch_mismatch.set(true),
            },
            None => {
                let field_addr = field as usize;
                slot.pending.push(Box::new(move |owner: &dyn Any| {
                    match owner.downcast_ref::<*const T>() {
                        Some(ptr) => {
                            // Safe per the field-stability contract above.
                            unsafe { *(field_addr as *mut *const T) = *ptr };
                            true
                        }
                        None => false,
                    }
                }));
            }
        }
    }

    /// Like `observe`, for an observer field that holds `Option<NonNull>`
    /// instead of a raw pointer (the nullable form for unsized pointees,
    /// which have no null raw-pointer constant).
    ///
    /// Safety: same field-stability contract as `observe`.
    pub unsafe fn observe_nonnull<T: ?Sized + 'static>(
        &self,
        id: u64,
        field: *mut Option<std::ptr::NonNull<T>>,
    ) {
        use std::ptr::NonNull;
        let mut table = self.de.borrow_mut();
        let slot = table
            .map
            .get_mut(&id)
            .expect("observer registered for an unvisited id");
        match &slot.owner {
            Some(owner) => match owner.downcast_ref::<*const T>() {
                Some(ptr) => *field = NonNull::new(*ptr as *mut T),
                None => self.patch_mismatch.set(true),
            },
            None => {
                let field_addr = field as usize;
                slot.pending.push(Box::new(move |owner: &dyn Any| {
                    match owner.downcast_ref::<*const T>() {
                        Some(ptr) => {
                            // Safe per the field-stability contract above.
                            unsafe {
                                *(field_addr as *mut Option<NonNull<T>>) =
                                    NonNull::new(*ptr as *mut T);
                            }
                            true
                        }
                        None => false,
                    }
                }));
            }
        }
    }

    /// The shared state stored for `id`, when its kind matches.
    pub fn shared_state<T: Any + Clone>(&self, id: u64) -> Option<T> {
        let table = self.de.borrow();
        let slot = table.map.get(&id)?;
        slot.shared_state.as_ref()?.downcast_ref::<T>().cloned()
    }

    pub fn set_shared_state<T: Any>(&self, id: u64, state: T) {
        let mut table = self.de.borrow_mut();
        let slot = table
            .map
            .get_mut(&id)
            .expect("shared state for an unvisited id");
        slot.shared_state = Some(Box::new(state));
    }

    /// True when every id seen on either side has an owning entry: no
    /// dangling observers, no unowned shared state, no type-mismatched
    /// patches.
    pub fn is_valid(&self) -> bool {
        if self.patch_mismatch.get() {
            return false;
        }
        let ser_ok = self
            .ser
            .borrow()
            .map
            .values()
            .all(|info| matches!(info.ownership, Ownership::Owner | Ownership::SharedOwner));
        let de_ok = self
            .de
            .borrow()
            .map
            .values()
            .all(|slot| matches!(slot.ownership, Ownership::Owner | Ownership::SharedOwner));
        ser_ok && de_ok
    }

    /// Drop the shared-state handles the context still holds, leaving the
    /// deserialized owners as the only keepers of their pointees.
    pub fn clear_shared_state(&self) {
        for slot in self.de.borrow_mut().map.values_mut() {
            slot.shared_state = None;
        }
    }

    /// Forget everything; the context can drive a fresh traversal.
    pub fn clear(&self) {
        let mut ser = self.ser.borrow_mut();
        ser.map.clear();
        ser.next_id = 0;
        self.de.borrow_mut().map.clear();
        self.patch_mismatch.set(false);
    }

    /// Destroy a pointee that was allocated through this context's memory
    /// resource on behalf of a raw owner pointer.
    ///
    /// Safety: `ptr` must have come out of a raw-owner deserialization with
    /// this context and must not be used afterwards.
    pub unsafe fn destroy_raw<T: 'static>(&self, ptr: *mut T) {
        std::ptr::drop_in_place(ptr);
        self.resource.deallocate(
            ptr as *mut u8,
            std::alloc::Layout::new::<T>(),
            TypeId::of::<T>(),
        );
    }
}
