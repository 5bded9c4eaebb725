//! Serialization contexts, looked up by type.
//!
//! A context is any value the caller wants in scope during a traversal: the
//! pointer linking table, the polymorphic registry, an inheritance visited
//! set, or something of the caller's own. The engine stores shared
//! references; contexts that need mutation use interior mutability, which
//! keeps re-entrant lookups (a pointer inside a pointer) sound.

use std::any::Any;

/// An ordered list of context references, searched front to back.
#[derive(Clone, Default)]
pub struct Contexts<'a> {
    slots: Vec<&'a (dyn Any + 'static)>,
}

impl<'a> Contexts<'a> {
    pub fn new() -> Self {
        Contexts::default()
    }

    /// Add a context. The first slot of a given type wins on lookup.
    pub fn with<T: Any>(mut self, context: &'a T) -> Self {
        self.slots.push(context);
        self
    }

    /// Find the context of type `T`, if present.
    pub fn get<T: Any>(&self) -> Option<&'a T> {
        self.slots.iter().find_map(|slot| slot.downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_by_type_and_order() {
        let a = 7u32;
        let b = "hello".to_string();
        let c = 9u32;
        let ctx = Contexts::new().with(&a).with(&b).with(&c);
        assert_eq!(ctx.get::<u32>(), Some(&7));
        assert_eq!(ctx.get::<String>().map(|s| s.as_str()), Some("hello"));
        assert_eq!(ctx.get::<i64>(), None);
    }
}
