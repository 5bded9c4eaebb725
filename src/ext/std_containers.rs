//! Map and set extensions for the standard associative containers.
//!
//! Sequences go through the `Sequence` trait; maps and sets cannot, because
//! their keys are not addressable in place. These extensions write the size
//! prefix and drive each entry through the caller's closure, rebuilding the
//! container entry by entry on the way in.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use std::mem;

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::ser::Serializer;

/// Key-value container policy; the inner value is the `(key, value)` pair.
pub struct StdMap {
    pub max_size: usize,
}

impl StdMap {
    pub fn new(max_size: usize) -> Self {
        StdMap { max_size }
    }
}

impl<K, V, S> Ext<HashMap<K, V, S>> for StdMap
where
    K: Eq + Hash + Clone + Default,
    V: Default,
    S: BuildHasher + Default,
{
    type Inner = (K, V);

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, map: &mut HashMap<K, V, S>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut (K, V)),
    {
        debug_assert!(map.len() <= self.max_size);
        ser.write_size(map.len());
        for (k, v) in map.iter_mut() {
            // Keys are immutable inside the container; hand the closure a
            // working pair and put the value back afterwards.
            let mut pair = (k.clone(), mem::take(v));
            f(ser, &mut pair);
            *v = pair.1;
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, map: &mut HashMap<K, V, S>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut (K, V)),
    {
        let len = de.read_size(self.max_size);
        map.clear();
        for _ in 0..len {
            let mut pair = (K::default(), V::default());
            f(de, &mut pair);
            map.insert(pair.0, pair.1);
        }
    }
}

impl<K, V> Ext<BTreeMap<K, V>> for StdMap
where
    K: Ord + Clone + Default,
    V: Default,
{
    type Inner = (K, V);

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, map: &mut BTreeMap<K, V>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut (K, V)),
    {
        debug_assert!(map.len() <= self.max_size);
        ser.write_size(map.len());
        for (k, v) in map.iter_mut() {
            let mut pair = (k.clone(), mem::take(v));
            f(ser, &mut pair);
            *v = pair.1;
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, map: &mut BTreeMap<K, V>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut (K, V)),
    {
        let len = de.read_size(self.max_size);
        map.clear();
        for _ in 0..len {
            let mut pair = (K::default(), V::default());
            f(de, &mut pair);
            map.insert(pair.0, pair.1);
        }
    }
}

/// Set container policy; the inner value is the element.
pub struct StdSet {
    pub max_size: usize,
}

impl StdSet {
    pub fn new(max_size: usize) -> Self {
        StdSet { max_size }
    }
}

impl<K, S> Ext<HashSet<K, S>> for StdSet
where
    K: Eq + Hash + Clone + Default,
    S: BuildHasher + Default,
{
    type Inner = K;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, set: &mut HashSet<K, S>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut K),
    {
        debug_assert!(set.len() <= self.max_size);
        ser.write_size(set.len());
        for k in set.iter() {
            let mut key = k.clone();
            f(ser, &mut key);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, set: &mut HashSet<K, S>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut K),
    {
        let len = de.read_size(self.max_size);
        set.clear();
        for _ in 0..len {
            let mut key = K::default();
            f(de, &mut key);
            set.insert(key);
        }
    }
}

impl<K> Ext<BTreeSet<K>> for StdSet
where
    K: Ord + Clone + Default,
{
    type Inner = K;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, set: &mut BTreeSet<K>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut K),
    {
        debug_assert!(set.len() <= self.max_size);
        ser.write_size(set.len());
        for k in set.iter() {
            let mut key = k.clone();
            f(ser, &mut key);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, set: &mut BTreeSet<K>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut K),
    {
        let len = de.read_size(self.max_size);
        set.clear();
        for _ in 0..len {
            let mut key = K::default();
            f(de, &mut key);
            set.insert(key);
        }
    }
}
