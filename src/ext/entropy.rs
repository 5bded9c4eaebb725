//! Substitution and entropy coding over a list of expected values.
//!
//! Both write a small index when the value equals one of N well-known
//! values, and index 0 followed by the full value otherwise. The index is a
//! value range over `[0, N]`, so it costs `ceil(log2(N + 1))` bits and the
//! extension must run inside a bit-packing region. `Entropy` additionally
//! offers to align before the fallback payload, which keeps multi-byte
//! payloads endian-convertible.

use crate::de::Deserializer;
use crate::ext::value_range::ValueRange;
use crate::ext::Ext;
use crate::read::Reader;
use crate::ser::Serializer;
use crate::write::Writer;

fn find_index<T: PartialEq>(v: &T, expected: &[T]) -> u64 {
    match expected.iter().position(|e| e == v) {
        Some(i) => i as u64 + 1,
        None => 0,
    }
}

fn index_range(len: usize) -> ValueRange<u64> {
    ValueRange::new(0, len as u64)
}

fn write_index(ser: &mut Serializer<'_>, index: u64, len: usize) {
    let range = index_range(len);
    let mut index = index;
    range.serialize(ser, &mut index, |_, _: &mut ()| {});
}

fn read_index(de: &mut Deserializer<'_>, len: usize) -> u64 {
    let range = index_range(len);
    let mut index = 0u64;
    range.deserialize(de, &mut index, |_, _: &mut ()| {});
    index
}

/// Substitute well-known values with a short index.
pub struct Substitution<'v, T: PartialEq> {
    expected: &'v [T],
}

impl<'v, T: PartialEq> Substitution<'v, T> {
    pub fn new(expected: &'v [T]) -> Self {
        assert!(!expected.is_empty());
        Substitution { expected }
    }
}

impl<'v, T: PartialEq + Clone> Ext<T> for Substitution<'v, T> {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        let index = find_index(v, self.expected);
        write_index(ser, index, self.expected.len());
        if index == 0 {
            f(ser, v);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let index = read_index(de, self.expected.len());
        if index == 0 {
            f(de, v);
        } else {
            *v = self.expected[index as usize - 1].clone();
        }
    }
}

/// `Substitution` with an alignment knob for the fallback payload.
pub struct Entropy<'v, T: PartialEq> {
    expected: &'v [T],
    align_before_data: bool,
}

impl<'v, T: PartialEq> Entropy<'v, T> {
    pub fn new(expected: &'v [T]) -> Self {
        Entropy::with_alignment(expected, true)
    }

    pub fn with_alignment(expected: &'v [T], align_before_data: bool) -> Self {
        assert!(!expected.is_empty());
        Entropy {
            expected,
            align_before_data,
        }
    }
}

impl<'v, T: PartialEq + Clone> Ext<T> for Entropy<'v, T> {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        let index = find_index(v, self.expected);
        write_index(ser, index, self.expected.len());
        if self.align_before_data {
            ser.writer().align();
        }
        if index == 0 {
            f(ser, v);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let index = read_index(de, self.expected.len());
        if self.align_before_data {
            de.reader().align();
        }
        if index == 0 {
            f(de, v);
        } else {
            *v = self.expected[index as usize - 1].clone();
        }
    }
}
