//! The deserialization driver.
//!
//! A `Deserializer` executes the same user programs as the serializer,
//! overwriting values in place. It never returns an error: failures latch
//! on the input adapter and subsequent reads produce zeros, so the caller
//! checks `error()` and `is_completed_successfully()` once the top-level
//! `object` returns.

use std::any::Any;
use std::mem;

use crate::bits::BitReader;
use crate::context::Contexts;
use crate::ext::Ext;
use crate::flow::{Flow, Serialize};
use crate::raw::{self, Pod};
use crate::read::{Reader, ReaderError, SliceReader};
use crate::size;
use crate::traits::{Sequence, Text};
use crate::value::Fundamental;

pub struct Deserializer<'a> {
    reader: &'a mut (dyn Reader + 'a),
    contexts: Contexts<'a>,
}

impl<'a> Deserializer<'a> {
    pub fn new(reader: &'a mut (dyn Reader + 'a)) -> Self {
        Deserializer {
            reader,
            contexts: Contexts::new(),
        }
    }

    pub fn with_contexts(reader: &'a mut (dyn Reader + 'a), contexts: Contexts<'a>) -> Self {
        Deserializer { reader, contexts }
    }

    /// Direct access to the adapter, for extensions.
    pub fn reader(&mut self) -> &mut (dyn Reader + 'a) {
        &mut *self.reader
    }

    /// Decode a size with the variable-length codec, validating it against
    /// `max_size` when the configuration checks data.
    pub fn read_size(&mut self, max_size: usize) -> usize {
        size::read_size(self.reader, max_size)
    }

    /// Context lookup that outlives the borrow of `self`; see the
    /// serializer's twin.
    pub fn context_ref<T: Any>(&self) -> &'a T {
        match self.contexts.get::<T>() {
            Some(ctx) => ctx,
            None => panic!(
                "missing deserialization context: {}",
                std::any::type_name::<T>()
            ),
        }
    }

    pub fn try_context_ref<T: Any>(&self) -> Option<&'a T> {
        self.contexts.get::<T>()
    }

    fn read_pod_slice<T: Pod>(&mut self, slice: &mut [T]) {
        let one_byte = mem::size_of::<T>() == 1;
        if !self.reader.bit_packing() && (one_byte || !self.reader.swapping()) {
            self.reader.read_raw(raw::slice_as_bytes_mut(slice));
        } else {
            for v in slice {
                *v = T::read(self.reader);
            }
        }
    }
}

impl<'a> Flow for Deserializer<'a> {
    type Packed<'x> = Deserializer<'x>;

    fn value<T: Fundamental>(&mut self, v: &mut T) {
        *v = T::read(self.reader);
    }

    fn bool_value(&mut self, v: &mut bool) {
        if self.reader.bit_packing() {
            *v = self.reader.read_bits(1) != 0;
        } else {
            let byte = self.reader.read_u8();
            if byte > 1 && self.reader.check_data_errors() {
                self.reader.set_error(ReaderError::InvalidData);
                *v = false;
                return;
            }
            *v = byte != 0;
        }
    }

    fn object<T: Serialize>(&mut self, v: &mut T) {
        v.serialize(self);
    }

    fn text<T: Text>(&mut self, v: &mut T, max_size: usize) {
        let len = size::read_size(self.reader, max_size.saturating_sub(T::ADD_NUL as usize));
        let mut units: Vec<T::Unit> = vec![T::Unit::default(); len];
        self.read_pod_slice(&mut units);
        match T::assemble(units) {
            Some(text) => *v = text,
            None => self.reader.set_error(ReaderError::InvalidData),
        }
    }

    fn container<C>(&mut self, c: &mut C, max_size: usize)
    where
        C: Sequence,
        C::Item: Serialize,
    {
        if C::RESIZABLE {
            let len = size::read_size(self.reader, max_size);
            c.resize(len);
        }
        c.visit(|item| item.serialize(self));
    }

    fn container_value<C>(&mut self, c: &mut C, max_size: usize)
    where
        C: Sequence,
        C::Item: Pod,
    {
        if C::RESIZABLE {
            let len = size::read_size(self.reader, max_size);
            c.resize(len);
        }
        match c.contiguous_mut() {
            Some(slice) => self.read_pod_slice(slice),
            None => c.visit(|item| *item = C::Item::read(self.reader)),
        }
    }

    fn container_with<C, G>(&mut self, c: &mut C, max_size: usize, mut f: G)
    where
        C: Sequence,
        G: FnMut(&mut Self, &mut C::Item),
    {
        if C::RESIZABLE {
            let len = size::read_size(self.reader, max_size);
            c.resize(len);
        }
        c.visit(|item| f(self, item));
    }

    fn ext<T, E>(&mut self, v: &mut T, e: &E)
    where
        E: Ext<T>,
        E::Inner: Serialize,
    {
        e.deserialize(self, v, |d, inner| inner.serialize(d));
    }

    fn ext_value<T, E>(&mut self, v: &mut T, e: &E)
    where
        E: Ext<T>,
        E::Inner: Fundamental,
    {
        e.deserialize(self, v, |d, inner| d.value(inner));
    }

    fn ext_with<T, E, G>(&mut self, v: &mut T, e: &E, f: G)
    where
        E: Ext<T>,
        G: FnMut(&mut Self, &mut E::Inner),
    {
        e.deserialize(self, v, f);
    }

    fn align(&mut self) {
        self.reader.align();
    }

    fn enable_bit_packing<G>(&mut self, f: G)
    where
        G: for<'x> FnOnce(&mut Deserializer<'x>),
    {
        let contexts = self.contexts.clone();
        let mut packed_reader = BitReader::new(&mut *self.reader);
        let mut packed = Deserializer {
            reader: &mut packed_reader,
            contexts,
        };
        f(&mut packed);
        // Dropping the wrapper consumes and validates the padding.
    }

    fn context<T: Any>(&self) -> &T {
        self.context_ref::<T>()
    }

    fn try_context<T: Any>(&self) -> Option<&T> {
        self.try_context_ref::<T>()
    }
}

/// Deserialize one value from `bytes`, returning it along with the latched
/// error and the completion flag.
pub fn from_slice<T: Serialize + Default>(bytes: &[u8]) -> (T, ReaderError, bool) {
    from_slice_with_contexts(bytes, Contexts::new())
}

pub fn from_slice_with_contexts<T: Serialize + Default>(
    bytes: &[u8],
    contexts: Contexts<'_>,
) -> (T, ReaderError, bool) {
    let mut reader: SliceReader = SliceReader::new(bytes);
    let mut value = T::default();
    {
        let mut de = Deserializer::with_contexts(&mut reader, contexts);
        de.object(&mut value);
    }
    eprintln!("DEBUG from_slice_with_contexts done, about to return");
    (value, reader.error(), reader.is_completed_successfully())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::to_vec;

    #[derive(Default, Debug, PartialEq)]
    struct Plain {
        a: u32,
        b: i16,
        c: u8,
    }

    impl Serialize for Plain {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.value(&mut self.a);
            f.value(&mut self.b);
            f.value(&mut self.c);
        }
    }

    #[test]
    fn integers_round_trip() {
        let mut v = Plain {
            a: 94_545_646,
            b: -8778,
            c: 200,
        };
        let bytes = to_vec(&mut v);
        let (out, err, done) = from_slice::<Plain>(&bytes);
        assert_eq!(out, v);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }

    #[test]
    fn truncated_input_latches_overflow() {
        let mut v = Plain {
            a: 1,
            b: 2,
            c: 3,
        };
        let bytes = to_vec(&mut v);
        let (out, err, done) = from_slice::<Plain>(&bytes[..5]);
        assert_eq!(err, ReaderError::DataOverflow);
        assert!(!done);
        // The field that straddled the end reads as zero.
        assert_eq!(out.b, 0);
    }

    #[test]
    fn bool_byte_must_be_zero_or_one() {
        #[derive(Default)]
        struct Flag {
            on: bool,
        }
        impl Serialize for Flag {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.bool_value(&mut self.on);
            }
        }
        let (_, err, _) = from_slice::<Flag>(&[2]);
        assert_eq!(err, ReaderError::InvalidData);
        let (v, err, done) = from_slice::<Flag>(&[1]);
        assert!(v.on && done);
        assert_eq!(err, ReaderError::NoError);
    }

    #[test]
    fn strings_round_trip_and_reject_bad_utf8() {
        #[derive(Default, Debug, PartialEq)]
        struct Named {
            name: String,
        }
        impl Serialize for Named {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.text(&mut self.name, 16);
            }
        }
        let mut v = Named {
            name: "grüße".to_string(),
        };
        let bytes = to_vec(&mut v);
        let (out, err, done) = from_slice::<Named>(&bytes);
        assert_eq!(out, v);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);

        let (_, err, _) = from_slice::<Named>(&[2, 0xFF, 0xFE]);
        assert_eq!(err, ReaderError::InvalidData);
    }

    #[test]
    fn oversized_text_is_rejected_by_max() {
        #[derive(Default)]
        struct Named {
            name: String,
        }
        impl Serialize for Named {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.text(&mut self.name, 4);
            }
        }
        let (v, err, _) = from_slice::<Named>(&[9, b'a', b'b']);
        assert_eq!(err, ReaderError::InvalidData);
        assert_eq!(v.name, "");
    }

    #[test]
    fn containers_resize_then_fill() {
        #[derive(Default, Debug, PartialEq)]
        struct Lists {
            nums: Vec<u32>,
            objs: Vec<Plain>,
        }
        impl Serialize for Lists {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.container_value(&mut self.nums, 10);
                f.container(&mut self.objs, 10);
            }
        }
        let mut v = Lists {
            nums: vec![5, 6, 7],
            objs: vec![
                Plain { a: 1, b: -1, c: 2 },
                Plain { a: 3, b: -3, c: 4 },
            ],
        };
        let bytes = to_vec(&mut v);
        let (out, err, done) = from_slice::<Lists>(&bytes);
        assert_eq!(out, v);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }

    #[test]
    fn bit_packed_region_round_trips() {
        #[derive(Default, Debug, PartialEq)]
        struct Packed {
            flag: bool,
            small: u8,
            after: u16,
        }
        impl Serialize for Packed {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                let mut flag = self.flag;
                let mut small = self.small;
                f.enable_bit_packing(|p| {
                    p.bool_value(&mut flag);
                    p.value(&mut small);
                });
                self.flag = flag;
                self.small = small;
                f.value(&mut self.after);
            }
        }
        let mut v = Packed {
            flag: true,
            small: 0x55,
            after: 0xBEEF,
        };
        let bytes = to_vec(&mut v);
        let (out, err, done) = from_slice::<Packed>(&bytes);
        assert_eq!(out, v);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }
}
