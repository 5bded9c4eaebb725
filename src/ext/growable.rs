//! The growable (session) extension.
//!
//! Wrapping a sub-traversal in `Growable` records its extent in the session
//! table, which makes the span forward- and backward-compatible: a reader
//! running an older program skips the extra bytes, a reader running a newer
//! one gets zeros for the missing tail. See the adapter modules for the
//! trailer format.

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::read::Reader;
use crate::ser::Serializer;
use crate::write::Writer;

pub struct Growable;

impl<T> Ext<T> for Growable {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        ser.writer().begin_session();
        f(ser, v);
        ser.writer().end_session();
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        de.reader().begin_session();
        f(de, v);
        de.reader().end_session();
    }
}

#[cfg(test)]
mod tests {
    use crate::de::from_slice;
    use crate::ext::Growable;
    use crate::flow::{Flow, Serialize};
    use crate::read::ReaderError;
    use crate::ser::to_vec;

    // The "version 2" shape: four fields inside one growable span.
    #[derive(Default)]
    struct WideRecord {
        a: u32,
        b: u32,
        c: u32,
        d: u32,
    }

    impl Serialize for WideRecord {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            let ext = Growable;
            f.ext_with(self, &ext, |f, v| {
                f.value(&mut v.a);
                f.value(&mut v.b);
                f.value(&mut v.c);
                f.value(&mut v.d);
            });
        }
    }

    // The "version 1" shape: the same span, but only three fields known.
    #[derive(Default)]
    struct NarrowRecord {
        a: u32,
        b: u32,
        c: u32,
    }

    impl Serialize for NarrowRecord {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            let ext = Growable;
            f.ext_with(self, &ext, |f, v| {
                f.value(&mut v.a);
                f.value(&mut v.b);
                f.value(&mut v.c);
            });
        }
    }

    #[test]
    fn old_reader_skips_new_fields() {
        let mut wide = WideRecord {
            a: 1,
            b: 2,
            c: 3,
            d: 4,
        };
        let bytes = to_vec(&mut wide);
        let (narrow, err, done) = from_slice::<NarrowRecord>(&bytes);
        assert_eq!((narrow.a, narrow.b, narrow.c), (1, 2, 3));
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }

    #[test]
    fn new_reader_zero_fills_old_stream() {
        let mut narrow = NarrowRecord { a: 7, b: 8, c: 9 };
        let bytes = to_vec(&mut narrow);
        let (wide, err, done) = from_slice::<WideRecord>(&bytes);
        assert_eq!((wide.a, wide.b, wide.c, wide.d), (7, 8, 9, 0));
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }

    #[test]
    fn sessions_after_a_grown_one_still_line_up() {
        #[derive(Default)]
        struct TwoSpansWide {
            first: WideRecord,
            tail: u16,
        }
        impl Serialize for TwoSpansWide {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.object(&mut self.first);
                f.value(&mut self.tail);
            }
        }
        #[derive(Default)]
        struct TwoSpansNarrow {
            first: NarrowRecord,
            tail: u16,
        }
        impl Serialize for TwoSpansNarrow {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.object(&mut self.first);
                f.value(&mut self.tail);
            }
        }

        let mut wide = TwoSpansWide::default();
        wide.first.d = 0xDDDD_DDDD;
        wide.tail = 0x7777;
        let bytes = to_vec(&mut wide);
        let (narrow, err, done) = from_slice::<TwoSpansNarrow>(&bytes);
        assert_eq!(narrow.tail, 0x7777);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
    }
}
