//! The compact-int extension: zig-zag plus LEB128.
//!
//! Signed values are zig-zag folded so small magnitudes of either sign stay
//! small, then the unsigned result goes out seven bits per byte with the
//! top bit as the continuation flag. One-byte types skip all of it and
//! write their single byte. The byte groups come from the `leb128` crate,
//! bridged onto the adapters with private `io` shims.
//!
//! The checked variant latches `DataOverflow` when a decoded value does not
//! fit the destination width; the default variant truncates, trusting the
//! stream.

use std::io;

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::read::{Reader, ReaderError};
use crate::ser::Serializer;
use crate::write::Writer;

/// An integer the compact codec can fold to and from `u64`.
pub trait CompactInt: Copy + 'static {
    const WIDTH: u32;

    fn fold(self) -> u64;
    fn unfold(raw: u64) -> Self;
}

macro_rules! implement_compact_unsigned {
    ( $( $type:ty ),* ) => {
        $(
            impl CompactInt for $type {
                const WIDTH: u32 = <$type>::BITS;

                fn fold(self) -> u64 {
                    self as u64
                }

                fn unfold(raw: u64) -> Self {
                    raw as $type
                }
            }
        )*
    }
}

macro_rules! implement_compact_signed {
    ( $( $type:ty, $unsigned:ty );* $(;)? ) => {
        $(
            impl CompactInt for $type {
                const WIDTH: u32 = <$type>::BITS;

                // Zig-zag in the value's own width, then widen.
                fn fold(self) -> u64 {
                    (((self << 1) ^ (self >> (<$type>::BITS - 1))) as $unsigned) as u64
                }

                fn unfold(raw: u64) -> Self {
                    let v = raw as $unsigned;
                    ((v >> 1) as $type) ^ -((v & 1) as $type)
                }
            }
        )*
    }
}

implement_compact_unsigned!(u8, u16, u32, u64);
implement_compact_signed! {
    i16, u16; i32, u32; i64, u64;
}

/// One-byte types bypass the varint entirely and travel as their raw byte,
/// so `i8` folds to its bit pattern, not a zig-zag.
impl CompactInt for i8 {
    const WIDTH: u32 = 8;

    fn fold(self) -> u64 {
        self as u8 as u64
    }

    fn unfold(raw: u64) -> Self {
        raw as u8 as i8
    }
}

/// Compact codec policy; `CompactValue::checked()` validates the width.
#[derive(Default)]
pub struct CompactValue {
    check_overflow: bool,
}

impl CompactValue {
    pub fn new() -> Self {
        CompactValue {
            check_overflow: false,
        }
    }

    pub fn checked() -> Self {
        CompactValue {
            check_overflow: true,
        }
    }
}

impl<T: CompactInt> Ext<T> for CompactValue {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, _f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        if T::WIDTH == 8 {
            ser.writer().write_u8(v.fold() as u8);
            return;
        }
        let mut sink = WriterSink(ser.writer());
        leb128::write::unsigned(&mut sink, v.fold()).expect("writer sinks are infallible");
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        if T::WIDTH == 8 {
            let byte = de.reader().read_u8() as u64;
            *v = T::unfold(byte);
            return;
        }
        let mut source = ReaderSource(de.reader());
        match leb128::read::unsigned(&mut source) {
            Ok(raw) => {
                if self.check_overflow && T::WIDTH < 64 && raw > u64::MAX >> (64 - T::WIDTH) {
                    de.reader().set_error(ReaderError::DataOverflow);
                }
                *v = T::unfold(raw);
            }
            Err(_) => {
                // Unterminated or over-long varint.
                de.reader().set_error(ReaderError::InvalidData);
            }
        }
    }
}

/// `io::Write` view of a writer adapter; never fails.
struct WriterSink<'w>(&'w mut (dyn Writer + 'w));

impl<'w> io::Write for WriterSink<'w> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_raw(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `io::Read` view of a reader adapter. A latched adapter yields zeros,
/// which terminate any varint, so reads here never block on bad input.
struct ReaderSource<'r>(&'r mut (dyn Reader + 'r));

impl<'r> io::Read for ReaderSource<'r> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read_raw(buf);
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::from_slice;
    use crate::flow::{Flow, Serialize};
    use crate::ser::to_vec;

    #[derive(Default, Debug, PartialEq)]
    struct Compact32 {
        v: i32,
    }

    impl Serialize for Compact32 {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.ext(&mut self.v, &CompactValue::new());
        }
    }

    #[test]
    fn zig_zag_single_bytes() {
        fn check(v: i32, expected: &[u8]) {
            let mut c = Compact32 { v };
            assert_eq!(to_vec(&mut c), expected, "encoding {}", v);
        }

        check(-1, &[0x01]);
        check(-64, &[0x7F]);
        check(1, &[0x02]);
        check(0, &[0x00]);
        check(64, &[0x80, 0x01]);
    }

    #[test]
    fn values_round_trip() {
        for &v in &[0, 1, -1, 63, -64, 64, -65, i32::MAX, i32::MIN] {
            let mut c = Compact32 { v };
            let bytes = to_vec(&mut c);
            let (out, err, done) = from_slice::<Compact32>(&bytes);
            assert_eq!(out.v, v);
            assert_eq!(err, ReaderError::NoError);
            assert!(done, "trailing bytes for {}", v);
        }
    }

    #[test]
    fn checked_variant_rejects_wide_values() {
        #[derive(Default)]
        struct Narrow {
            v: u16,
        }
        impl Serialize for Narrow {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.ext(&mut self.v, &CompactValue::checked());
            }
        }
        // 0x1_0000 needs 17 bits.
        let bytes = [0x80, 0x80, 0x04];
        let (_, err, _) = from_slice::<Narrow>(&bytes);
        assert_eq!(err, ReaderError::DataOverflow);
    }

    #[test]
    fn one_byte_types_are_written_plain() {
        #[derive(Default, Debug, PartialEq)]
        struct Tiny {
            v: i8,
        }
        impl Serialize for Tiny {
            fn serialize<F: Flow>(&mut self, f: &mut F) {
                f.ext(&mut self.v, &CompactValue::new());
            }
        }
        let mut t = Tiny { v: -2 };
        let bytes = to_vec(&mut t);
        assert_eq!(bytes.len(), 1);
        let (out, err, _) = from_slice::<Tiny>(&bytes);
        assert_eq!(out, t);
        assert_eq!(err, ReaderError::NoError);
    }
}
