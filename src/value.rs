//! Fundamental values: the fixed-width primitives the engine writes whole.
//!
//! Each primitive knows how to put itself on a writer and pull itself off a
//! reader. Floats are reinterpreted to the unsigned integer of their width
//! first, so endianness conversion and bit packing only ever see integers.
//! `bool` is deliberately not fundamental (it has its own one-bit/one-byte
//! treatment on the engine), and neither are `usize`/`isize` (their width is
//! not a property of the wire; lengths travel through the size codec).

use crate::read::Reader;
use crate::write::Writer;

pub trait Fundamental: Copy + 'static {
    fn write(self, w: &mut (dyn Writer + '_));
    fn read(r: &mut (dyn Reader + '_)) -> Self;
}

macro_rules! implement_fundamental {
    ( $( $type:ty, $repr:ty, $write:ident, $read:ident );* $(;)? ) => {
        $(
            impl Fundamental for $type {
                fn write(self, w: &mut (dyn Writer + '_)) {
                    w.$write(self as $repr);
                }

                fn read(r: &mut (dyn Reader + '_)) -> Self {
                    r.$read() as $type
                }
            }
        )*
    }
}

implement_fundamental! {
    u8, u8, write_u8, read_u8;
    i8, u8, write_u8, read_u8;
    u16, u16, write_u16, read_u16;
    i16, u16, write_u16, read_u16;
    u32, u32, write_u32, read_u32;
    i32, u32, write_u32, read_u32;
    u64, u64, write_u64, read_u64;
    i64, u64, write_u64, read_u64;
}

impl Fundamental for f32 {
    fn write(self, w: &mut (dyn Writer + '_)) {
        w.write_u32(self.to_bits());
    }

    fn read(r: &mut (dyn Reader + '_)) -> Self {
        f32::from_bits(r.read_u32())
    }
}

impl Fundamental for f64 {
    fn write(self, w: &mut (dyn Writer + '_)) {
        w.write_u64(self.to_bits());
    }

    fn read(r: &mut (dyn Reader + '_)) -> Self {
        f64::from_bits(r.read_u64())
    }
}
