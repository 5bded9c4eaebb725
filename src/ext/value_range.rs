//! The value-range extension: quantization over `[min, max]`.
//!
//! An integer range stores `v - min` in exactly as many bits as the span
//! needs. A float range maps `[min, max]` linearly onto the integers of a
//! chosen bit width, either given outright or derived from a precision.
//! Ranges only make sense inside a bit-packing region; using one outside
//! panics like any other bit-level write.
//!
//! On read, a value outside the range latches `InvalidData` and collapses
//! to `min` (when the configuration validates data). Writing an
//! out-of-range value is a programmer error and debug-asserts.

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::read::{Reader, ReaderError};
use crate::ser::Serializer;
use crate::write::Writer;

/// Bits needed to distinguish `span + 1` values; 0 for an empty span.
fn bits_for_span(span: u64) -> u32 {
    64 - span.leading_zeros()
}

fn max_raw(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// A numeric type a `ValueRange` can quantize.
pub trait RangeValue: Copy + PartialOrd {
    /// Width of `max - min` as an unsigned number.
    fn span(min: Self, max: Self, bits: u32) -> u64;

    /// Map `v` into `0 ..= span` for the wire.
    fn to_raw(v: Self, min: Self, max: Self, bits: u32) -> u64;

    /// Map a wire value back into `[min, max]`.
    fn from_raw(raw: u64, min: Self, max: Self, bits: u32) -> Self;
}

macro_rules! implement_range_int {
    ( $( $type:ty, $unsigned:ty );* $(;)? ) => {
        $(
            impl RangeValue for $type {
                // Differences go through the unsigned twin so a negative
                // span byte never sign-extends into the wide counter.
                fn span(min: Self, max: Self, _bits: u32) -> u64 {
                    max.wrapping_sub(min) as $unsigned as u64
                }

                fn to_raw(v: Self, min: Self, _max: Self, _bits: u32) -> u64 {
                    v.wrapping_sub(min) as $unsigned as u64
                }

                fn from_raw(raw: u64, min: Self, _max: Self, _bits: u32) -> Self {
                    min.wrapping_add(raw as $unsigned as $type)
                }
            }
        )*
    }
}

implement_range_int! {
    u8, u8; u16, u16; u32, u32; u64, u64;
    i8, u8; i16, u16; i32, u32; i64, u64;
}

macro_rules! implement_range_float {
    ( $( $type:ty ),* ) => {
        $(
            impl RangeValue for $type {
                fn span(min: Self, max: Self, _bits: u32) -> u64 {
                    (max - min) as u64
                }

                fn to_raw(v: Self, min: Self, max: Self, bits: u32) -> u64 {
                    let ratio = (v - min) / (max - min);
                    (ratio * max_raw(bits) as $type) as u64
                }

                fn from_raw(raw: u64, min: Self, max: Self, bits: u32) -> Self {
                    min + (raw as $type / max_raw(bits) as $type) * (max - min)
                }
            }
        )*
    }
}

implement_range_float!(f32, f64);

pub struct ValueRange<T: RangeValue> {
    min: T,
    max: T,
    bits: u32,
}

impl<T: RangeValue> ValueRange<T> {
    /// A range whose bit width is derived from the span. For integers this
    /// is the constructor; floats want `with_bits` or `with_precision`.
    pub fn new(min: T, max: T) -> Self {
        debug_assert!(min <= max);
        let bits = bits_for_span(T::span(min, max, 0));
        ValueRange { min, max, bits }
    }

    pub fn bits_required(&self) -> u32 {
        self.bits
    }
}

impl ValueRange<f32> {
    pub fn with_bits(min: f32, max: f32, bits: u32) -> Self {
        debug_assert!(min < max && 0 < bits && bits <= 32);
        ValueRange { min, max, bits }
    }

    pub fn with_precision(min: f32, max: f32, precision: f32) -> Self {
        debug_assert!(min < max && precision > 0.0);
        let bits = bits_for_span(((max - min) / precision) as u64);
        ValueRange { min, max, bits }
    }
}

impl ValueRange<f64> {
    pub fn with_bits(min: f64, max: f64, bits: u32) -> Self {
        debug_assert!(min < max && 0 < bits && bits <= 64);
        ValueRange { min, max, bits }
    }

    pub fn with_precision(min: f64, max: f64, precision: f64) -> Self {
        debug_assert!(min < max && precision > 0.0);
        let bits = bits_for_span(((max - min) / precision) as u64);
        ValueRange { min, max, bits }
    }
}

impl<T: RangeValue + 'static> Ext<T> for ValueRange<T> {
    type Inner = ();

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut T, _f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut ()),
    {
        debug_assert!(self.min <= *v && *v <= self.max, "value outside its declared range");
        let raw = T::to_raw(*v, self.min, self.max, self.bits);
        ser.writer().write_bits(raw, self.bits);
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut T, _f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut ()),
    {
        let raw = de.reader().read_bits(self.bits);
        *v = T::from_raw(raw, self.min, self.max, self.bits);
        if de.reader().check_data_errors() && !(self.min <= *v && *v <= self.max) {
            de.reader().set_error(ReaderError::InvalidData);
            *v = self.min;
        }
    }
}
