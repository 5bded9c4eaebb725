//! Byte-order utilities.
//!
//! The wire format fixes an endianness up front (little, unless the
//! configuration says otherwise), and every fundamental value written on the
//! byte-aligned path is swapped when the host disagrees. Floating point
//! values are reinterpreted as unsigned integers of the same width before
//! swapping, so the swap never goes through a float register.
//!
//! The bit-packing path is not affected by any of this: packed fields are
//! emitted LSB-first regardless of configuration. See the `bits` module.

/// Byte order of the wire or of the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// The byte order this build runs on.
pub const fn host() -> Endianness {
    if cfg!(target_endian = "little") {
        Endianness::Little
    } else {
        Endianness::Big
    }
}

pub fn swap_u16(v: u16) -> u16 {
    v.swap_bytes()
}

pub fn swap_u32(v: u32) -> u32 {
    v.swap_bytes()
}

pub fn swap_u64(v: u64) -> u64 {
    v.swap_bytes()
}

pub fn swap_f32(v: f32) -> f32 {
    f32::from_bits(v.to_bits().swap_bytes())
}

pub fn swap_f64(v: f64) -> f64 {
    f64::from_bits(v.to_bits().swap_bytes())
}

#[test]
fn swaps_reverse_byte_order() {
    assert_eq!(swap_u16(0x0102), 0x0201);
    assert_eq!(swap_u32(0x0102_0304), 0x0403_0201);
    assert_eq!(swap_u64(0x0102_0304_0506_0708), 0x0807_0605_0403_0201);
    assert_eq!(swap_u16(swap_u16(0xBEEF)), 0xBEEF);
}

#[test]
fn float_swap_round_trips_bit_patterns() {
    let v = 123.456_f32;
    assert_eq!(swap_f32(swap_f32(v)).to_bits(), v.to_bits());
    let v = -0.25_f64;
    assert_eq!(swap_f64(swap_f64(v)).to_bits(), v.to_bits());
}
