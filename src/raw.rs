//! Utilities for viewing slices of simple values as raw bytes.

use crate::value::Fundamental;

/// A marker trait for types whose values can be serialized by copying their
/// bytes, and reconstituted from any byte pattern of the right length.
///
/// Safety: implementors must be plain fixed-width numeric types with no
/// padding and no invalid bit patterns. `bool` and `char` do not qualify.
pub unsafe trait Pod: Fundamental {}

/// Given a reference, return a byte slice of the value's representation.
pub fn as_bytes<T: Pod>(r: &T) -> &[u8] {
    slice_as_bytes(std::slice::from_ref(r))
}

/// Given a slice, return a byte slice of its contents.
pub fn slice_as_bytes<T: Pod>(r: &[T]) -> &[u8] {
    // Safe because `T: Pod`.
    unsafe { std::slice::from_raw_parts(r.as_ptr() as *const u8, std::mem::size_of_val(r)) }
}

/// Given a mutable slice, return a mutable byte slice of its contents.
///
/// `Pod` guarantees that every bit pattern written through the bytes is a
/// valid `[T]` slice, so this does not need to be an unsafe function.
pub fn slice_as_bytes_mut<T: Pod>(r: &mut [T]) -> &mut [u8] {
    unsafe { std::slice::from_raw_parts_mut(r.as_mut_ptr() as *mut u8, std::mem::size_of_val(r)) }
}

macro_rules! implement_pod {
    ( $( $type:ty ),* ) => {
        $(
            unsafe impl Pod for $type { }
        )*
    }
}

implement_pod!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);
