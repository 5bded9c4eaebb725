//! The bit-packing wrappers.
//!
//! `BitWriter` and `BitReader` sit on top of any adapter and buffer bits in
//! a scratch word twice the width of the adapter's byte unit. Fields are
//! packed LSB-first. While the scratch is empty, whole-byte operations pass
//! straight through to the wrapped adapter, so a program that never writes
//! bits pays nothing; once bits are pending, multi-byte operations are
//! routed through the bit-level path (and are therefore not subject to
//! endianness conversion; align first if that matters).
//!
//! Both wrappers align on drop: the writer pads the last byte with zeros,
//! the reader consumes the padding and, when data validation is on,
//! requires it to be zero.

use crate::read::{Reader, ReaderError};
use crate::write::Writer;

const UNIT_BITS: u32 = 8;

/// Bit-level writer over a wrapped adapter.
pub struct BitWriter<'w, W: Writer + ?Sized> {
    inner: &'w mut W,
    scratch: u16,
    scratch_bits: u32,
    /// Set when the wrapped adapter is itself bit-packing; every operation
    /// is forwarded untouched so nesting regions is harmless.
    passthrough: bool,
}

impl<'w, W: Writer + ?Sized> BitWriter<'w, W> {
    pub fn new(inner: &'w mut W) -> Self {
        let passthrough = inner.bit_packing();
        BitWriter {
            inner,
            scratch: 0,
            scratch_bits: 0,
            passthrough,
        }
    }

    fn write_bits_internal(&mut self, mut value: u64, count: u32) {
        let mut bits_left = count;
        while bits_left > 0 {
            let bits = bits_left.min(UNIT_BITS);
            self.scratch |= (value as u16) << self.scratch_bits;
            self.scratch_bits += bits;
            if self.scratch_bits >= UNIT_BITS {
                self.inner.write_u8((self.scratch & 0xFF) as u8);
                self.scratch >>= UNIT_BITS;
                self.scratch_bits -= UNIT_BITS;
                value >>= UNIT_BITS;
            }
            bits_left -= bits;
        }
    }
}

impl<'w, W: Writer + ?Sized> Writer for BitWriter<'w, W> {
    fn write_u8(&mut self, v: u8) {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.write_u8(v);
        } else {
            self.write_bits_internal(v as u64, 8);
        }
    }

    fn write_u16(&mut self, v: u16) {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.write_u16(v);
        } else {
            self.write_bits_internal(v as u64, 16);
        }
    }

    fn write_u32(&mut self, v: u32) {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.write_u32(v);
        } else {
            self.write_bits_internal(v as u64, 32);
        }
    }

    fn write_u64(&mut self, v: u64) {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.write_u64(v);
        } else {
            self.write_bits_internal(v, 64);
        }
    }

    fn write_raw(&mut self, buf: &[u8]) {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.write_raw(buf);
        } else {
            for &b in buf {
                self.write_bits_internal(b as u64, 8);
            }
        }
    }

    fn write_bits(&mut self, v: u64, count: u32) {
        if self.passthrough {
            self.inner.write_bits(v, count);
            return;
        }
        debug_assert!(0 < count && count <= 64);
        debug_assert!(count == 64 || v < 1u64 << count, "value does not fit in {} bits", count);
        self.write_bits_internal(v, count);
    }

    fn align(&mut self) {
        if self.passthrough {
            self.inner.align();
            return;
        }
        let pad = (UNIT_BITS - self.scratch_bits % UNIT_BITS) % UNIT_BITS;
        if pad > 0 {
            self.write_bits_internal(0, pad);
        }
    }

    fn bit_packing(&self) -> bool {
        true
    }

    fn swapping(&self) -> bool {
        self.inner.swapping()
    }

    fn current_write_pos(&self) -> usize {
        self.inner.current_write_pos()
    }

    fn set_write_pos(&mut self, pos: usize) {
        self.align();
        self.inner.set_write_pos(pos);
    }

    fn written_bytes(&self) -> usize {
        self.inner.written_bytes()
    }

    fn begin_session(&mut self) {
        self.align();
        self.inner.begin_session();
    }

    fn end_session(&mut self) {
        self.align();
        self.inner.end_session();
    }

    fn flush(&mut self) {
        self.align();
        self.inner.flush();
    }
}

impl<'w, W: Writer + ?Sized> Drop for BitWriter<'w, W> {
    fn drop(&mut self) {
        if !self.passthrough {
            self.align();
        }
    }
}

/// Bit-level reader over a wrapped adapter.
pub struct BitReader<'r, R: Reader + ?Sized> {
    inner: &'r mut R,
    scratch: u16,
    scratch_bits: u32,
    passthrough: bool,
}

impl<'r, R: Reader + ?Sized> BitReader<'r, R> {
    pub fn new(inner: &'r mut R) -> Self {
        let passthrough = inner.bit_packing();
        BitReader {
            inner,
            scratch: 0,
            scratch_bits: 0,
            passthrough,
        }
    }

    fn read_bits_internal(&mut self, count: u32) -> u64 {
        let mut result: u64 = 0;
        let mut bits_left = count;
        while bits_left > 0 {
            let bits = bits_left.min(UNIT_BITS);
            if self.scratch_bits < bits {
                let unit = self.inner.read_u8();
                self.scratch |= (unit as u16) << self.scratch_bits;
                self.scratch_bits += UNIT_BITS;
            }
            let chunk = (self.scratch & ((1u16 << bits) - 1)) as u64;
            result |= chunk << (count - bits_left);
            self.scratch >>= bits;
            self.scratch_bits -= bits;
            bits_left -= bits;
        }
        result
    }
}

impl<'r, R: Reader + ?Sized> Reader for BitReader<'r, R> {
    fn read_u8(&mut self) -> u8 {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.read_u8()
        } else {
            self.read_bits_internal(8) as u8
        }
    }

    fn read_u16(&mut self) -> u16 {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.read_u16()
        } else {
            self.read_bits_internal(16) as u16
        }
    }

    fn read_u32(&mut self) -> u32 {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.read_u32()
        } else {
            self.read_bits_internal(32) as u32
        }
    }

    fn read_u64(&mut self) -> u64 {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.read_u64()
        } else {
            self.read_bits_internal(64)
        }
    }

    fn read_raw(&mut self, out: &mut [u8]) {
        if self.passthrough || self.scratch_bits == 0 {
            self.inner.read_raw(out);
        } else {
            for b in out.iter_mut() {
                *b = self.read_bits_internal(8) as u8;
            }
        }
    }

    fn read_bits(&mut self, count: u32) -> u64 {
        if self.passthrough {
            return self.inner.read_bits(count);
        }
        debug_assert!(0 < count && count <= 64);
        self.read_bits_internal(count)
    }

    fn align(&mut self) {
        if self.passthrough {
            self.inner.align();
            return;
        }
        if self.scratch_bits > 0 {
            let padding = self.read_bits_internal(self.scratch_bits);
            if padding != 0 && self.inner.check_data_errors() {
                self.inner.set_error(ReaderError::InvalidData);
            }
        }
    }

    fn bit_packing(&self) -> bool {
        true
    }

    fn swapping(&self) -> bool {
        self.inner.swapping()
    }

    fn check_data_errors(&self) -> bool {
        self.inner.check_data_errors()
    }

    fn current_read_pos(&self) -> usize {
        self.inner.current_read_pos()
    }

    fn set_read_pos(&mut self, pos: usize) {
        self.align();
        self.inner.set_read_pos(pos);
    }

    fn current_read_end_pos(&self) -> usize {
        self.inner.current_read_end_pos()
    }

    fn set_read_end_pos(&mut self, pos: usize) {
        self.inner.set_read_end_pos(pos);
    }

    fn error(&self) -> ReaderError {
        self.inner.error()
    }

    fn set_error(&mut self, error: ReaderError) {
        self.inner.set_error(error);
    }

    fn is_completed_successfully(&self) -> bool {
        self.inner.is_completed_successfully()
    }

    fn begin_session(&mut self) {
        self.align();
        self.inner.begin_session();
    }

    fn end_session(&mut self) {
        self.align();
        self.inner.end_session();
    }
}

impl<'r, R: Reader + ?Sized> Drop for BitReader<'r, R> {
    fn drop(&mut self) {
        if !self.passthrough {
            self.align();
        }
    }
}
