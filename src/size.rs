//! The variable-length size codec.
//!
//! Sizes are nonnegative and bounded by `2^30 - 1`. Small values pay one
//! byte, medium values two, large values four:
//!
//! * `0 .. 0x80`: one byte, the value itself.
//! * `0x80 .. 0x4000`: high byte `0x80 | (n >> 8)`, then the low byte.
//! * `0x4000 .. 0x4000_0000`: high byte `0xC0 | (n >> 24)`, then
//!   `(n >> 16) & 0xFF`, then the low 16 bits as a 2-byte value.
//!
//! The decoder always takes a caller-supplied maximum; a decoded size above
//! it latches `InvalidData` on the reader and yields 0 (when the reader's
//! configuration validates data at all).

use crate::read::{Reader, ReaderError};
use crate::write::Writer;

/// Greatest encodable size.
pub const MAX_SIZE: usize = 0x3FFF_FFFF;

pub fn write_size<W: Writer + ?Sized>(w: &mut W, size: usize) {
    if size < 0x80 {
        w.write_u8(size as u8);
    } else if size < 0x4000 {
        w.write_u8(((size >> 8) | 0x80) as u8);
        w.write_u8(size as u8);
    } else {
        assert!(size <= MAX_SIZE, "size too large for the size codec");
        w.write_u8(((size >> 24) | 0xC0) as u8);
        w.write_u8((size >> 16) as u8);
        w.write_u16(size as u16);
    }
}

pub fn read_size<R: Reader + ?Sized>(r: &mut R, max_size: usize) -> usize {
    let hb = r.read_u8();
    let size = if hb < 0x80 {
        hb as usize
    } else {
        let lb = r.read_u8();
        if hb & 0x40 != 0 {
            let lw = r.read_u16();
            (((((hb & 0x3F) as usize) << 8) | lb as usize) << 16) | lw as usize
        } else {
            (((hb & 0x7F) as usize) << 8) | lb as usize
        }
    };
    if r.check_data_errors() && size > max_size {
        r.set_error(ReaderError::InvalidData);
        return 0;
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::SliceReader;
    use crate::write::BufferWriter;

    fn encode(n: usize) -> Vec<u8> {
        let mut w: BufferWriter<Vec<u8>> = BufferWriter::new(Vec::new());
        write_size(&mut w, n);
        let len = w.written_bytes();
        let mut buf = w.into_inner();
        buf.truncate(len);
        buf
    }

    #[test]
    fn encoded_forms() {
        fn check(n: usize, bytes: &[u8]) {
            assert_eq!(encode(n), bytes, "encoding {}", n);
        }

        check(0, &[0x00]);
        check(0x7F, &[0x7F]);
        check(0x80, &[0x80, 0x80]);
        check(0x1234, &[0x92, 0x34]);
        check(0x3FFF, &[0xBF, 0xFF]);
        check(0x4000, &[0xC0, 0x00, 0x00, 0x40]);
        check(0x1234_5678, &[0xD2, 0x34, 0x78, 0x56]);
        check(MAX_SIZE, &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn decode_round_trips() {
        for &n in &[0, 1, 0x7F, 0x80, 0x100, 0x3FFF, 0x4000, 0x12_3456, MAX_SIZE] {
            let bytes = encode(n);
            assert_eq!(bytes.len(), if n < 0x80 { 1 } else if n < 0x4000 { 2 } else { 4 });
            let mut r: SliceReader = SliceReader::new(&bytes);
            assert_eq!(read_size(&mut r, MAX_SIZE), n);
            assert_eq!(r.error(), ReaderError::NoError);
        }
    }

    #[test]
    fn decode_above_max_is_invalid_data() {
        let bytes = encode(1000);
        let mut r: SliceReader = SliceReader::new(&bytes);
        assert_eq!(read_size(&mut r, 999), 0);
        assert_eq!(r.error(), ReaderError::InvalidData);
    }
}
