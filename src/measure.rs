//! The measure-size adapter: a writer that stores nothing.
//!
//! `MeasureWriter` counts bytes instead of copying them, including the
//! session trailer a real writer would append at flush, so the final
//! `written_bytes` is exactly the wire size the same program produces
//! through a `BufferWriter`. Useful for pre-sizing buffers.
//!
//! Bit-level writes go through the same `BitWriter` wrapper a real writer
//! uses; the wrapper drains whole bytes into this adapter and pads on
//! alignment, so bit regions are measured byte-exactly.

use crate::size;
use crate::write::Writer;

#[derive(Default)]
pub struct MeasureWriter {
    written: usize,
    largest: usize,
    session_table_bytes: usize,
}

impl MeasureWriter {
    pub fn new() -> Self {
        MeasureWriter::default()
    }
}

impl Writer for MeasureWriter {
    fn write_u8(&mut self, _v: u8) {
        self.written += 1;
    }

    fn write_u16(&mut self, _v: u16) {
        self.written += 2;
    }

    fn write_u32(&mut self, _v: u32) {
        self.written += 4;
    }

    fn write_u64(&mut self, _v: u64) {
        self.written += 8;
    }

    fn write_raw(&mut self, buf: &[u8]) {
        self.written += buf.len();
    }

    fn write_bits(&mut self, _v: u64, _count: u32) {
        panic!("bit packing is not enabled; wrap the region in enable_bit_packing");
    }

    fn align(&mut self) {}

    fn swapping(&self) -> bool {
        false
    }

    fn current_write_pos(&self) -> usize {
        self.written
    }

    fn set_write_pos(&mut self, pos: usize) {
        if self.written > pos {
            self.largest = self.largest.max(self.written);
        }
        self.written = pos;
    }

    fn written_bytes(&self) -> usize {
        self.written.max(self.largest)
    }

    fn begin_session(&mut self) {}

    fn end_session(&mut self) {
        // Measure the endpoint's encoding against ourselves, then move its
        // cost to the trailer accumulator.
        let endpoint = self.written_bytes();
        size::write_size(self, endpoint);
        let endpoint_bytes = self.written_bytes() - endpoint;
        self.written -= endpoint_bytes;
        self.session_table_bytes += endpoint_bytes;
    }

    fn flush(&mut self) {
        if self.session_table_bytes > 0 {
            self.written += self.session_table_bytes + 4;
            self.session_table_bytes = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;
    use crate::write::{BufferWriter, Writer};

    fn drive<W: Writer>(w: &mut W) {
        w.write_u32(42);
        w.begin_session();
        w.write_u16(7);
        w.write_u16(9);
        w.end_session();
        {
            let mut bw = BitWriter::new(w);
            bw.write_bits(0b101, 3);
            bw.write_bits(0x3FF, 10);
        }
        w.write_u8(1);
        w.flush();
    }

    #[test]
    fn measured_size_matches_real_output() {
        let mut real: BufferWriter<Vec<u8>> = BufferWriter::new(Vec::new());
        drive(&mut real);

        let mut measured = MeasureWriter::new();
        drive(&mut measured);

        assert_eq!(measured.written_bytes(), real.written_bytes());
    }

    #[test]
    fn bit_regions_cost_whole_bytes() {
        let mut m = MeasureWriter::new();
        {
            let mut bw = BitWriter::new(&mut m);
            bw.write_bits(1, 1);
        }
        m.flush();
        assert_eq!(m.written_bytes(), 1);
    }

    #[test]
    fn rewind_keeps_the_largest_position() {
        let mut m = MeasureWriter::new();
        m.write_u64(0);
        m.set_write_pos(2);
        m.write_u8(0);
        m.flush();
        assert_eq!(m.written_bytes(), 8);
    }
}
