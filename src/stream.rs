//! An output adapter that writes to any `io::Write` sink.
//!
//! `StreamWriter` is append-only: the cursor cannot be rewound, and sessions
//! are unavailable because the trailer needs a seekable store. An I/O
//! failure is remembered and reported through `io_error()` after the fact;
//! writers have no in-band error channel, so the traversal itself never
//! notices.

use std::io;
use std::io::Write as _;
use std::marker::PhantomData;

use crate::config::{Config, DefaultConfig};
use crate::endian;
use crate::write::Writer;

pub struct StreamWriter<S: io::Write, C: Config = DefaultConfig> {
    sink: io::BufWriter<S>,
    written: usize,
    io_error: Option<io::Error>,
    _config: PhantomData<C>,
}

impl<S: io::Write, C: Config> StreamWriter<S, C> {
    pub fn new(sink: S) -> Self {
        StreamWriter {
            sink: io::BufWriter::new(sink),
            written: 0,
            io_error: None,
            _config: PhantomData,
        }
    }

    /// The first I/O failure, if any. Writes after a failure are dropped.
    pub fn io_error(&self) -> Option<&io::Error> {
        self.io_error.as_ref()
    }

    pub fn into_inner(self) -> io::Result<S> {
        if let Some(e) = self.io_error {
            return Err(e);
        }
        self.sink.into_inner().map_err(|e| e.into_error())
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.io_error.is_some() {
            return;
        }
        match self.sink.write_all(bytes) {
            Ok(()) => self.written += bytes.len(),
            Err(e) => self.io_error = Some(e),
        }
    }

    fn swap(&self) -> bool {
        C::ENDIANNESS != endian::host()
    }
}

impl<S: io::Write, C: Config> Writer for StreamWriter<S, C> {
    fn write_u8(&mut self, v: u8) {
        self.push(&[v]);
    }

    fn write_u16(&mut self, v: u16) {
        let v = if self.swap() { endian::swap_u16(v) } else { v };
        self.push(&v.to_ne_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        let v = if self.swap() { endian::swap_u32(v) } else { v };
        self.push(&v.to_ne_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        let v = if self.swap() { endian::swap_u64(v) } else { v };
        self.push(&v.to_ne_bytes());
    }

    fn write_raw(&mut self, buf: &[u8]) {
        self.push(buf);
    }

    fn write_bits(&mut self, _v: u64, _count: u32) {
        panic!("bit packing is not enabled; wrap the region in enable_bit_packing");
    }

    fn align(&mut self) {}

    fn swapping(&self) -> bool {
        self.swap()
    }

    fn current_write_pos(&self) -> usize {
        self.written
    }

    fn set_write_pos(&mut self, pos: usize) {
        assert!(pos == self.written, "stream writers cannot seek");
    }

    fn written_bytes(&self) -> usize {
        self.written
    }

    fn begin_session(&mut self) {
        panic!("sessions need a random-access adapter, not a stream");
    }

    fn end_session(&mut self) {
        panic!("sessions need a random-access adapter, not a stream");
    }

    fn flush(&mut self) {
        if self.io_error.is_none() {
            if let Err(e) = self.sink.flush() {
                self.io_error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    #[test]
    fn bytes_reach_the_sink_in_wire_order() {
        let mut w: StreamWriter<Vec<u8>> = StreamWriter::new(Vec::new());
        w.write_u32(0x0403_0201);
        {
            let mut bw = BitWriter::new(&mut w);
            bw.write_bits(0b11, 2);
        }
        w.flush();
        assert_eq!(w.written_bytes(), 5);
        let sink = w.into_inner().unwrap();
        assert_eq!(sink, [0x01, 0x02, 0x03, 0x04, 0b0000_0011]);
    }

    #[test]
    #[should_panic(expected = "random-access")]
    fn sessions_are_rejected() {
        let mut w: StreamWriter<Vec<u8>> = StreamWriter::new(Vec::new());
        w.begin_session();
    }
}
