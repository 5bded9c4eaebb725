#![no_main]
use libfuzzer_sys::fuzz_target;

use bitwire::bits::{BitReader, BitWriter};
use bitwire::read::{Reader, SliceReader};
use bitwire::write::{BufferWriter, Writer};

// Interpret the input as a list of (bit count, value) writes, then read the
// same schedule back and require every field to survive.
fuzz_target!(|data: &[u8]| {
    let mut fields = Vec::new();
    for chunk in data.chunks(9) {
        if chunk.len() < 9 {
            break;
        }
        let count = u32::from(chunk[0] % 64) + 1;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&chunk[1..9]);
        let value = u64::from_le_bytes(raw) & if count == 64 { u64::MAX } else { (1 << count) - 1 };
        fields.push((count, value));
    }

    let mut w: BufferWriter<Vec<u8>> = BufferWriter::new(Vec::new());
    {
        let mut bw = BitWriter::new(&mut w);
        for &(count, value) in &fields {
            bw.write_bits(value, count);
        }
    }
    let len = w.written_bytes();
    let buf = w.into_inner();

    let total_bits: u64 = fields.iter().map(|&(count, _)| u64::from(count)).sum();
    assert_eq!(len as u64, (total_bits + 7) / 8);

    let mut r: SliceReader = SliceReader::new(&buf[..len]);
    {
        let mut br = BitReader::new(&mut r);
        for &(count, value) in &fields {
            assert_eq!(br.read_bits(count), value);
        }
    }
    assert!(r.is_completed_successfully());
});
