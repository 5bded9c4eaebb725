#![no_main]
use libfuzzer_sys::fuzz_target;

use bitwire::read::{Reader, SliceReader};
use bitwire::size;
use bitwire::write::{BufferWriter, Writer};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[..4]);
    let n = (u32::from_le_bytes(raw) as usize) % (size::MAX_SIZE + 1);

    let mut w: BufferWriter<Vec<u8>> = BufferWriter::new(Vec::new());
    size::write_size(&mut w, n);
    let len = w.written_bytes();
    let buf = w.into_inner();

    let expected_len = if n < 0x80 {
        1
    } else if n < 0x4000 {
        2
    } else {
        4
    };
    assert_eq!(len, expected_len);

    let mut r: SliceReader = SliceReader::new(&buf[..len]);
    assert_eq!(size::read_size(&mut r, size::MAX_SIZE), n);
    assert!(r.is_completed_successfully());
});
