#![no_main]
use libfuzzer_sys::fuzz_target;

use bitwire::ext::CompactValue;
use bitwire::flow::{Flow, Serialize};
use bitwire::read::ReaderError;
use std::convert::TryInto;

#[derive(Default)]
struct Mixed {
    a: i64,
    b: u32,
    c: i16,
}

impl Serialize for Mixed {
    fn serialize<F: Flow>(&mut self, f: &mut F) {
        f.ext(&mut self.a, &CompactValue::new());
        f.ext(&mut self.b, &CompactValue::new());
        f.ext(&mut self.c, &CompactValue::checked());
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 14 {
        return;
    }
    let mut v = Mixed::default();
    v.a = i64::from_le_bytes(data[0..8].try_into().unwrap());
    v.b = u32::from_le_bytes(data[8..12].try_into().unwrap());
    v.c = i16::from_le_bytes(data[12..14].try_into().unwrap());

    let bytes = bitwire::to_vec(&mut v);
    let (out, err, done) = bitwire::from_slice::<Mixed>(&bytes);
    assert_eq!(err, ReaderError::NoError);
    assert!(done);
    assert_eq!((out.a, out.b, out.c), (v.a, v.b, v.c));
});
