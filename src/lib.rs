//! Compact binary serialization with bit packing and pointer linking.
//!
//! This crate turns in-memory value graphs into dense, platform-independent
//! byte images and back. The format is not self-describing: a value's wire
//! layout is the `serialize` program its type defines once against the
//! `Flow` trait, and the reader must run the same program as the writer.
//! Only values travel; structure lives in code.
//!
//! What the engine provides on top of plain field traversal:
//!
//! - explicit endianness with per-value swapping (`config`),
//! - bit-level packing with transparent byte alignment (`bits`,
//!   `Flow::enable_bit_packing`),
//! - a 1/2/4-byte size codec for lengths and ids (`size`),
//! - pre-flight size measurement (`measure`, `measure_size`),
//! - forward/backward-compatible spans ("sessions", `ext::Growable`),
//! - value quantization, entropy and compact-int codecs (`ext`),
//! - reconstruction of pointer graphs with shared ownership, observers,
//!   and runtime polymorphism (`ptr`).
//!
//! Reading never fails eagerly: errors latch on the input adapter and the
//! caller inspects `(error, completed_successfully)` after the traversal.
//!
//! ```ignore
//! #[derive(Default, PartialEq, Debug)]
//! struct Monster {
//!     name: String,
//!     health: u32,
//! }
//!
//! impl Serialize for Monster {
//!     fn serialize<F: Flow>(&mut self, f: &mut F) {
//!         f.text(&mut self.name, 64);
//!         f.value(&mut self.health);
//!     }
//! }
//!
//! let mut orc = Monster { name: "orc".into(), health: 120 };
//! let bytes = bitwire::to_vec(&mut orc);
//! let (copy, err, done) = bitwire::from_slice::<Monster>(&bytes);
//! assert!(done && err == ReaderError::NoError && copy == orc);
//! ```

pub mod bits;
pub mod config;
pub mod context;
pub mod de;
pub mod endian;
pub mod ext;
pub mod flow;
pub mod measure;
pub mod mem;
pub mod ptr;
pub mod raw;
pub mod read;
pub mod ser;
pub mod size;
pub mod stream;
pub mod traits;
pub mod value;
pub mod write;

pub use config::{Config, DefaultConfig};
pub use context::Contexts;
pub use de::{from_slice, from_slice_with_contexts, Deserializer};
pub use endian::Endianness;
pub use flow::{Flow, Serialize};
pub use measure::MeasureWriter;
pub use read::{Reader, ReaderError, SliceReader};
pub use ser::{
    measure_size, measure_size_with_contexts, to_vec, to_vec_with_contexts, Serializer,
};
pub use stream::StreamWriter;
pub use write::{BufferWriter, Writer};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::Growable;

    // End-to-end: bit packing, a growable span, plain values, and the
    // measured size, all through the public surface.
    #[derive(Default, Debug, PartialEq)]
    struct SaveGame {
        version_tag: u8,
        paused: bool,
        camera: (f32, f32),
        checkpoints: Vec<u16>,
        note: String,
    }

    impl Serialize for SaveGame {
        fn serialize<F: Flow>(&mut self, f: &mut F) {
            f.value(&mut self.version_tag);
            let paused = &mut self.paused;
            f.enable_bit_packing(|p| p.bool_value(paused));
            f.ext_with(&mut self.camera, &Growable, |f, camera| {
                f.value(&mut camera.0);
                f.value(&mut camera.1);
            });
            f.container_value(&mut self.checkpoints, 1000);
            f.text(&mut self.note, 256);
        }
    }

    #[test]
    fn save_game_round_trips_and_measures_exactly() {
        let mut game = SaveGame {
            version_tag: 3,
            paused: true,
            camera: (1.25, -2.5),
            checkpoints: vec![10, 20, 30],
            note: "before the bridge".into(),
        };
        let bytes = to_vec(&mut game);
        assert_eq!(measure_size(&mut game), bytes.len());

        let (copy, err, done) = from_slice::<SaveGame>(&bytes);
        assert_eq!(err, ReaderError::NoError);
        assert!(done);
        assert_eq!(copy, game);
    }

    #[test]
    fn truncation_is_reported_not_panicked() {
        let mut game = SaveGame::default();
        game.note = "x".into();
        let bytes = to_vec(&mut game);
        for cut in 0..bytes.len() {
            let (_, _, done) = from_slice::<SaveGame>(&bytes[..cut]);
            assert!(!done, "truncated at {} still completed", cut);
        }
    }
}
