//! The optional extension: a presence flag and, maybe, a payload.
//!
//! The flag goes through `bool_value`, so it costs one bit inside a
//! bit-packing region and one byte outside of one. By default the payload
//! is aligned, which only matters inside a region.

use crate::de::Deserializer;
use crate::ext::Ext;
use crate::flow::Flow;
use crate::read::Reader;
use crate::ser::Serializer;
use crate::write::Writer;

pub struct Optional {
    align_before_data: bool,
}

impl Optional {
    pub fn new() -> Self {
        Optional::with_alignment(true)
    }

    pub fn with_alignment(align_before_data: bool) -> Self {
        Optional { align_before_data }
    }
}

impl Default for Optional {
    fn default() -> Self {
        Optional::new()
    }
}

impl<T: Default> Ext<Option<T>> for Optional {
    type Inner = T;

    fn serialize<'a, F>(&self, ser: &mut Serializer<'a>, v: &mut Option<T>, mut f: F)
    where
        F: FnMut(&mut Serializer<'a>, &mut T),
    {
        let mut present = v.is_some();
        ser.bool_value(&mut present);
        if self.align_before_data {
            ser.writer().align();
        }
        if let Some(inner) = v {
            f(ser, inner);
        }
    }

    fn deserialize<'a, F>(&self, de: &mut Deserializer<'a>, v: &mut Option<T>, mut f: F)
    where
        F: FnMut(&mut Deserializer<'a>, &mut T),
    {
        let mut present = false;
        de.bool_value(&mut present);
        if self.align_before_data {
            de.reader().align();
        }
        if present {
            if v.is_none() {
                *v = Some(T::default());
            }
            f(de, v.as_mut().expect("just populated"));
        } else {
            *v = None;
        }
    }
}
