//! Primitive wire I/O: big-endian integers come from `byteorder`, strings are
//! modified UTF-8 (CESU-8 with the `C0 80` overlong for U+0000), and tight
//! encoding packs its presence bits into a [`BooleanStream`].

mod boolean_stream;
mod data;

pub(crate) use boolean_stream::BooleanStream;
pub(crate) use data::{
    modified_utf8_length, parse_bytes, read_big_utf8, read_utf8, write_big_utf8, write_utf8,
};
