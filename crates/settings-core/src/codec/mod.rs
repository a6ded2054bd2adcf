//! Settings-file codec.

pub mod json;

pub use json::{decode_settings, encode_settings, parse_scalar, resolve_value, CodecError};
