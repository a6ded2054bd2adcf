//! Domain types for the settings store.
//!
//! Pure data and rules with no file system or logging sinks attached.  The
//! store crate builds its state machine on top of these types; the codec
//! converts them to and from the on-disk representation.
//!
//! - [`scope`] – the Device/User namespaces and the bitset used by combined
//!   operations.
//! - [`value`] – the tagged union stored per key and the typed accessor trait.
//! - [`definition`] – setting descriptors and the registry the store reads.

pub mod definition;
pub mod scope;
pub mod value;
