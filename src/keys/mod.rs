//! Signed license keys.

pub mod decoder;

pub use decoder::{decode, detect_scheme, Dataset};
