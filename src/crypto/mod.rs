//! Cryptographic verification: signatures, typed keys and the response pipeline.

pub mod digest;
pub mod freshness;
pub mod keys;
pub mod pipeline;
pub mod signing;
pub mod verify;
