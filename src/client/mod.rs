//! Transport layer: the seam to the remote authority and its HTTP implementation.

pub mod http;
pub mod transport;
