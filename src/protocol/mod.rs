//! Wire models for the licensing API.

pub mod models;
