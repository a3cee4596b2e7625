//! Core traits, types, and constants shared by all layers.

pub mod constants;
mod error;
mod traits;

pub use error::*;
pub use traits::*;
