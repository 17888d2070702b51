//! The default box grid and its ordering contract.

mod generator;
mod layout;

pub use generator::*;
pub use layout::*;
