//! Data contracts shared by the try-on gateway, core and front ends.

pub mod domain;
pub mod error;
pub mod protocol;
pub mod wardrobe;
