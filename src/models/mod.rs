//! Core data models for the image store.

mod category;
mod image;

pub use category::*;
pub use image::*;
