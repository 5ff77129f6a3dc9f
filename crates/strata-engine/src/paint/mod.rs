//! Color values shared by batches and the frame runtime.

pub mod color;

pub use color::Color;
