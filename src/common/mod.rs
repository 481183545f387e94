//! Shared utilities used across the pipeline.
//!
//! Physical units (EMU), RGB color handling with contrast math for the
//! legibility checks, and XML text escaping for part serialization.

pub mod color;
pub mod unit;
pub mod xml;

pub use color::RGBColor;
