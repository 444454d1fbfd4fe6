//! Sample conversion utilities.
//!
//! The relay carries i16 end-to-end, but devices may only offer f32 streams
//! and the filter accumulates in f64. These helpers cover both boundaries.

mod convert;

pub use convert::{f32_to_i16, i16_to_f32, round_clamp_i16};
