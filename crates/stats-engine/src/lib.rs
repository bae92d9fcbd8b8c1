//! Motion Statistics Engine
//!
//! Reduces triaxial samples into pooled summary statistics.

mod sample;
mod statistics;

pub use sample::Sample;
pub use statistics::{aggregate, Summary};
