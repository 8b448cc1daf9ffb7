//! Domain types for FeatureLab.

pub mod bar;

pub use bar::{Bar, BarField};
