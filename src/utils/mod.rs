//! Shared utilities

pub mod preprocessing;

pub use preprocessing::{ContentRect, ImagePreprocessor, PreprocessedInput};
