//! Shared helpers for integration tests

#![allow(dead_code)]

use bgcompose::{CompositeError, PixelFormat, RasterImage, Result, Segmenter};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Segmenter that gives every pixel the same alpha and records its inputs
#[derive(Clone, Default)]
pub struct ConstantAlphaSegmenter {
    pub alpha: u8,
    pub seen: Arc<Mutex<Vec<RasterImage>>>,
}

impl ConstantAlphaSegmenter {
    pub fn new(alpha: u8) -> Self {
        Self {
            alpha,
            seen: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Segmenter for ConstantAlphaSegmenter {
    fn segment(&mut self, image: &RasterImage) -> Result<RasterImage> {
        self.seen.lock().unwrap().push(image.clone());
        let mut rgba = image.to_rgba_image()?;
        for px in rgba.pixels_mut() {
            px[3] = self.alpha;
        }
        Ok(RasterImage::from_rgba(rgba))
    }
}

/// Segmenter that always fails
pub struct BrokenSegmenter;

impl Segmenter for BrokenSegmenter {
    fn segment(&mut self, _image: &RasterImage) -> Result<RasterImage> {
        Err(CompositeError::segmentation("model produced no output"))
    }
}

pub fn write_rgb(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(&path)
        .unwrap();
    path
}

pub fn write_rgba(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save(&path)
        .unwrap();
    path
}

pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RasterImage {
    RasterImage::filled(width, height, PixelFormat::Rgba, color)
}

pub fn assert_close(actual: [u8; 4], expected: [f64; 4], tolerance: u8) {
    for (channel, (got, want)) in actual.iter().zip(expected).enumerate() {
        let want = want.round().clamp(0.0, 255.0) as u8;
        assert!(
            got.abs_diff(want) <= tolerance,
            "channel {channel}: got {got}, expected {want} (pixel {actual:?})"
        );
    }
}

/// Route library `log` output through the test harness (`RUST_LOG=debug` to see it)
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}
