//! Image file input/output
//!
//! Keeps filesystem and codec concerns out of the session logic.

use crate::{
    error::{CompositeError, Result},
    types::RasterImage,
};
use image::ImageFormat;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image file into a [`RasterImage`]
    ///
    /// The format is taken from the file extension first; if that fails the
    /// content is sniffed. Images with an alpha channel load as RGBA, all others
    /// as RGB.
    ///
    /// ```rust,no_run
    /// use bgcompose::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - `CompositeError::Io` if the file is missing or unreadable
    /// - `CompositeError::Format` if neither decoding attempt succeeds
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RasterImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(CompositeError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        let decoded = match image::open(path_ref) {
            Ok(img) => img,
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    CompositeError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    let extension = path_ref
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");
                    CompositeError::format(format!(
                        "cannot decode {} ({} bytes, extension {}): {}; by content: {}",
                        path_ref.display(),
                        data.len(),
                        extension,
                        e,
                        content_err
                    ))
                })?
            },
        };

        let image = RasterImage::from_dynamic(&decoded);
        log::debug!(
            "Loaded {} ({}x{} {})",
            path_ref.display(),
            image.width(),
            image.height(),
            image.format()
        );
        Ok(image)
    }

    /// Write `image` as a 3-channel PNG, discarding any alpha
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    /// - `CompositeError::Io` if the directory or file cannot be written
    /// - `CompositeError::Image` if PNG encoding fails
    pub fn save_png<P: AsRef<Path>>(image: &RasterImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CompositeError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let rgb = image.to_rgb_image()?;
        rgb.save_with_format(path_ref, ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => {
                    CompositeError::file_io_error("write PNG", path_ref, &io)
                },
                other => CompositeError::Image(other),
            })?;

        log::debug!(
            "Saved {}x{} PNG to {}",
            image.width(),
            image.height(),
            path_ref.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_load_missing_file() {
        let err = ImageIOService::load_image("/nonexistent/photo.png").unwrap_err();
        assert!(matches!(err, CompositeError::Io(_)));
        assert!(err.to_string().contains("photo.png"));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(matches!(
            ImageIOService::load_image(&path),
            Err(CompositeError::Format(_))
        ));
    }

    #[test]
    fn test_load_with_wrong_extension_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 128]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let image = ImageIOService::load_image(&path).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.format(), PixelFormat::Rgba);
        assert_eq!(image.pixel(1, 1), Some([10, 20, 30, 128]));
    }

    #[test]
    fn test_save_png_drops_alpha_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.png");
        let image = RasterImage::filled(4, 3, PixelFormat::Rgba, [200, 100, 50, 7]);

        ImageIOService::save_png(&image, &path).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.color(), image::ColorType::Rgb8);
        assert_eq!(reloaded.to_rgb8().get_pixel(2, 1).0, [200, 100, 50]);
    }
}
