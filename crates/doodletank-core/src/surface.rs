//! RGBA pixel surfaces produced by the drawing canvas

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use tracing::trace;

use crate::error::{Error, Result};

/// Alpha at or below this value counts as transparent background
const CONTENT_ALPHA_CUTOFF: u8 = 16;

/// Channels above this value count as white background
const CONTENT_WHITE_CUTOFF: u8 = 240;

/// Default gallery thumbnail size
pub const THUMBNAIL_WIDTH: u32 = 80;
pub const THUMBNAIL_HEIGHT: u32 = 48;

/// A rectangular RGBA pixel buffer, row-major, 8 bits per channel.
///
/// Snapshot of the drawing surface; the classifier only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSurface {
    image: RgbaImage,
}

/// Bounding box of drawn content, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageSurface {
    /// Build a surface from raw RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::image(format!(
                "surface must be at least 1x1, got {width}x{height}"
            )));
        }

        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(Error::image(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                rgba.len()
            )));
        }

        RgbaImage::from_raw(width, height, rgba)
            .map(|image| Self { image })
            .ok_or_else(|| Error::image("pixel buffer does not match dimensions"))
    }

    /// A fully transparent surface, like a freshly cleared canvas.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// A surface with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::image(format!(
                "surface must be at least 1x1, got {width}x{height}"
            )));
        }
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, Rgba(rgba)),
        })
    }

    /// Decode PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Self::from_decoded(image)
    }

    /// Read an image file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| Error::image(format!("failed to open {}: {e}", path.display())))?;
        Self::from_decoded(image)
    }

    fn from_decoded(image: DynamicImage) -> Result<Self> {
        trace!(
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "decoded image"
        );
        Self::try_from(image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA value at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Set the RGBA value at `(x, y)`
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        self.image.put_pixel(x, y, Rgba(rgba));
    }

    /// Raw RGBA bytes, row-major
    pub fn as_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Borrow as an `image` buffer
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Bounding box of drawn pixels.
    ///
    /// A pixel counts as content when it is not transparent (alpha above 16)
    /// and not near-white (some channel at or below 240). Returns `None` for
    /// an empty canvas.
    pub fn content_bounds(&self) -> Option<ContentBounds> {
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut found = false;

        for (x, y, pixel) in self.image.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let near_white =
                r > CONTENT_WHITE_CUTOFF && g > CONTENT_WHITE_CUTOFF && b > CONTENT_WHITE_CUTOFF;
            if a > CONTENT_ALPHA_CUTOFF && !near_white {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
                found = true;
            }
        }

        found.then(|| ContentBounds {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    /// Copy of the surface cropped to its content, or an unchanged copy when
    /// nothing has been drawn.
    pub fn crop_to_content(&self) -> Self {
        match self.content_bounds() {
            Some(b) => Self {
                image: imageops::crop_imm(&self.image, b.x, b.y, b.width, b.height).to_image(),
            },
            None => self.clone(),
        }
    }

    /// Gallery thumbnail: crop to content, scale to fit `width` x `height`
    /// keeping the aspect ratio, and center on a transparent background.
    pub fn thumbnail(&self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::image(format!(
                "thumbnail must be at least 1x1, got {width}x{height}"
            )));
        }

        let cropped = self.crop_to_content();
        let (cw, ch) = (cropped.width() as f64, cropped.height() as f64);

        let scale = (width as f64 / cw).min(height as f64 / ch);
        let draw_w = ((cw * scale).round() as u32).clamp(1, width);
        let draw_h = ((ch * scale).round() as u32).clamp(1, height);

        let scaled = imageops::resize(&cropped.image, draw_w, draw_h, FilterType::Triangle);

        let mut out = Self::blank(width, height)?;
        let dx = (width - draw_w) / 2;
        let dy = (height - draw_h) / 2;
        imageops::overlay(&mut out.image, &scaled, dx as i64, dy as i64);
        Ok(out)
    }

    /// Encode as PNG, the format uploaded to the gallery.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

impl TryFrom<RgbaImage> for ImageSurface {
    type Error = Error;

    fn try_from(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::image(format!(
                "surface must be at least 1x1, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }
}

impl TryFrom<DynamicImage> for ImageSurface {
    type Error = Error;

    fn try_from(image: DynamicImage) -> Result<Self> {
        Self::try_from(image.into_rgba8())
    }
}
