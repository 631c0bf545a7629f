// Sprites are the decal bitmaps placed by the algorithm. They are loaded
// once, normalized to RGBA, and never mutated afterwards.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::{CollageError, CollageResult};

/// Whether a sprite carries real per-pixel transparency.
///
/// Resolved once when the sprite is constructed, instead of inspecting the
/// channel count on every draw call. An `Opaque` sprite still participates in
/// alpha blending after rotation, because the padding introduced around the
/// rotated bitmap is transparent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaMode {
    /// Every source pixel is fully opaque (loaded from an RGB image).
    Opaque,
    /// The source image carried its own alpha channel.
    WithAlpha,
}

/// An immutable decal bitmap available for placement.
///
/// Pixels are stored as RGBA regardless of the source format so the
/// compositor has a single blend path; `Opaque` sprites get a constant
/// alpha of 255 at construction.
#[derive(Clone, Debug)]
pub struct Sprite {
    pixels: RgbaImage,
    alpha_mode: AlphaMode,
}

impl Sprite {
    /// Build a sprite from an RGB image (no transparency).
    pub fn opaque(pixels: RgbImage) -> Self {
        Self {
            pixels: DynamicImage::ImageRgb8(pixels).to_rgba8(),
            alpha_mode: AlphaMode::Opaque,
        }
    }

    /// Build a sprite from an RGBA image, keeping its alpha channel.
    pub fn with_alpha(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            alpha_mode: AlphaMode::WithAlpha,
        }
    }

    /// Build a sprite from a decoded image, resolving the alpha mode from
    /// the source color type.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        if image.color().has_alpha() {
            Self::with_alpha(image.to_rgba8())
        } else {
            Self::opaque(image.to_rgb8())
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Downscale so the sprite fits within `max_width` x `max_height`,
    /// preserving aspect ratio. Sprites that already fit are returned as-is.
    fn fitted(self, max_width: u32, max_height: u32) -> Self {
        let (w, h) = self.pixels.dimensions();
        if w <= max_width && h <= max_height {
            return self;
        }
        let factor = (max_width as f32 / w as f32).min(max_height as f32 / h as f32);
        let new_w = ((w as f32 * factor).round() as u32).max(1);
        let new_h = ((h as f32 * factor).round() as u32).max(1);
        Self {
            pixels: imageops::resize(&self.pixels, new_w, new_h, FilterType::Triangle),
            alpha_mode: self.alpha_mode,
        }
    }
}

/// A non-empty, ordered, immutable collection of sprites.
///
/// Individuals reference sprites by index into this set, so the set must
/// outlive the population that uses it (it is owned by the engine for the
/// whole run).
#[derive(Clone, Debug)]
pub struct SpriteSet {
    sprites: Vec<Sprite>,
}

impl SpriteSet {
    /// Create a sprite set. An empty collection is a configuration error.
    pub fn new(sprites: Vec<Sprite>) -> CollageResult<Self> {
        if sprites.is_empty() {
            return Err(CollageError::EmptySpriteSet);
        }
        Ok(Self { sprites })
    }

    /// Downscale any sprite larger than the canvas so it fits within the
    /// canvas bounds. Scaling during compositing can still grow a sprite
    /// past the canvas; that is handled by clipping at draw time.
    pub fn fit_to_canvas(self, canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            sprites: self
                .sprites
                .into_iter()
                .map(|s| s.fitted(canvas_width, canvas_height))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        // Construction guarantees non-empty, kept for API completeness.
        self.sprites.is_empty()
    }

    /// Look up a sprite by index. Indices come from sampling `0..len()`,
    /// so an out-of-range index is a programming error.
    pub fn get(&self, index: usize) -> &Sprite {
        &self.sprites[index]
    }
}
