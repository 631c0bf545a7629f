// The compositor paints individuals onto an RGB canvas with a painter's
// algorithm: list order is draw order, later entries paint over earlier
// ones, and there is no depth sorting.
//
// Each draw is resize -> rotate -> alpha-blend -> clip. Resampling is
// bilinear for both the resize and the rotation and must stay that way for
// a whole run: fitness scores are only comparable when every canvas was
// rendered with the same resampling.

use image::imageops::{self, FilterType};
use image::{RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::individual::Individual;
use crate::sprite::{Sprite, SpriteSet};

/// Paint every individual onto the canvas in draw order.
pub fn composite(canvas: &mut RgbImage, individuals: &[Individual], sprites: &SpriteSet) {
    for individual in individuals {
        draw_individual(canvas, individual, sprites);
    }
}

/// Paint a single individual onto the canvas.
///
/// A placement whose transformed bounding box misses the canvas entirely is
/// a silent no-op; the individual still exists and still participates in
/// selection via the unchanged canvas.
pub fn draw_individual(canvas: &mut RgbImage, individual: &Individual, sprites: &SpriteSet) {
    let transformed = transform_sprite(
        sprites.get(individual.sprite),
        individual.scale,
        individual.rotation,
    );
    blend_at(canvas, &transformed, individual.x, individual.y, individual.tint);
}

/// Scale and rotate a sprite bitmap.
///
/// The rotation output is padded to the scaled bitmap's diagonal before
/// rotating, so no corner of the rotated sprite is ever pre-cropped; the
/// padding is fully transparent and contributes nothing when blended.
/// Positive degrees rotate counter-clockwise.
pub(crate) fn transform_sprite(sprite: &Sprite, scale: f32, rotation: f32) -> RgbaImage {
    let (w, h) = sprite.dimensions();

    let scaled = if scale == 1.0 {
        sprite.pixels().clone()
    } else {
        let scaled_w = ((w as f32 * scale).round() as u32).max(1);
        let scaled_h = ((h as f32 * scale).round() as u32).max(1);
        imageops::resize(sprite.pixels(), scaled_w, scaled_h, FilterType::Triangle)
    };

    if rotation == 0.0 {
        return scaled;
    }

    let (sw, sh) = scaled.dimensions();
    let side = ((sw as f32).hypot(sh as f32).ceil() as u32).max(1);
    let mut padded = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
    imageops::replace(
        &mut padded,
        &scaled,
        i64::from((side - sw) / 2),
        i64::from((side - sh) / 2),
    );

    // imageproc rotates clockwise for positive theta; negate to keep the
    // counter-clockwise convention
    rotate_about_center(
        &padded,
        -rotation.to_radians(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    )
}

/// Alpha-blend a transformed sprite onto the canvas, anchored so that
/// `(center_x, center_y)` is the sprite's center.
///
/// Per channel: `canvas' = (1 - a) * canvas + a * sprite * tint / 255`,
/// where `a` is the sprite pixel's alpha normalized to `[0, 1]`. Only the
/// on-canvas intersection is written; the rest is clipped silently.
pub(crate) fn blend_at(
    canvas: &mut RgbImage,
    sprite: &RgbaImage,
    center_x: i32,
    center_y: i32,
    tint: [u8; 3],
) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = sprite.dimensions();

    let left = center_x - sw as i32 / 2;
    let top = center_y - sh as i32 / 2;

    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = (left + sw as i32).min(cw as i32);
    let y1 = (top + sh as i32).min(ch as i32);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for y in y0..y1 {
        for x in x0..x1 {
            let sp = sprite.get_pixel((x - left) as u32, (y - top) as u32);
            if sp[3] == 0 {
                continue;
            }
            let alpha = f32::from(sp[3]) / 255.0;
            let inv_alpha = 1.0 - alpha;
            let dst = canvas.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let tinted = f32::from(sp[c]) * (f32::from(tint[c]) / 255.0);
                dst[c] = (inv_alpha * f32::from(dst[c]) + alpha * tinted).round() as u8;
            }
        }
    }
}
