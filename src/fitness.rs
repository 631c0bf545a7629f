// Fitness compares a composited canvas against the target image. The raw
// measure is the total per-pixel absolute difference over all RGB channels;
// fitness negates it so that higher is better and a descending sort ranks
// best-first.
//
// Evaluation is a pure function of (canvas, target): the same pair always
// produces the same score.

use image::RgbImage;
use rayon::prelude::*;

/// Total absolute per-channel difference between canvas and target.
///
/// `0` means pixel-for-pixel identical; the maximum is
/// `255 * width * height * 3`.
///
/// # Panics
///
/// Panics on a dimension mismatch. The engine validates dimensions once at
/// configuration time, so reaching the assert is a programming error; the
/// evaluator never silently resizes.
pub fn canvas_difference(canvas: &RgbImage, target: &RgbImage) -> u64 {
    assert_eq!(
        canvas.dimensions(),
        target.dimensions(),
        "canvas and target must have the same dimensions"
    );

    // RGB buffers carry exactly 3 bytes per pixel, so a flat byte walk is
    // the per-channel difference
    canvas
        .as_raw()
        .iter()
        .zip(target.as_raw().iter())
        .map(|(&c, &t)| u64::from((i32::from(c) - i32::from(t)).unsigned_abs()))
        .sum()
}

/// Parallel version of [`canvas_difference`].
///
/// Worth it for large canvases scored one at a time; when many canvases are
/// scored concurrently (population evaluation) the sequential version avoids
/// nesting parallelism.
pub fn canvas_difference_parallel(canvas: &RgbImage, target: &RgbImage) -> u64 {
    assert_eq!(
        canvas.dimensions(),
        target.dimensions(),
        "canvas and target must have the same dimensions"
    );

    canvas
        .as_raw()
        .par_iter()
        .zip(target.as_raw().par_iter())
        .map(|(&c, &t)| u64::from((i32::from(c) - i32::from(t)).unsigned_abs()))
        .sum()
}

/// Fitness of a canvas against the target: the negated total difference,
/// so higher is better.
pub fn canvas_fitness(canvas: &RgbImage, target: &RgbImage) -> f64 {
    -(canvas_difference(canvas, target) as f64)
}

/// Normalized similarity in `[0, 100]`, for reporting only.
///
/// `100` exactly when the canvas matches the target pixel-for-pixel; `0`
/// when every channel differs by the maximum at every pixel.
pub fn similarity_percent(difference: u64, width: u32, height: u32) -> f64 {
    let max_difference = 255u64 * u64::from(width) * u64::from(height) * 3;
    assert!(max_difference > 0, "image must have nonzero area");
    100.0 * (1.0 - difference as f64 / max_difference as f64)
}
