// An individual is one placed sprite instance. It is a plain value:
// generation and mutation return new values instead of mutating in place,
// so a parent carried forward as an elite is never aliased by its children
// and members can be evaluated in parallel without shared state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::sprite::SpriteSet;

/// Smallest allowed scale factor; prevents degenerate zero-area sprites.
pub const MIN_SCALE: f32 = 0.1;

// Mutation deltas, per attribute.
const POSITION_DELTA: i32 = 10;
const ROTATION_DELTA: f32 = 15.0;
const SCALE_DELTA: f32 = 0.1;
const TINT_DELTA: i32 = 20;

/// One placed sprite instance: which sprite, where, and how it is drawn.
///
/// Invariants (restored after every mutation):
/// - `rotation` is in `[0, 360)`
/// - `scale >= MIN_SCALE`
/// - every tint channel is in `[0, 255]` (by construction of `u8`)
///
/// Position is unconstrained; off-canvas placements are clipped at draw
/// time rather than rejected here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Index into the [`SpriteSet`] used for the run.
    pub sprite: usize,
    /// Canvas x coordinate of the sprite's center.
    pub x: i32,
    /// Canvas y coordinate of the sprite's center.
    pub y: i32,
    /// Rotation about the sprite center, degrees in `[0, 360)`.
    pub rotation: f32,
    /// Uniform scale factor, at least [`MIN_SCALE`].
    pub scale: f32,
    /// Per-channel color modulation applied during blending.
    pub tint: [u8; 3],
}

impl Individual {
    /// Sample a random individual.
    ///
    /// Sprite uniformly from the set, position uniformly over the canvas,
    /// rotation uniformly over `[0, 360)`, scale uniformly over
    /// `scale_range`, and each tint channel uniformly over `[0, 255]`.
    pub fn random<R: Rng>(
        rng: &mut R,
        sprites: &SpriteSet,
        canvas_width: u32,
        canvas_height: u32,
        scale_range: (f32, f32),
    ) -> Self {
        Self {
            sprite: rng.gen_range(0..sprites.len()),
            x: rng.gen_range(0..canvas_width as i32),
            y: rng.gen_range(0..canvas_height as i32),
            rotation: rng.gen_range(0.0..360.0),
            scale: rng.gen_range(scale_range.0..=scale_range.1),
            tint: [
                rng.gen_range(0..=255),
                rng.gen_range(0..=255),
                rng.gen_range(0..=255),
            ],
        }
    }

    /// Produce a mutated copy; the receiver is left untouched.
    ///
    /// Each of the five attributes is perturbed independently with
    /// probability `rate`, then clamped or normalized back into its valid
    /// range. Clamping is a silent correction, never an error.
    pub fn mutated<R: Rng>(&self, rng: &mut R, rate: f32) -> Self {
        let mut child = self.clone();

        if rng.gen_bool(f64::from(rate)) {
            child.x += rng.gen_range(-POSITION_DELTA..=POSITION_DELTA);
        }
        if rng.gen_bool(f64::from(rate)) {
            child.y += rng.gen_range(-POSITION_DELTA..=POSITION_DELTA);
        }
        if rng.gen_bool(f64::from(rate)) {
            child.rotation =
                normalize_rotation(child.rotation + rng.gen_range(-ROTATION_DELTA..=ROTATION_DELTA));
        }
        if rng.gen_bool(f64::from(rate)) {
            child.scale = (child.scale + rng.gen_range(-SCALE_DELTA..=SCALE_DELTA)).max(MIN_SCALE);
        }
        if rng.gen_bool(f64::from(rate)) {
            for channel in &mut child.tint {
                let delta = rng.gen_range(-TINT_DELTA..=TINT_DELTA);
                *channel = (i32::from(*channel) + delta).clamp(0, 255) as u8;
            }
        }

        child
    }
}

/// Wrap degrees into `[0, 360)`.
fn normalize_rotation(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid of a tiny negative value can round up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
