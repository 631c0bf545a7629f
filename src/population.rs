use image::{Rgb, RgbImage};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compositor::draw_individual;
use crate::fitness::canvas_fitness;
use crate::individual::Individual;
use crate::sprite::SpriteSet;

/// One population slot: an individual paired with its fitness score.
///
/// `None` means the member has not been evaluated since it was created or
/// replaced. Fitness is a pure function of the individual, so a member that
/// already carries a score keeps it across generations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub individual: Individual,
    /// Higher is better; `None` until evaluated.
    pub fitness: Option<f64>,
}

/// The fixed-size, ordered collection of individuals evolved together.
///
/// Member order is draw order for the full-population composite. The whole
/// vector is replaced each generation; elites are copied out before the old
/// population is dropped.
#[derive(Clone, Debug)]
pub struct Population {
    pub members: Vec<Member>,
    /// Number of completed generations (starts at 0).
    pub generation: usize,
}

impl Population {
    /// Create a population of `size` random, unevaluated individuals.
    pub fn random<R: Rng>(
        rng: &mut R,
        size: usize,
        sprites: &SpriteSet,
        canvas_width: u32,
        canvas_height: u32,
        scale_range: (f32, f32),
    ) -> Self {
        let members = (0..size)
            .map(|_| Member {
                individual: Individual::random(rng, sprites, canvas_width, canvas_height, scale_range),
                fitness: None,
            })
            .collect();

        Self {
            members,
            generation: 0,
        }
    }

    /// Score every unevaluated member, in parallel.
    ///
    /// A member's score is the whole-canvas fitness of that individual
    /// composited alone over the reset (black) background. Each member
    /// renders into its own scratch canvas, so the map is over read-only
    /// shared inputs and needs no locks. Members that already carry a score
    /// (elites) are skipped; re-evaluation would produce the same value.
    pub fn evaluate(&mut self, sprites: &SpriteSet, target: &RgbImage) {
        let (width, height) = target.dimensions();

        self.members.par_iter_mut().for_each(|member| {
            if member.fitness.is_some() {
                return;
            }
            let mut scratch = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
            draw_individual(&mut scratch, &member.individual, sprites);
            // Sequential difference here: parallelism is already spent
            // across members
            member.fitness = Some(canvas_fitness(&scratch, target));
        });
    }

    /// The highest-fitness member.
    ///
    /// # Panics
    ///
    /// Panics if the population is empty or not yet evaluated; calling this
    /// before `evaluate` is a bug.
    pub fn best(&self) -> &Member {
        self.members
            .iter()
            .max_by(|a, b| {
                a.fitness
                    .expect("population must be evaluated before ranking")
                    .partial_cmp(&b.fitness.expect("population must be evaluated before ranking"))
                    .expect("fitness scores are never NaN")
            })
            .expect("population must not be empty")
    }

    /// Mean fitness over all evaluated members.
    pub fn average_fitness(&self) -> f64 {
        let sum: f64 = self
            .members
            .iter()
            .map(|m| m.fitness.expect("population must be evaluated"))
            .sum();
        sum / self.members.len() as f64
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
