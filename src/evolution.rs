// The evolution engine drives the generation cycle:
// Evaluate -> Rank -> Select -> Reproduce -> Replace.
//
// All mutable run state (canvas, target, RNG) lives in an explicit
// GenerationContext owned by the engine; there is no module-level state, so
// two engines can run side by side and a seeded run is reproducible.

use std::cmp::Ordering;

use image::{Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compositor::composite;
use crate::error::{CollageError, CollageResult};
use crate::fitness::{canvas_difference, similarity_percent};
use crate::population::{Member, Population};
use crate::sprite::SpriteSet;

/// Parameters controlling the evolution run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionParams {
    /// Number of generations to run.
    pub generation_count: usize,
    /// Number of individuals per generation (fixed for the run).
    pub population_size: usize,
    /// Top-ranked individuals carried into the next generation unchanged.
    pub elite_size: usize,
    /// Per-attribute probability of perturbation during reproduction.
    pub mutation_rate: f32,
    /// Scale factors sampled for new random individuals, `(min, max)`.
    pub scale_range: (f32, f32),
    /// Emit a snapshot every this many generations; `0` disables snapshots.
    pub snapshot_interval: usize,
    /// RNG seed; `None` seeds from entropy (run is then not reproducible).
    pub seed: Option<u64>,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            generation_count: 100,
            population_size: 50,
            elite_size: 2,
            mutation_rate: 0.1,
            scale_range: (0.5, 2.0),
            snapshot_interval: 10,
            seed: None,
        }
    }
}

impl EvolutionParams {
    /// Reject configurations that cannot produce a valid run.
    fn validate(&self) -> CollageResult<()> {
        if self.population_size == 0 {
            return Err(CollageError::InvalidPopulationSize(self.population_size));
        }
        if self.elite_size > self.population_size {
            return Err(CollageError::InvalidEliteSize {
                elite_size: self.elite_size,
                population_size: self.population_size,
            });
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(CollageError::InvalidMutationRate(self.mutation_rate));
        }
        let (min, max) = self.scale_range;
        if !(min > 0.0 && min <= max) {
            return Err(CollageError::InvalidScaleRange { min, max });
        }
        Ok(())
    }
}

/// Per-generation statistics handed to the early-termination hook.
#[derive(Clone, Copy, Debug)]
pub struct GenerationStats {
    /// Zero-based index of the generation that just completed.
    pub generation: usize,
    pub best_fitness: f64,
    pub average_fitness: f64,
}

/// Result of a completed run.
#[derive(Clone, Copy, Debug)]
pub struct RunSummary {
    pub generations_run: usize,
    pub best_fitness: f64,
    /// Similarity of the final composite to the target, in `[0, 100]`.
    pub similarity: f64,
}

/// Receiver for canvases the engine wants persisted.
///
/// Persistence is an external collaborator's job; the engine only hands
/// buffers over. Implementations should keep `save_snapshot` cheap (hand
/// off to a writer thread or queue) so disk latency never stalls the
/// generation loop.
pub trait SnapshotSink {
    /// Persist a periodic snapshot, best-effort. Losing one is non-fatal;
    /// implementations log and move on rather than propagate.
    fn save_snapshot(&mut self, generation: usize, canvas: &RgbImage);

    /// Persist the final composite. A failure here fails the run.
    fn save_final(&mut self, canvas: &RgbImage, similarity: f64) -> CollageResult<()>;
}

/// A sink that drops everything; useful for tests and dry runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSnapshots;

impl SnapshotSink for DiscardSnapshots {
    fn save_snapshot(&mut self, _generation: usize, _canvas: &RgbImage) {}

    fn save_final(&mut self, _canvas: &RgbImage, _similarity: f64) -> CollageResult<()> {
        Ok(())
    }
}

/// All mutable state for a run: the shared canvas, the read-only target,
/// and the RNG threaded through every sampling call.
struct GenerationContext {
    canvas: RgbImage,
    target: RgbImage,
    rng: Pcg64Mcg,
}

impl GenerationContext {
    fn new(target: RgbImage, rng: Pcg64Mcg) -> Self {
        let (width, height) = target.dimensions();
        Self {
            canvas: RgbImage::from_pixel(width, height, Rgb([0, 0, 0])),
            target,
            rng,
        }
    }

    /// Wipe the canvas back to the background. Done once per composite so
    /// drawing artifacts never compound across generations.
    fn reset_canvas(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgb([0, 0, 0]);
        }
    }
}

/// Top-level orchestrator for an evolution run.
pub struct EvolutionEngine {
    params: EvolutionParams,
    sprites: SpriteSet,
    ctx: GenerationContext,
    population: Population,
}

impl EvolutionEngine {
    /// Validate the configuration and build the initial random population.
    ///
    /// All configuration errors surface here, before any generation runs.
    pub fn new(
        params: EvolutionParams,
        sprites: SpriteSet,
        target: RgbImage,
    ) -> CollageResult<Self> {
        params.validate()?;
        if sprites.is_empty() {
            return Err(CollageError::EmptySpriteSet);
        }
        let (width, height) = target.dimensions();
        if width == 0 || height == 0 {
            return Err(CollageError::EmptyTarget { width, height });
        }

        let seed = params.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        debug!(seed, "seeded run");

        let population = Population::random(
            &mut rng,
            params.population_size,
            &sprites,
            width,
            height,
            params.scale_range,
        );

        Ok(Self {
            params,
            sprites,
            ctx: GenerationContext::new(target, rng),
            population,
        })
    }

    pub fn params(&self) -> &EvolutionParams {
        &self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// The most recently composited full-population canvas.
    pub fn canvas(&self) -> &RgbImage {
        &self.ctx.canvas
    }

    /// Run one full generation cycle and return its statistics.
    ///
    /// Reset canvas -> composite the population in draw order -> evaluate ->
    /// rank descending -> carry elites unchanged -> fill the remaining slots
    /// with mutated clones of parents sampled uniformly from the top half ->
    /// replace the population.
    pub fn step(&mut self) -> GenerationStats {
        // Composite the whole population onto the shared canvas. This is
        // what snapshots and the final output show.
        self.ctx.reset_canvas();
        let individuals: Vec<_> = self
            .population
            .members
            .iter()
            .map(|m| m.individual.clone())
            .collect();
        composite(&mut self.ctx.canvas, &individuals, &self.sprites);

        // Score members that don't carry a score yet (elites keep theirs).
        self.population.evaluate(&self.sprites, &self.ctx.target);

        let stats = GenerationStats {
            generation: self.population.generation,
            best_fitness: self.population.best().fitness.unwrap_or(f64::NEG_INFINITY),
            average_fitness: self.population.average_fitness(),
        };

        // Rank: best first.
        self.population.members.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(Ordering::Equal)
        });

        // Select elites, then reproduce by clone-plus-mutation. Parents are
        // sampled uniformly from the top half of the ranking.
        let mut next: Vec<Member> = self.population.members[..self.params.elite_size].to_vec();
        let parent_pool = (self.population.len() / 2).max(1);
        while next.len() < self.params.population_size {
            let parent_index = self.ctx.rng.gen_range(0..parent_pool);
            let child = self.population.members[parent_index]
                .individual
                .mutated(&mut self.ctx.rng, self.params.mutation_rate);
            next.push(Member {
                individual: child,
                fitness: None,
            });
        }

        // Replace: the old population is dropped, elites already copied out.
        self.population.members = next;
        self.population.generation += 1;

        stats
    }

    /// Run the configured number of generations, emitting snapshots and
    /// persisting the final composite through `sink`.
    pub fn run(&mut self, sink: &mut dyn SnapshotSink) -> CollageResult<RunSummary> {
        self.run_until(sink, |_| false)
    }

    /// Like [`run`](Self::run), with an early-termination hook: the run
    /// stops after any generation for which `stop` returns true. Useful for
    /// fitness-plateau detection or an external cancel signal.
    pub fn run_until<F>(&mut self, sink: &mut dyn SnapshotSink, mut stop: F) -> CollageResult<RunSummary>
    where
        F: FnMut(&GenerationStats) -> bool,
    {
        let mut generations_run = 0;

        for generation in 0..self.params.generation_count {
            let stats = self.step();
            generations_run += 1;

            debug!(
                generation,
                best = stats.best_fitness,
                average = stats.average_fitness,
                "generation complete"
            );

            if self.params.snapshot_interval > 0 && generation % self.params.snapshot_interval == 0 {
                sink.save_snapshot(generation, &self.ctx.canvas);
            }

            if stop(&stats) {
                debug!(generation, "early termination requested");
                break;
            }
        }

        // Composite the final population once more and persist it as the
        // run's output, together with the similarity percentage.
        self.ctx.reset_canvas();
        let individuals: Vec<_> = self
            .population
            .members
            .iter()
            .map(|m| m.individual.clone())
            .collect();
        composite(&mut self.ctx.canvas, &individuals, &self.sprites);

        let difference = canvas_difference(&self.ctx.canvas, &self.ctx.target);
        let (width, height) = self.ctx.target.dimensions();
        let similarity = similarity_percent(difference, width, height);

        sink.save_final(&self.ctx.canvas, similarity)?;

        self.population.evaluate(&self.sprites, &self.ctx.target);
        let best_fitness = self.population.best().fitness.unwrap_or(f64::NEG_INFINITY);

        Ok(RunSummary {
            generations_run,
            best_fitness,
            similarity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::Sprite;
    use image::Rgb;

    fn white_sprite_set() -> SpriteSet {
        let sprite = Sprite::opaque(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        SpriteSet::new(vec![sprite]).unwrap()
    }

    fn black_target(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([0, 0, 0]))
    }

    fn seeded_params() -> EvolutionParams {
        EvolutionParams {
            seed: Some(42),
            ..EvolutionParams::default()
        }
    }

    /// Sink that records which generations produced snapshots.
    #[derive(Default)]
    struct RecordingSink {
        snapshots: Vec<usize>,
        finals: usize,
    }

    impl SnapshotSink for RecordingSink {
        fn save_snapshot(&mut self, generation: usize, _canvas: &RgbImage) {
            self.snapshots.push(generation);
        }

        fn save_final(&mut self, _canvas: &RgbImage, _similarity: f64) -> CollageResult<()> {
            self.finals += 1;
            Ok(())
        }
    }

    #[test]
    fn default_params() {
        let params = EvolutionParams::default();
        assert_eq!(params.generation_count, 100);
        assert_eq!(params.population_size, 50);
        assert_eq!(params.elite_size, 2);
        assert_eq!(params.mutation_rate, 0.1);
        assert_eq!(params.scale_range, (0.5, 2.0));
        assert_eq!(params.snapshot_interval, 10);
    }

    #[test]
    fn configuration_errors_are_fatal_before_any_generation() {
        let target = black_target(32, 32);

        let zero_pop = EvolutionParams {
            population_size: 0,
            elite_size: 0,
            ..seeded_params()
        };
        assert!(matches!(
            EvolutionEngine::new(zero_pop, white_sprite_set(), target.clone()),
            Err(CollageError::InvalidPopulationSize(0))
        ));

        let oversized_elite = EvolutionParams {
            population_size: 5,
            elite_size: 6,
            ..seeded_params()
        };
        assert!(matches!(
            EvolutionEngine::new(oversized_elite, white_sprite_set(), target.clone()),
            Err(CollageError::InvalidEliteSize { .. })
        ));

        let bad_rate = EvolutionParams {
            mutation_rate: 1.5,
            ..seeded_params()
        };
        assert!(matches!(
            EvolutionEngine::new(bad_rate, white_sprite_set(), target.clone()),
            Err(CollageError::InvalidMutationRate(_))
        ));

        let bad_scale = EvolutionParams {
            scale_range: (0.0, 2.0),
            ..seeded_params()
        };
        assert!(matches!(
            EvolutionEngine::new(bad_scale, white_sprite_set(), target.clone()),
            Err(CollageError::InvalidScaleRange { .. })
        ));

        assert!(matches!(
            EvolutionEngine::new(seeded_params(), white_sprite_set(), RgbImage::new(0, 0)),
            Err(CollageError::EmptyTarget { .. })
        ));
    }

    #[test]
    fn step_preserves_population_size_and_increments_generation() {
        let params = EvolutionParams {
            population_size: 20,
            elite_size: 3,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(40, 40)).unwrap();

        for expected_generation in 0..5 {
            let stats = engine.step();
            assert_eq!(stats.generation, expected_generation);
            assert_eq!(engine.population().len(), 20);
            assert_eq!(engine.population().generation, expected_generation + 1);
        }
    }

    #[test]
    fn elites_are_exactly_the_top_ranked_and_unchanged() {
        let params = EvolutionParams {
            population_size: 15,
            elite_size: 4,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(40, 40)).unwrap();

        engine.step();

        // After a step the first elite_size members are the previous
        // generation's top-ranked, scores included.
        let mut carried: Vec<_> = engine.population().members[..4].to_vec();
        assert!(carried.iter().all(|m| m.fitness.is_some()));

        let snapshot: Vec<_> = carried.iter().map(|m| m.individual.clone()).collect();
        let scores: Vec<_> = carried.iter().map(|m| m.fitness).collect();

        // Elite scores are sorted best-first
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }

        engine.step();
        carried = engine.population().members[..4].to_vec();

        // The previous elites can only be displaced by strictly better
        // children; their attribute values are never perturbed in place.
        for member in &carried {
            if let Some(pos) = snapshot.iter().position(|i| i == &member.individual) {
                assert_eq!(member.fitness, scores[pos]);
            }
        }
    }

    #[test]
    fn best_fitness_never_regresses_across_a_run() {
        // End-to-end: 100x100 black target, one opaque white 10x10 sprite
        let params = EvolutionParams {
            generation_count: 50,
            population_size: 50,
            elite_size: 5,
            mutation_rate: 0.1,
            snapshot_interval: 0,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(100, 100)).unwrap();

        let first = engine.step();
        let mut previous_best = first.best_fitness;
        for _ in 1..50 {
            let stats = engine.step();
            assert!(
                stats.best_fitness >= previous_best,
                "fitness regressed: {} < {}",
                stats.best_fitness,
                previous_best
            );
            previous_best = stats.best_fitness;
        }
    }

    #[test]
    fn snapshots_land_on_interval_boundaries() {
        // snapshot_interval=10, generation_count=100 => exactly 10 emissions
        let params = EvolutionParams {
            generation_count: 100,
            population_size: 10,
            elite_size: 2,
            snapshot_interval: 10,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(30, 30)).unwrap();

        let mut sink = RecordingSink::default();
        let summary = engine.run(&mut sink).unwrap();

        assert_eq!(summary.generations_run, 100);
        let expected: Vec<usize> = (0..10).map(|i| i * 10).collect();
        assert_eq!(sink.snapshots, expected);
        assert_eq!(sink.finals, 1);
    }

    #[test]
    fn zero_interval_disables_snapshots() {
        let params = EvolutionParams {
            generation_count: 20,
            population_size: 10,
            snapshot_interval: 0,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(30, 30)).unwrap();

        let mut sink = RecordingSink::default();
        engine.run(&mut sink).unwrap();

        assert!(sink.snapshots.is_empty());
        assert_eq!(sink.finals, 1);
    }

    #[test]
    fn early_termination_hook_stops_the_run() {
        let params = EvolutionParams {
            generation_count: 100,
            population_size: 10,
            snapshot_interval: 0,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(30, 30)).unwrap();

        let summary = engine
            .run_until(&mut DiscardSnapshots, |stats| stats.generation >= 6)
            .unwrap();

        assert_eq!(summary.generations_run, 7);
    }

    #[test]
    fn summary_similarity_is_in_range() {
        let params = EvolutionParams {
            generation_count: 10,
            population_size: 10,
            snapshot_interval: 0,
            ..seeded_params()
        };
        let mut engine =
            EvolutionEngine::new(params, white_sprite_set(), black_target(40, 40)).unwrap();

        let summary = engine.run(&mut DiscardSnapshots).unwrap();
        assert!((0.0..=100.0).contains(&summary.similarity));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let params = EvolutionParams {
            generation_count: 10,
            population_size: 10,
            snapshot_interval: 0,
            seed: Some(1234),
            ..EvolutionParams::default()
        };

        let run = |params: EvolutionParams| {
            let mut engine =
                EvolutionEngine::new(params, white_sprite_set(), black_target(30, 30)).unwrap();
            engine.run(&mut DiscardSnapshots).unwrap()
        };

        let a = run(params.clone());
        let b = run(params);
        assert_eq!(a.best_fitness, b.best_fitness);
        assert_eq!(a.similarity, b.similarity);
    }
}
