// Library root for the sprite-collage evolution engine.
//
// The crate evolves a population of placed, tinted, rotated sprite
// instances whose composited rendering approximates a target image. The
// modules mirror the pipeline: sprites feed individuals, individuals are
// composited onto a canvas, canvases are scored against the target, and the
// evolution engine runs the selection cycle over a population.

pub mod compositor;
pub mod error;
pub mod evolution;
pub mod fitness;
pub mod individual;
pub mod population;
pub mod sprite;

// Re-export the main types at the crate root for convenience.
pub use error::{CollageError, CollageResult};
pub use evolution::{
    DiscardSnapshots, EvolutionEngine, EvolutionParams, GenerationStats, RunSummary, SnapshotSink,
};
pub use individual::Individual;
pub use population::{Member, Population};
pub use sprite::{AlphaMode, Sprite, SpriteSet};
