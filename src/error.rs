/// Convenience result type used across the crate.
pub type CollageResult<T> = Result<T, CollageError>;

/// Top-level error taxonomy.
///
/// Configuration problems are fatal and reported before any generation runs.
/// Snapshot writes are best-effort and never surface here; only a failure to
/// persist the *final* output does.
#[derive(thiserror::Error, Debug)]
pub enum CollageError {
    /// The sprite set contains no sprites.
    #[error("sprite set is empty")]
    EmptySpriteSet,

    /// The target image has zero width or height.
    #[error("target image has zero area ({width}x{height})")]
    EmptyTarget { width: u32, height: u32 },

    /// Population size must be at least 1.
    #[error("population size must be at least 1, got {0}")]
    InvalidPopulationSize(usize),

    /// Elite count cannot exceed the population size.
    #[error("elite size {elite_size} exceeds population size {population_size}")]
    InvalidEliteSize {
        elite_size: usize,
        population_size: usize,
    },

    /// Mutation rate is a per-attribute probability.
    #[error("mutation rate must be in [0, 1], got {0}")]
    InvalidMutationRate(f32),

    /// Scale range must be positive and ordered.
    #[error("scale range must satisfy 0 < min <= max, got [{min}, {max}]")]
    InvalidScaleRange { min: f32, max: f32 },

    /// Canvas and target dimensions disagree. The evaluator never resizes.
    #[error("canvas is {canvas_width}x{canvas_height} but target is {target_width}x{target_height}")]
    DimensionMismatch {
        canvas_width: u32,
        canvas_height: u32,
        target_width: u32,
        target_height: u32,
    },

    /// Writing the final output failed.
    #[error("failed to persist final output: {0}")]
    Persistence(String),
}

impl CollageError {
    /// Build a [`CollageError::Persistence`] value.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
