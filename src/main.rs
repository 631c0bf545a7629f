// CLI driver for the collage evolver. Everything in this file is the
// "external collaborator" side of the system: decoding the target and
// sprite images, showing progress, and persisting snapshots to disk. The
// core engine never touches the filesystem.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::{fs, io};

use clap::Parser;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use genetic_collage::{
    CollageError, CollageResult, EvolutionEngine, EvolutionParams, SnapshotSink, Sprite, SpriteSet,
};

/// Evolve a collage of sprites to recreate a target image.
#[derive(Parser)]
#[command(name = "genetic-collage")]
#[command(about = "Approximate an image with an evolved collage of sprites", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the target image (PNG, JPEG, ...)
    #[arg(short, long)]
    input: String,

    /// Directory of sprite images to place (RGB or RGBA)
    #[arg(short = 's', long, default_value = "sprites")]
    sprites: String,

    /// Output directory for snapshots and the final composite
    #[arg(short, long, default_value = "./output")]
    output: String,

    /// Number of generations to run
    #[arg(short, long, default_value_t = 100)]
    generations: usize,

    /// Population size
    #[arg(short, long, default_value_t = 50)]
    population: usize,

    /// Individuals carried unchanged into the next generation
    #[arg(long, default_value_t = 2)]
    elite: usize,

    /// Per-attribute mutation probability (0.0-1.0)
    #[arg(long, default_value_t = 0.1)]
    mutation_rate: f32,

    /// Minimum sprite scale factor for new individuals
    #[arg(long, default_value_t = 0.5)]
    scale_min: f32,

    /// Maximum sprite scale factor for new individuals
    #[arg(long, default_value_t = 2.0)]
    scale_max: f32,

    /// Save a snapshot every N generations (0 disables snapshots)
    #[arg(long, default_value_t = 10)]
    snapshot_interval: usize,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Limit the rayon thread pool (defaults to all cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| format!("failed to configure thread pool: {e}"))?;
    }

    fs::create_dir_all(&args.output)?;

    println!("Loading target image: {}", args.input);
    let target = image::open(&args.input)?.to_rgb8();
    let (width, height) = target.dimensions();
    println!("Target dimensions: {width}x{height}");

    let sprites = load_sprites(Path::new(&args.sprites))?.fit_to_canvas(width, height);
    println!("Loaded {} sprite(s) from {}", sprites.len(), args.sprites);

    let params = EvolutionParams {
        generation_count: args.generations,
        population_size: args.population,
        elite_size: args.elite,
        mutation_rate: args.mutation_rate,
        scale_range: (args.scale_min, args.scale_max),
        snapshot_interval: args.snapshot_interval,
        seed: args.seed,
    };

    let mut engine = EvolutionEngine::new(params, sprites, target)?;
    let mut sink = DirectorySink::new(PathBuf::from(&args.output))?;

    let pb = ProgressBar::new(args.generations as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} (ETA: {eta}) | {msg}")?
            .progress_chars("=>-"),
    );

    println!("\nStarting evolution...\n");
    let summary = engine.run_until(&mut sink, |stats| {
        pb.set_message(format!(
            "Best: {:.0}, Avg: {:.0}",
            stats.best_fitness, stats.average_fitness
        ));
        pb.inc(1);
        false
    })?;
    pb.finish_with_message("done");

    println!("\nResults:");
    println!("  Generations run: {}", summary.generations_run);
    println!("  Best fitness: {:.0}", summary.best_fitness);
    println!("  Similarity: {:.2}%", summary.similarity);
    println!("  Output directory: {}", args.output);

    Ok(())
}

/// Load every decodable image in `dir` as a sprite, in filename order so a
/// seeded run sees the same sprite indices every time.
fn load_sprites(dir: &Path) -> Result<SpriteSet, Box<dyn std::error::Error>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("png" | "jpg" | "jpeg" | "bmp")
            )
        })
        .collect();
    paths.sort();

    let mut sprites = Vec::with_capacity(paths.len());
    for path in &paths {
        let image = image::open(path)?;
        sprites.push(Sprite::from_dynamic(&image));
    }

    Ok(SpriteSet::new(sprites)?)
}

/// Persists engine output under a directory.
///
/// Periodic snapshots are handed to a dedicated writer thread over a
/// channel so disk latency never stalls the generation loop; a failed or
/// dropped snapshot write is logged and otherwise ignored. The final
/// composite is written synchronously because its failure must fail the
/// run.
struct DirectorySink {
    output_dir: PathBuf,
    sender: Option<mpsc::Sender<(usize, RgbImage)>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl DirectorySink {
    fn new(output_dir: PathBuf) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<(usize, RgbImage)>();
        let dir = output_dir.clone();

        let writer = thread::Builder::new()
            .name("snapshot-writer".to_owned())
            .spawn(move || {
                for (generation, canvas) in receiver {
                    let path = dir.join(format!("generation_{generation:05}.png"));
                    if let Err(e) = canvas.save(&path) {
                        warn!(error = %e, path = %path.display(), "snapshot write failed");
                        continue;
                    }
                    // Rolling copy of the most recent snapshot
                    if let Err(e) = canvas.save(dir.join("latest.png")) {
                        warn!(error = %e, "latest.png write failed");
                    }
                }
            })?;

        Ok(Self {
            output_dir,
            sender: Some(sender),
            writer: Some(writer),
        })
    }
}

impl SnapshotSink for DirectorySink {
    fn save_snapshot(&mut self, generation: usize, canvas: &RgbImage) {
        if let Some(sender) = &self.sender {
            // The buffer is cloned so the engine can keep mutating its
            // canvas while the writer catches up
            if sender.send((generation, canvas.clone())).is_err() {
                warn!(generation, "snapshot writer is gone; dropping snapshot");
            }
        }
    }

    fn save_final(&mut self, canvas: &RgbImage, _similarity: f64) -> CollageResult<()> {
        let path = self.output_dir.join("final.png");
        canvas
            .save(&path)
            .map_err(|e| CollageError::persistence(format!("{}: {e}", path.display())))
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain its queue and exit
        self.sender.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}
