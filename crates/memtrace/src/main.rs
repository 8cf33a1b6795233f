use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use memtrace_core::{sample, Compositor, EmotionClass, Expression, PresentationModes, Session};
use memtrace_hw::Camera;
use memtrace_vision::FaceAnalyzer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod engine;
mod loader;

use config::Config;

#[derive(Parser)]
#[command(name = "memtrace", version, about = "Traces of Digital Memory: live video seen through remembered dialogue")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the installation (default)
    Run(RunArgs),
    /// Load a dataset and print per-class line counts
    Index {
        /// Dataset file; defaults to the configured one
        dataset: Option<PathBuf>,
    },
    /// Print a sample set for an emotion class or expression name
    Sample {
        /// Class id ("4") or expression name ("happy")
        #[arg(long)]
        class: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Devices,
}

#[derive(Args, Default)]
struct RunArgs {
    #[arg(long)]
    dataset: Option<PathBuf>,
    /// V4L2 device path, e.g. /dev/video0
    #[arg(long)]
    camera: Option<String>,
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Lines per sample set
    #[arg(long)]
    lines: Option<usize>,
    /// Seed the sampler for a reproducible session
    #[arg(long)]
    seed: Option<u64>,
    /// Start in fullscreen
    #[arg(long)]
    fullscreen: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(dataset) = &self.dataset {
            config.dataset_path = dataset.clone();
        }
        if let Some(camera) = &self.camera {
            config.camera_device = camera.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(lines) = self.lines {
            config.lines = lines;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate()?;
            run(config, &args)
        }
        Commands::Index { dataset } => {
            let path = dataset.unwrap_or(config.dataset_path);
            let index = load_blocking(&path)?;
            println!("{}: {} lines in {} classes", path.display(), index.total_lines(), index.class_count());
            for class in index.classes() {
                let lines = index.pool(class).map_or(0, <[String]>::len);
                println!("  {:>3}  {:<10} {lines}", class.as_str(), class.name().unwrap_or("-"));
            }
            if index.skipped_turns() > 0 {
                println!("  ({} unlabeled turns skipped)", index.skipped_turns());
            }
            Ok(())
        }
        Commands::Sample { class, count, seed, dataset } => {
            let path = dataset.unwrap_or(config.dataset_path);
            let index = load_blocking(&path)?;
            let class = class
                .parse::<Expression>()
                .map(Expression::dataset_class)
                .unwrap_or_else(|_| EmotionClass::new(class));
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            for line in sample(&index, &class, count, &mut rng).iter() {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for device in devices {
                println!("{}  {} ({}, {})", device.path, device.name, device.driver, device.bus);
            }
            Ok(())
        }
    }
}

fn load_blocking(path: &std::path::Path) -> Result<memtrace_core::EmotionIndex> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(loader::load_index(path))
        .with_context(|| format!("loading {}", path.display()))
}

fn run(config: Config, args: &RunArgs) -> Result<()> {
    tracing::info!(
        dataset = %config.dataset_path.display(),
        camera = %config.camera_device,
        models = %config.model_dir.display(),
        lines = config.lines,
        "memtrace starting"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let index = loader::spawn_loader(runtime.handle(), config.dataset_path.clone());

    // Camera and models are opened up front so a missing device fails fast.
    let camera = Camera::open(&config.camera_device, config.capture_width, config.capture_height)?;
    let analyzer = FaceAnalyzer::load(&config.model_dir, config.min_confidence)?;

    let frames = engine::spawn_capture(camera, config.warmup_frames)?;
    let detections = engine::spawn_detection(analyzer, frames.clone(), runtime.handle().clone())?;

    let now = Instant::now();
    let session = match args.seed {
        Some(seed) => Session::seeded(config.session(), now, seed),
        None => Session::new(config.session(), now),
    };
    let compositor = Compositor::new(config.canvas(), config.text_layout());
    let modes = if args.fullscreen {
        PresentationModes::in_showcase()
    } else {
        PresentationModes::default()
    };
    let installation = app::Installation::new(session, compositor, frames, detections, index).with_modes(modes);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Traces of Digital Memory")
            .with_inner_size([config.canvas_width as f32, config.canvas_height as f32])
            .with_fullscreen(args.fullscreen),
        ..Default::default()
    };

    let result = eframe::run_native(
        "memtrace",
        native_options,
        Box::new(move |_cc| Ok(Box::new(installation))),
    );
    if let Err(e) = result {
        bail!("display surface failed: {e}");
    }

    tracing::info!("memtrace shutting down");
    Ok(())
}
