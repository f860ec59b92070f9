use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stickerme_contracts::{list_presets, GenerationRequest, ParameterOverrides, PresetFamily};
use stickerme_engine::{
    ArtifactStore, Dispatcher, DryrunGenerator, EngineConfig, ImageGenerator, StabilityClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stickerme", version, about = "Generate AI images from text prompts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an image with optional presets and overrides
    Generate(GenerateArgs),
    /// Show available aspect ratio presets
    Aspects,
    /// Show available quality presets
    Qualities,
    /// Show available style presets
    Styles,
    /// Copy a previously generated image out of the artifact directory
    Fetch(FetchArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    aspect_ratio: Option<String>,
    #[arg(long)]
    quality: Option<String>,
    #[arg(long)]
    style: Option<String>,
    /// Custom width (512-1536)
    #[arg(long)]
    width: Option<u32>,
    /// Custom height (512-1536)
    #[arg(long)]
    height: Option<u32>,
    /// CFG scale (1-20, higher = more prompt adherence)
    #[arg(long)]
    cfg_scale: Option<f64>,
    /// Number of steps (10-150, higher = better quality but slower)
    #[arg(long)]
    steps: Option<u32>,
    #[arg(long, default_value = "local")]
    user: String,
    #[arg(long)]
    images_dir: Option<PathBuf>,
    /// Render a placeholder locally instead of calling the image service
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Parser)]
struct FetchArgs {
    #[arg(long)]
    file: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    images_dir: Option<PathBuf>,
}

const EXIT_USER_ERROR: i32 = 2;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stickerme error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stickerme_cli=info,stickerme_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Aspects => {
            print_presets(PresetFamily::Aspect, "Available Aspect Ratios");
            Ok(0)
        }
        Command::Qualities => {
            print_presets(PresetFamily::Quality, "Available Quality Presets");
            Ok(0)
        }
        Command::Styles => {
            print_presets(PresetFamily::Style, "Available Style Presets");
            Ok(0)
        }
        Command::Fetch(args) => run_fetch(args),
    }
}

fn load_config(images_dir: Option<PathBuf>) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("invalid environment configuration")?;
    if let Some(dir) = images_dir {
        config.images_dir = dir;
    }
    Ok(config)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = load_config(args.images_dir.clone())?;
    let generator: Box<dyn ImageGenerator> = if args.dry_run {
        Box::new(DryrunGenerator)
    } else {
        Box::new(StabilityClient::new(&config).context("failed to build HTTP client")?)
    };
    let dispatcher = Dispatcher::from_config(&config, generator);
    tracing::info!(
        generator = dispatcher.generator_name(),
        images_dir = %config.images_dir.display(),
        "dispatching generation request"
    );

    let request = GenerationRequest {
        prompt: args.prompt,
        aspect_ratio: args.aspect_ratio,
        quality: args.quality,
        style: args.style,
        overrides: ParameterOverrides {
            width: args.width,
            height: args.height,
            cfg_scale: args.cfg_scale,
            steps: args.steps,
        },
        requester_id: args.user,
    };

    match dispatcher.handle(&request) {
        Ok(payload) => {
            println!("{}", payload.render_text());
            Ok(0)
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            Ok(EXIT_USER_ERROR)
        }
    }
}

fn run_fetch(args: FetchArgs) -> Result<i32> {
    let config = load_config(args.images_dir)?;
    let store = ArtifactStore::new(&config.images_dir, config.write_timeout);
    let bytes = match store.fetch(&args.file) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("❌ Failed to download image: {err}");
            return Ok(EXIT_USER_ERROR);
        }
    };
    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(&args.out, &bytes)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("Here's your generated image: {}", args.out.display());
    Ok(0)
}

fn print_presets(family: PresetFamily, heading: &str) {
    println!("{heading}");
    for row in list_presets(family) {
        println!("  {:<14} {:<24} {}", row.name, row.label, row.detail);
    }
    println!(
        "Use these with `stickerme generate --{} <name>`",
        family.as_str().replace('_', "-")
    );
}
