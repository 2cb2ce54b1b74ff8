use clap::{Parser, Subcommand};
use photo_sorter_lib::commands::{classifier, filesystem};
use photo_sorter_lib::{AppConfig, AppError, Category};
use std::path::PathBuf;
use tracing::{error, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about = "Sorts photos into category folders from object detections")]
struct CliArgs {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory holding one folder per category.
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect objects in images and store each one in its category folder.
    Classify {
        /// Image files or directories of images.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// ONNX detector model.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Category for images that cannot be classified, instead of asking.
        #[arg(long)]
        fallback: Option<Category>,

        #[arg(long)]
        json: bool,
    },
    /// Score a JSON list of detections without running a model.
    Score {
        detections: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Show the number of images in each category.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// List the images stored in a category.
    List { category: Category },
    /// Delete one stored image.
    Remove { category: Category, name: String },
    /// Delete every stored image in every category.
    Clear,
    /// Print category counts whenever storage changes.
    Watch,
}

fn load_config(args: &CliArgs) -> Result<AppConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(base_dir) = &args.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Command::Classify {
        model, fallback, ..
    } = &args.command
    {
        if let Some(model) = model {
            config.detector.model_path = model.clone();
        }
        if fallback.is_some() {
            config.fallback_category = *fallback;
        }
    }
    Ok(config)
}

async fn run(args: CliArgs) -> Result<(), AppError> {
    let config = load_config(&args)?;

    match args.command {
        Command::Classify { inputs, json, .. } => {
            let report = classifier::classify_images(&config, &inputs, json).await?;
            if report.summary.failed > 0 {
                return Err(format!("{} images failed", report.summary.failed).into());
            }
        }
        Command::Score { detections, json } => {
            classifier::score_file(&detections, json)?;
        }
        Command::Stats { json } => {
            filesystem::get_category_stats(&config, json)?;
        }
        Command::List { category } => {
            filesystem::list_category(&config, category)?;
        }
        Command::Remove { category, name } => {
            filesystem::delete_image(&config, category, &name)?;
        }
        Command::Clear => {
            let report = filesystem::clear_categories(&config);
            if !report.failures.is_empty() {
                return Err(format!("{} files could not be deleted", report.failures.len()).into());
            }
        }
        Command::Watch => {
            filesystem::watch_stats(&config).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::parse();

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();

    if let Err(e) = run(cli_args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
