use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use onnx_fashion::{
    config::Config,
    image::ImageLoader,
    models::{load_labels, Classifier},
    recognition::{RecognitionPipeline, StillFrame},
    web::serve,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onnx-fashion")]
#[command(about = "ONNX-powered Fashion-MNIST garment recognition")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Model directory path
    #[arg(long, default_value = "models", global = true)]
    models_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP recognition service
    Serve {
        /// Server bind address
        #[arg(long, default_value = "0.0.0.0:5005")]
        bind: String,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Enable development mode
        #[arg(long)]
        dev: bool,
    },

    /// Recognize a single image file and print the result
    Classify {
        /// Image file to recognize
        image: PathBuf,

        /// Print only the top k classes of the ranking
        #[arg(long)]
        top_k: Option<usize>,

        /// Write the 28x28 model input as a grayscale PNG
        #[arg(long)]
        dump_tensor: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    match args.command {
        Command::Serve { bind, workers, dev } => {
            let config = Config::new(bind, args.models_dir, workers, dev)?;

            tracing::info!("Starting ONNX fashion recognition service...");
            tracing::info!("Bind address: {}", config.bind_addr);
            tracing::info!("Models directory: {}", config.models_dir.display());
            tracing::info!("Worker threads: {}", config.workers);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.workers)
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?;

            runtime.block_on(serve(config))?;
        }
        Command::Classify {
            image,
            top_k,
            dump_tensor,
        } => {
            let config = Config::new(String::new(), args.models_dir, Some(1), false)?;
            classify(&config, &image, top_k, dump_tensor.as_deref())?;
        }
    }

    Ok(())
}

fn classify(
    config: &Config,
    image_path: &std::path::Path,
    top_k: Option<usize>,
    dump_tensor: Option<&std::path::Path>,
) -> Result<()> {
    let image = ImageLoader::from_path(image_path)
        .with_context(|| format!("failed to load image {}", image_path.display()))?;
    let frame = ImageLoader::to_color_image(image)?;

    let pipeline = RecognitionPipeline::new(load_labels(config)?);

    if let Some(path) = dump_tensor {
        let tensor = pipeline.preprocess(&frame)?;
        tensor
            .to_preview_image()
            .save(path)
            .with_context(|| format!("failed to write tensor preview {}", path.display()))?;
        tracing::info!("Model input written to {}", path.display());
    }

    let classifier = Classifier::new(config)?;
    let mut source = StillFrame::new(frame);

    match pipeline.recognize_from(&mut source, &classifier)? {
        Some(recognition) => {
            println!("{}", recognition.display_text());
            if let Some(k) = top_k {
                for (rank, entry) in recognition.top_k(k).iter().enumerate() {
                    println!("{:>2}. {:<12} {:.4}", rank + 1, entry.label, entry.score);
                }
            }
        }
        None => tracing::warn!("No frame captured, nothing to recognize"),
    }

    Ok(())
}
