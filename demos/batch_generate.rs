//! Generate two reproducible images per row of a `prompt_id,prompt` CSV.
//!
//! Images are saved as `{prompt_id}_1.png` and `{prompt_id}_2.png`.
//!
//! ```sh
//! cargo run --example batch_generate -- prompts.csv out/ --limit 10
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lumina_client::{read_prompts_csv, BatchOptions, BatchRunner, ClientConfig, LuminaClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Batch image generation against a Lumina server")]
struct Args {
    /// CSV file with prompt_id,prompt columns
    csv_path: PathBuf,

    /// Directory for generated images
    output_dir: PathBuf,

    #[arg(long, default_value = "http://localhost:8000")]
    api: String,

    #[arg(long, default_value_t = 1024)]
    height: u32,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 30)]
    steps: u32,

    #[arg(long, default_value_t = 4.0)]
    scale: f64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 600.0)]
    timeout: f64,

    /// Process at most this many prompts
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let prompts = read_prompts_csv(&args.csv_path).await?;

    let config = ClientConfig::builder()
        .with_api_url(args.api)
        .with_timeout(Duration::from_secs_f64(args.timeout))
        .build();

    let mut options = BatchOptions::default()
        .with_size(args.width, args.height)
        .with_steps(args.steps)
        .with_guidance_scale(args.scale);
    options.limit = args.limit;

    let runner = BatchRunner::new(LuminaClient::from_config(&config), options);
    info!(rows = prompts.len(), endpoint = runner.generator().endpoint(), "starting batch");

    let report = runner.run(&prompts, &args.output_dir).await?;
    println!(
        "Done. {} prompts, {} images saved, {} failed.",
        report.processed,
        report.saved.len(),
        report.failures.len()
    );
    Ok(())
}
