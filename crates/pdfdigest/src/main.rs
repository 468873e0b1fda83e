use std::path::PathBuf;

use crate::prelude::*;
use crate::prelude::eprintln;
use clap::Parser;

mod config;
mod error;
mod images;
mod logging;
mod pipeline;
mod prelude;
mod report;
mod summarizer;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Analyze a PDF: word statistics, detected titles and sections, a summary \
                  from a local Ollama model, and every embedded image written to disk"
)]
pub struct App {
    /// The PDF file to analyze
    pub path: PathBuf,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Ollama base URL
    #[clap(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Model used for summarization
    #[clap(long, env = "PDFDIGEST_MODEL", default_value = "qwen3:4b")]
    model: String,

    /// Directory that receives the Markdown report
    #[clap(long, env = "PDFDIGEST_REPORT_DIR", default_value = "utils")]
    report_dir: PathBuf,

    /// Root directory for extracted images
    #[clap(long, env = "PDFDIGEST_IMAGE_DIR", default_value = "images")]
    image_dir: PathBuf,

    /// Diagnostic log file
    #[clap(
        long,
        env = "PDFDIGEST_LOG_FILE",
        default_value = "utils/shared_log_file.log"
    )]
    log_file: PathBuf,

    /// Seconds to wait for each model call
    #[clap(long, env = "PDFDIGEST_SUMMARY_TIMEOUT", default_value = "300")]
    summary_timeout: u64,

    /// Extra attempts after a failed or timed-out model call
    #[clap(long, env = "PDFDIGEST_SUMMARY_RETRIES", default_value = "2")]
    summary_retries: u32,

    /// Whether to display additional information.
    #[clap(long, env = "PDFDIGEST_VERBOSE", default_value = "false")]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let app = App::parse();
    let config = config::Config::from(&app.global);

    logging::init(&config.log_file)
        .wrap_err_with(|| format!("Failed to open log file {}", config.log_file.display()))?;
    log::info!("File received as argument: {}", app.path.display());

    if config.verbose {
        eprintln!("Ollama URL: {}", config.ollama_url);
        eprintln!("Model: {}", config.model);
        eprintln!("Report directory: {}", config.report_dir.display());
        eprintln!("Image directory: {}", config.image_dir.display());
    }

    let summarizer = match summarizer::OllamaSummarizer::new(&config.ollama_url, &config.model) {
        Ok(summarizer) => Some(summarizer),
        Err(err) => {
            log::error!("Error while creating the model client: {}", err);
            None
        }
    };

    let outcome = pipeline::run(&config, &app.path, summarizer.as_ref()).await?;

    if config.verbose {
        for stage in &outcome.stages {
            eprintln!("{}", stage);
        }
    }

    Ok(())
}
