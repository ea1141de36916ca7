//! process-analyst: record a business process and turn it into a report.
//!
//! ## Subcommands
//!
//! - `record`: capture screen, input and focused windows until Enter, then analyze
//! - `analyze`: analyze an existing video without an activity log
//! - `render`: turn a saved model answer into a report
//! - `set-api-key`: store the Gemini API key
//! - `cleanup`: prune old reports and recordings

use anyhow::Context;
use clap::{Parser, Subcommand};
use process_analyst_lib::analysis::{AnalysisClient, Analyzer};
use process_analyst_lib::config::{AppConfig, CredentialStore};
use process_analyst_lib::controller::{Notification, SessionObserver};
use process_analyst_lib::report::ReportRenderer;
use process_analyst_lib::retention::cleanup_files_by_count;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "process-analyst")]
#[command(about = "Record a business process and get an AI-written analysis of it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until Enter is pressed, then analyze the recording
    Record {
        /// Language of the report (defaults to the configured one)
        #[arg(long)]
        language: Option<String>,
    },

    /// Analyze an existing video
    Analyze {
        #[arg(value_name = "VIDEO")]
        video: PathBuf,

        #[arg(long)]
        language: Option<String>,
    },

    /// Render a saved model answer (markdown) into a report
    Render {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Store the Gemini API key
    SetApiKey {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Remove all but the newest reports and recordings
    Cleanup,
}

/// Prints controller notifications for a terminal user
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::Timer(elapsed) => eprintln!("  {}", elapsed),
            Notification::Status(status) => eprintln!("{}", status),
            Notification::Error(message) => eprintln!("Erro: {}", message),
            Notification::ReportReady(path) => println!("{}", path.display()),
            Notification::StageChanged(_) | Notification::Log(_) => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    process_analyst_lib::init_tracing();
    tracing::info!("Starting Process Analyst v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = AppConfig::load();
    config.ensure_dirs().context("Failed to create data directories")?;
    let credentials = CredentialStore::open_default()?;

    let stats = cleanup_files_by_count(&[&config.reports_dir, &config.recordings_dir], config.keep_files);

    match cli.command {
        Commands::Record { language } => {
            let language = language.unwrap_or_else(|| config.default_language.clone());
            record(config, credentials, &language).await
        }
        Commands::Analyze { video, language } => {
            let language = language.unwrap_or_else(|| config.default_language.clone());
            let client = AnalysisClient::from_config(&config, credentials.api_key().as_deref())?;
            let text = client.analyze(&video, &[], &language).await?;
            let report = ReportRenderer::new(&config.reports_dir).render(&text)?;
            println!("{}", report.path.display());
            Ok(())
        }
        Commands::Render { input } => {
            let text = std::fs::read_to_string(&input).with_context(|| format!("Failed to read {:?}", input))?;
            let report = ReportRenderer::new(&config.reports_dir).render(&text)?;
            println!("{}", report.path.display());
            Ok(())
        }
        Commands::SetApiKey { key } => {
            credentials.save_api_key(&key)?;
            println!("API key saved to {}", credentials.path().display());
            Ok(())
        }
        Commands::Cleanup => {
            println!("Removed {} files", stats.removed.len());
            for (path, e) in &stats.failed {
                eprintln!("Could not remove {}: {}", path.display(), e);
            }
            Ok(())
        }
    }
}

#[cfg(feature = "desktop")]
async fn record(config: AppConfig, credentials: CredentialStore, language: &str) -> anyhow::Result<()> {
    use process_analyst_lib::capture::desktop::desktop_backend;
    use process_analyst_lib::controller::SessionController;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};

    let mut controller = SessionController::new(config, desktop_backend(), credentials);
    controller.subscribe(Arc::new(ConsoleObserver));
    if !controller.has_analyzer() {
        anyhow::bail!("No API key configured. Run `process-analyst set-api-key <KEY>` or set GOOGLE_API_KEY");
    }

    controller.start(language).await?;
    eprintln!("Recording. Press Enter to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = lines.next_line() => break,
            _ = controller.process_next() => {}
        }
    }

    controller.stop().await?;
    controller.wait_for_analysis().await;

    match controller.report_path() {
        Some(_) => Ok(()),
        None => anyhow::bail!("Analysis failed"),
    }
}

#[cfg(not(feature = "desktop"))]
async fn record(_config: AppConfig, _credentials: CredentialStore, _language: &str) -> anyhow::Result<()> {
    anyhow::bail!("This build has no screen capture support. Rebuild with `--features desktop`")
}
