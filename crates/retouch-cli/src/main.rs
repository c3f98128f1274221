//! Retouch CLI: prepare an image locally and send it to the edit service.
//!
//! Configuration comes from RETOUCH_* environment variables (or a .env file);
//! flags override them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use retouch_cli::{init_tracing, operation_catalog, parse_field, ConsoleObserver, EditReport};
use retouch_core::{Config, OperationRequest, SelectedFile};
use retouch_pipeline::{save_to, PipelineController};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "retouch", about = "Retouch image edit client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported operations and their fields
    Operations,
    /// Validate, resize and compress an image, then send it for editing
    Edit {
        /// Path to the image
        file: PathBuf,
        /// Operation key (see `retouch operations`)
        #[arg(long, short)]
        operation: String,
        /// Operation field as name=value (repeatable)
        #[arg(long = "field", short = 'f', value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Directory the edited image is saved to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// MIME type of the file (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Edit service base URL
        #[arg(long)]
        api_url: Option<String>,
        /// Upload timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize report")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Operations => print_json(&operation_catalog())?,
        Commands::Edit {
            file,
            operation,
            fields,
            output_dir,
            content_type,
            api_url,
            timeout_secs,
        } => {
            let mut config = Config::from_env().context("Failed to load configuration")?;
            if let Some(api_url) = api_url {
                config.client.api_url = api_url.trim_end_matches('/').to_string();
            }
            if let Some(secs) = timeout_secs {
                config.limits.request_timeout = Duration::from_secs(secs);
            }

            let request = OperationRequest::from_pairs(&operation, fields)
                .context("Run `retouch operations` to list supported operations")?;

            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let content_type = content_type.unwrap_or_else(|| {
                mime_guess::from_path(&file)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let selected = SelectedFile::new(name, content_type, data);

            let controller = Arc::new(
                PipelineController::from_config(&config)?
                    .with_observer(Arc::new(ConsoleObserver::stderr())),
            );

            let canceller = controller.clone();
            let signal = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() && !canceller.cancel() {
                    // Nothing in flight to abort: stop right away.
                    tracing::warn!(state = %canceller.state(), "Interrupted");
                    std::process::exit(130);
                }
            });

            let result = controller.submit(Some(selected), request).await;
            signal.abort();

            match result {
                Ok(outcome) => {
                    let path = save_to(&outcome, &output_dir)
                        .await
                        .context("Failed to save edited image")?;
                    print_json(&EditReport::success(
                        &outcome,
                        path.display().to_string(),
                    ))?;
                }
                Err(err) => {
                    print_json(&EditReport::failure(controller.state(), &err))?;
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
