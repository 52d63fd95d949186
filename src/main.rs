// gemflow - Gemini API request orchestration
// Author: kelexine (https://github.com/kelexine)

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use gemflow::batch::BatchRequest;
use gemflow::cli::{Args, Command};
use gemflow::config::AppConfig;
use gemflow::models::GenerateRequest;
use gemflow::utils::logging;
use gemflow::{RequestDispatcher, RequestOptions};
use std::io::Write;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load()?,
    };
    if let Some(model) = &args.model {
        config.gemini.default_model = model.clone();
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting gemflow v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Build the dispatcher
    let dispatcher = RequestDispatcher::from_config(&config)?;
    let model = dispatcher.default_model().to_string();

    // Phase 4: Run the command
    match args.command {
        Command::Generate { prompt, no_cache, no_retry, timeout } => {
            let options = RequestOptions {
                skip_cache: no_cache,
                skip_retry: no_retry,
                custom_timeout: timeout.map(Duration::from_secs),
            };
            let outcome = dispatcher
                .generate(GenerateRequest::text(&model, prompt), options)
                .await?;
            println!("{}", outcome.text());
            info!(
                "Done in {:?} (cached: {}, retries: {}, trace: {})",
                outcome.metadata.duration,
                outcome.metadata.from_cache,
                outcome.metadata.retry_count,
                outcome.metadata.trace_id
            );
        }
        Command::Stream { prompt } => {
            let mut stream = dispatcher.stream(GenerateRequest::text(&model, prompt)).await?;
            let mut stdout = std::io::stdout();
            loop {
                tokio::select! {
                    chunk = stream.next() => match chunk {
                        Some(chunk) => {
                            if let Some(text) = chunk?.text {
                                write!(stdout, "{}", text)?;
                                stdout.flush()?;
                            }
                        }
                        None => break,
                    },
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C signal, cancelling stream");
                        stream.cancel();
                        break;
                    }
                }
            }
            writeln!(stdout)?;
        }
        Command::BatchSubmit { prompts, wait } => {
            let requests = prompts
                .into_iter()
                .enumerate()
                .map(|(i, p)| {
                    BatchRequest::new(format!("prompt-{}", i), GenerateRequest::text(&model, p))
                })
                .collect();
            let job = dispatcher.submit_batch(requests).await?;
            println!("{}", job.job_id);

            if wait {
                for row in dispatcher.batch().wait_for_completion(&job.job_id).await? {
                    match (&row.response, &row.error) {
                        (Some(response), _) => println!("[{}] {}", row.id, response.text()),
                        (None, Some(error)) => println!("[{}] error: {}", row.id, error),
                        (None, None) => println!("[{}] <empty>", row.id),
                    }
                }
            }
        }
        Command::BatchStatus { job_id } => {
            let job = dispatcher.batch().get_job_status(&job_id).await?;
            println!(
                "{}: {} ({}/{} completed, {} failed, {:.0}%)",
                job.job_id,
                job.status,
                job.completed_count,
                job.total_count,
                job.failed_count,
                job.progress() * 100.0
            );
        }
        Command::BatchCancel { job_id } => {
            dispatcher.batch().cancel_job(&job_id).await?;
            println!("Cancelled {}", job_id);
        }
    }

    Ok(())
}
