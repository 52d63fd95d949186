// CLI module for gemflow
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gemflow - Gemini requests with key rotation, retries, caching, streaming and batch jobs
#[derive(Parser, Debug)]
#[command(name = "gemflow", version, about, long_about = None)]
pub struct Args {
    /// Config file to use instead of ~/.gemflow/config.toml
    #[arg(long, short, global = true, env = "GEMFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model to use instead of the configured default
    #[arg(long, short, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a complete response for one prompt
    Generate {
        prompt: String,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,

        /// Make a single attempt
        #[arg(long)]
        no_retry: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Stream a response, printing text as it arrives
    Stream { prompt: String },

    /// Submit each prompt as one request of a batch job
    BatchSubmit {
        #[arg(required = true)]
        prompts: Vec<String>,

        /// Poll until the job finishes and print the results
        #[arg(long)]
        wait: bool,
    },

    /// Show the status of a batch job
    BatchStatus { job_id: String },

    /// Cancel a batch job
    BatchCancel { job_id: String },
}
