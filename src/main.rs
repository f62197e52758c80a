//! # RFP Compliance CLI (`rfp`)
//!
//! The `rfp` binary drives the whole pipeline: ingesting the product manual
//! and the requirements table into a persistent index, answering RFP
//! prompts against it, and maintaining the response history.
//!
//! ## Usage
//!
//! ```bash
//! rfp --config ./config/rfp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rfp ingest` | Refresh empty caches, then build or reopen the index |
//! | `rfp reparse` | Empty both caches and rebuild everything |
//! | `rfp evaluate <csv>` | Answer every prompt of a CSV file and score the batch |
//! | `rfp ask "<prompt>"` | Answer one prompt |
//! | `rfp phrase "<requirement>"` | Show how a requirement row is phrased |
//! | `rfp verdict "<answer>"` | Classify an answer as Yes / No / N/A |
//! | `rfp history show\|clear` | Print or truncate the history file |
//! | `rfp responses prune` | Delete old per-session response files |
//! | `rfp stats` | Index statistics |
//! | `rfp status` | Cache and index state, and what the next ingest does |
//!
//! ## Examples
//!
//! ```bash
//! # First run: crawl the manual, pull the requirements table, build the index
//! rfp ingest
//!
//! # Answer a batch of prompts, with JSON progress on stderr
//! rfp evaluate rfps/rfps.csv --progress json
//!
//! # Force a full refresh after the manual changed
//! rfp reparse
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use rfp_compliance::config::{self, Config};
use rfp_compliance::phrase::{self, LexiconTagger};
use rfp_compliance::progress::ProgressMode;
use rfp_compliance::{evaluate, history, ingest, logging, sources, stats, verdict};

/// RFP Compliance: yes/no answers to RFP requirements, grounded in the
/// product manual.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "rfp",
    about = "RFP Compliance: retrieval-augmented yes/no answers to RFP requirements",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rfp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh empty caches, then build or reopen the index.
    ///
    /// A source is only fetched when its cache file is empty or missing.
    /// Any refresh wipes the index storage so the index is rebuilt.
    Ingest,

    /// Empty both caches, re-fetch both sources and rebuild the index.
    Reparse,

    /// Answer every prompt of a CSV file and report a compliance score.
    ///
    /// The first column of each row (after the header) is a prompt.
    /// Results go to a new file under the responses directory and are
    /// appended to the history file.
    Evaluate {
        /// CSV file of prompts.
        csv: PathBuf,

        /// Skip prompts whose model call fails instead of aborting.
        #[arg(long)]
        keep_going: bool,

        /// Progress output on stderr.
        #[arg(long, value_enum, default_value = "auto")]
        progress: ProgressArg,
    },

    /// Answer a single prompt and print the answer, verdict and sources.
    Ask {
        /// The requirement, phrased as it follows "Does <product> ...".
        prompt: String,
    },

    /// Phrase a requirement the way ingestion does.
    Phrase {
        requirement: String,

        /// Treat the row as opted in.
        #[arg(long)]
        opt_in: bool,
    },

    /// Classify an answer text.
    Verdict { answer: String },

    /// Show or clear the history file.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Maintain per-session response files.
    Responses {
        #[command(subcommand)]
        action: ResponsesAction,
    },

    /// Show index statistics.
    Stats,

    /// Show the state of both caches and the index storage.
    Status,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print the history file.
    Show,
    /// Truncate the history file.
    Clear,
}

#[derive(Subcommand)]
enum ResponsesAction {
    /// Delete every response file except the history.
    Prune {
        /// File name to keep as well.
        #[arg(long)]
        keep: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Auto,
    Human,
    Json,
    Off,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

/// Load the config file, or fall back to defaults when it does not exist.
fn resolve_config(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    // Commands that only need the product name
    match &cli.command {
        Commands::Verdict { answer } => {
            println!("{}", verdict::extract(answer));
            return Ok(());
        }
        Commands::Phrase {
            requirement,
            opt_in,
        } => {
            let cfg = resolve_config(&cli.config)?;
            let tagger = LexiconTagger::new();
            println!(
                "{}",
                phrase::phrase(&tagger, &cfg.product.name, requirement, *opt_in)
            );
            return Ok(());
        }
        _ => {}
    }

    let cfg = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => {
            ingest::run_ingest(&cfg, false).await?;
        }
        Commands::Reparse => {
            ingest::run_ingest(&cfg, true).await?;
        }
        Commands::Evaluate {
            csv,
            keep_going,
            progress,
        } => {
            evaluate::run_evaluate(&cfg, &csv, keep_going, progress.mode()).await?;
        }
        Commands::Ask { prompt } => {
            evaluate::run_ask(&cfg, &prompt).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::Show => history::run_history_show(&cfg.paths.history_file())?,
            HistoryAction::Clear => history::run_history_clear(&cfg.paths.history_file())?,
        },
        Commands::Responses {
            action: ResponsesAction::Prune { keep },
        } => {
            history::run_responses_prune(&cfg.paths.responses_dir, keep.as_deref())?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Status => {
            sources::run_status(&cfg)?;
        }
        Commands::Verdict { .. } | Commands::Phrase { .. } => {}
    }

    Ok(())
}
