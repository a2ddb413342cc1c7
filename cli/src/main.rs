//! Controls CLI Entry Point
//!
//! Extracts validation controls from a spreadsheet XML export, builds the
//! semantic index over them and queries it.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use control_index::embedding::DEFAULT_MODEL;
use control_index::{ControlFilter, EmbeddingConfig, IndexConfig};

#[derive(Parser, Debug)]
#[command(name = "controls")]
#[command(about = "Extract validation controls and search them semantically")]
#[command(version)]
struct Args {
    #[command(flatten)]
    index: IndexArgs,

    #[command(subcommand)]
    command: Command,
}

/// Storage and model options shared by every command
#[derive(clap::Args, Debug)]
struct IndexArgs {
    /// Index storage directory
    #[arg(long, global = true, default_value = "controls_db")]
    db: PathBuf,

    /// Collection name inside the storage directory
    #[arg(long, global = true, default_value = "controls")]
    collection: String,

    /// Embedding model name
    #[arg(long, global = true, default_value = DEFAULT_MODEL)]
    model: String,

    /// Model cache directory (default: $CONTROLS_MODELS_PATH or ~/.controls/models)
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Entries written per storage chunk
    #[arg(long, global = true, default_value_t = 100)]
    chunk_size: usize,

    /// Texts per embedding batch
    #[arg(long, global = true, default_value_t = 32)]
    batch_size: usize,
}

impl IndexArgs {
    fn embedding_config(&self) -> EmbeddingConfig {
        let config = EmbeddingConfig {
            show_download_progress: true,
            ..EmbeddingConfig::default()
        }
        .with_model(&self.model)
        .with_batch_size(self.batch_size);

        match &self.models_dir {
            Some(dir) => config.with_cache_dir(dir),
            None => config,
        }
    }

    fn index_config(&self) -> IndexConfig {
        IndexConfig::default()
            .with_db_path(&self.db)
            .with_collection(&self.collection)
            .with_chunk_size(self.chunk_size)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the controls found in an XML export
    Extract {
        /// Spreadsheet XML export
        #[arg(default_value = "Template.xml")]
        xml: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract controls and rebuild the index from them
    Build {
        /// Spreadsheet XML export
        #[arg(default_value = "Template.xml")]
        xml: PathBuf,
    },

    /// Find the controls closest to a text query
    Search {
        query: String,

        /// Number of results
        #[arg(long, short = 'k', default_value_t = 10)]
        top_k: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the number of indexed controls
    Count,
}

/// Filters for `extract`
#[derive(clap::Args, Debug, Default)]
struct FilterArgs {
    /// Identifier contains
    #[arg(long)]
    identifier: Option<String>,

    /// Name contains
    #[arg(long)]
    name: Option<String>,

    /// URI contains
    #[arg(long)]
    uri: Option<String>,

    /// Table code contains
    #[arg(long)]
    table_code: Option<String>,

    /// Taxonomy contains
    #[arg(long)]
    taxonomy: Option<String>,

    /// Market contains
    #[arg(long)]
    market: Option<String>,

    /// Required flag (yes/no)
    #[arg(long, value_parser = parse_yes_no)]
    required: Option<bool>,

    /// Correction-available flag (yes/no)
    #[arg(long, value_parser = parse_yes_no)]
    correction_available: Option<bool>,

    /// Approval flag (yes/no)
    #[arg(long, value_parser = parse_yes_no)]
    approval: Option<bool>,
}

impl FilterArgs {
    fn to_filter(&self) -> ControlFilter {
        ControlFilter {
            identifier: self.identifier.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            uri: self.uri.clone().unwrap_or_default(),
            table_code: self.table_code.clone().unwrap_or_default(),
            taxonomy: self.taxonomy.clone().unwrap_or_default(),
            market: self.market.clone().unwrap_or_default(),
            required: self.required,
            correction_available: self.correction_available,
            approval: self.approval,
        }
    }
}

fn parse_yes_no(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        other => control_index::parse_flag(other)
            .ok_or_else(|| format!("expected yes/no (or да/нет), got {:?}", value)),
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "control_index=info,controls=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = commands::run(args) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
