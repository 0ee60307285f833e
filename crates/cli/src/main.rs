use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docindex_indexer::{
    ChunkingConfig, ChunkingStrategy, DocIndexConfig, DocIndexService, EmbeddingMode,
    IndexerError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "docindex")]
#[command(about = "Document collections with exact vector search", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML config file (overrides DOCINDEX_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides db_file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Override the embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect and delete collections
    #[command(subcommand)]
    Collection(CollectionCommand),

    /// Add, ingest, list and delete documents
    #[command(subcommand)]
    Doc(DocCommand),

    /// Rebuild or check a collection's vector index
    #[command(subcommand)]
    Index(IndexCommand),

    /// Find the documents nearest to a query
    Search(SearchArgs),
}

#[derive(Subcommand)]
enum CollectionCommand {
    /// Create an empty collection
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List collections, newest first
    List,

    /// Show one collection (by id or name)
    Get { collection: String },

    /// Delete a collection with all of its documents
    Delete { collection: String },

    /// Replace a collection's description; omit --description to clear it
    Describe {
        collection: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum DocCommand {
    /// Add one document (text from the argument or stdin)
    Add(DocAddArgs),

    /// Ingest a file or a directory of .txt/.md/.docx/.pdf files
    Ingest(DocIngestArgs),

    /// List documents, newest first
    List {
        collection: String,

        /// Include embedding vectors in the output
        #[arg(long)]
        embeddings: bool,
    },

    /// Show one document
    Get {
        collection: String,
        id: i64,

        #[arg(long)]
        embeddings: bool,
    },

    /// Delete documents by id
    Delete {
        collection: String,

        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Args)]
struct DocAddArgs {
    collection: String,

    /// Document text; read from stdin when omitted
    text: Option<String>,

    /// JSON object stored with the document
    #[arg(long)]
    metadata: Option<String>,

    /// Precomputed embedding as a JSON array of floats
    #[arg(long, conflicts_with = "chunk")]
    embedding: Option<String>,

    /// Split the text into chunks and store one document per chunk
    #[arg(long)]
    chunk: bool,

    #[command(flatten)]
    chunking: ChunkingArgs,
}

#[derive(Args)]
struct DocIngestArgs {
    collection: String,

    /// File or directory
    path: PathBuf,

    /// Only ingest the top level of a directory
    #[arg(long)]
    no_recursive: bool,

    /// Include hidden files and directories
    #[arg(long)]
    include_hidden: bool,

    /// Extra gitignore-style exclusion pattern (repeatable)
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// JSON object merged into every chunk's metadata
    #[arg(long)]
    metadata: Option<String>,

    #[command(flatten)]
    chunking: ChunkingArgs,
}

/// Per-call chunking overrides on top of the configured defaults
#[derive(Args, Default)]
struct ChunkingArgs {
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Paragraph separator regex
    #[arg(long)]
    separator: Option<String>,
}

impl ChunkingArgs {
    /// `None` when no flag was given, so the service falls back to its own config
    fn resolve(&self, base: &ChunkingConfig) -> Option<ChunkingConfig> {
        if self.strategy.is_none()
            && self.chunk_size.is_none()
            && self.chunk_overlap.is_none()
            && self.separator.is_none()
        {
            return None;
        }

        let mut config = base.clone();
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunk_overlap = overlap;
        }
        if let Some(separator) = &self.separator {
            config.separator = Some(separator.clone());
        }
        Some(config)
    }
}

#[derive(Subcommand)]
enum IndexCommand {
    /// Recompute the index from the collection's documents
    Rebuild { collection: String },

    /// Check the stored index against the documents without changing it
    Verify { collection: String },

    /// Show the stored index state
    State { collection: String },
}

#[derive(Args)]
struct SearchArgs {
    collection: String,

    /// Query text, embedded with the configured backend
    #[arg(required_unless_present = "vector")]
    query: Option<String>,

    /// Query embedding as a JSON array of floats
    #[arg(long, conflicts_with = "query")]
    vector: Option<String>,

    /// Number of results
    #[arg(short, long, default_value_t = 5)]
    k: usize,

    #[arg(long)]
    embeddings: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum EmbedMode {
    Stub,
    Http,
}

impl From<EmbedMode> for EmbeddingMode {
    fn from(mode: EmbedMode) -> Self {
        match mode {
            EmbedMode::Stub => Self::Stub,
            EmbedMode::Http => Self::Http,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum StrategyArg {
    NoChunking,
    FixedSize,
    Paragraph,
    Sentence,
}

impl From<StrategyArg> for ChunkingStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::NoChunking => Self::NoChunking,
            StrategyArg::FixedSize => Self::FixedSize,
            StrategyArg::Paragraph => Self::Paragraph,
            StrategyArg::Sentence => Self::Sentence,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error[{}]: {err:#}", error_code(&err));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = DocIndexConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_file = db;
    }
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode.into();
    }

    let service = DocIndexService::open(&config)
        .with_context(|| format!("Failed to open {}", config.db_file.display()))?;
    let output = commands::dispatch(&service, &config, cli.command).await;
    service.shutdown();

    print_json(&output?)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stable code for the failure; errors raised by the CLI itself count as bad input
fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<IndexerError>()
        .map_or("invalid_input", |err| err.kind().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn chunking_flags_override_only_what_is_given() {
        let base = ChunkingConfig::default();
        assert_eq!(ChunkingArgs::default().resolve(&base), None);

        let args = ChunkingArgs {
            strategy: Some(StrategyArg::Sentence),
            chunk_size: Some(300),
            ..ChunkingArgs::default()
        };
        let resolved = args.resolve(&base).unwrap();
        assert_eq!(resolved.strategy, ChunkingStrategy::Sentence);
        assert_eq!(resolved.chunk_size, 300);
        assert_eq!(resolved.chunk_overlap, base.chunk_overlap);
    }

    #[test]
    fn indexer_errors_keep_their_code() {
        let err = anyhow::Error::from(IndexerError::DuplicateName("docs".into()));
        assert_eq!(error_code(&err), "duplicate_name");

        let err = anyhow::anyhow!("metadata must be a JSON object");
        assert_eq!(error_code(&err), "invalid_input");
    }
}
