use std::path::{Path, PathBuf};

use anyhow::Result;
use ask_pdf::chunking::SplitterStrategy;
use ask_pdf::commands::{
    ask_document, forget_namespace, index_document, list_namespaces, show_usage,
};
use ask_pdf::config::{Config, get_config_dir, run_interactive_config, show_config};
use ask_pdf::index::VectorStoreKind;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ask-pdf")]
#[command(about = "Ask questions about a PDF using local embeddings and retrieval-augmented answers")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, persisted embeddings and the usage ledger
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Per-run overrides of the configuration file
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Text splitter used to chunk the document
    #[arg(long, value_enum)]
    splitter: Option<SplitterStrategy>,
    /// Where embeddings are kept
    #[arg(long, value_enum)]
    store: Option<VectorStoreKind>,
    /// Passages retrieved per question
    #[arg(long)]
    top_k: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(splitter) = self.splitter {
            config.chunking.strategy = splitter;
        }
        if let Some(store) = self.store {
            config.index.vector_store = store;
        }
        if let Some(top_k) = self.top_k {
            config.responder.top_k = top_k;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk and embed a PDF
    Index {
        /// PDF file to index
        pdf: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Ask a question about a PDF, or several interactively
    Ask {
        /// PDF file to ask about
        pdf: PathBuf,
        /// Question to answer; prompts repeatedly when omitted
        question: Option<String>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// List documents with persisted embeddings
    List,
    /// Delete the persisted embeddings of a document
    Forget {
        /// Namespace, as shown by `list`
        name: String,
    },
    /// Show token usage and estimated cost of answered questions
    Usage,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load(&config_dir)?);
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Index { pdf, overrides } => {
            let config = load_config(&config_dir, &overrides)?;
            index_document(&config, &pdf).await?;
        }
        Commands::Ask {
            pdf,
            question,
            overrides,
        } => {
            let config = load_config(&config_dir, &overrides)?;
            ask_document(&config, &pdf, question).await?;
        }
        Commands::List => {
            list_namespaces(&Config::load(&config_dir)?).await?;
        }
        Commands::Forget { name } => {
            forget_namespace(&Config::load(&config_dir)?, &name).await?;
        }
        Commands::Usage => {
            show_usage(&Config::load(&config_dir)?).await?;
        }
    }

    Ok(())
}

fn load_config(config_dir: &Path, overrides: &Overrides) -> Result<Config> {
    let mut config = Config::load(config_dir)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
