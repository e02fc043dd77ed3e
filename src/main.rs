use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docrag::Result;
use docrag::commands::{ask, ask_file, clear, forget, ingest, ingest_url, list, search, show_config};

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "A RAG document pipeline with vector search and grounded answering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a local file (.pdf, .txt, .md) into the database
    Ingest {
        /// Path of the file to ingest
        path: PathBuf,
    },
    /// Fetch a web page and ingest its text content
    IngestUrl {
        /// URL of the page to ingest
        url: String,
    },
    /// Ask a question answered from the ingested documents
    Ask {
        /// The question to answer
        question: String,
        /// Restrict retrieval to one source file
        #[arg(long)]
        file: Option<String>,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Ask a question about a single file without ingesting it permanently
    AskFile {
        /// Path of the file to question
        path: PathBuf,
        /// The question to answer
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Search the ingested documents without calling the language model
    Search {
        /// The search query
        query: String,
        /// Restrict retrieval to one source file
        #[arg(long)]
        file: Option<String>,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List ingested sources and their chunk counts
    List,
    /// Delete every stored chunk of one source
    Forget {
        /// Source identifier as shown by 'docrag list'
        source: String,
    },
    /// Delete all stored documents
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { path } => {
            ingest(&path).await?;
        }
        Commands::IngestUrl { url } => {
            ingest_url(&url).await?;
        }
        Commands::Ask {
            question,
            file,
            top_k,
        } => {
            ask(&question, top_k, file.as_deref()).await?;
        }
        Commands::AskFile {
            path,
            question,
            top_k,
        } => {
            ask_file(&path, &question, top_k).await?;
        }
        Commands::Search {
            query,
            file,
            top_k,
        } => {
            search(&query, top_k, file.as_deref()).await?;
        }
        Commands::List => {
            list().await?;
        }
        Commands::Forget { source } => {
            forget(&source).await?;
        }
        Commands::Clear { yes } => {
            clear(yes).await?;
        }
        Commands::Config => {
            show_config()?;
        }
    }

    Ok(())
}
