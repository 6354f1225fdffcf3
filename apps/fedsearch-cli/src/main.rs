use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fedsearch_algolia::Algolia;
use fedsearch_core::schema::BackendFamily;
use fedsearch_core::schema_loader::load_schema;
use fedsearch_core::{Config, Fields, SearchProvider};
use fedsearch_meili::Meilisearch;

#[derive(Parser)]
#[command(name = "fedsearch")]
#[command(about = "Run declarative and federated searches against Meilisearch or Algolia")]
struct Cli {
    #[arg(long, short, global = true, default_value = "meili", value_enum)]
    backend: Backend,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Meili,
    Algolia,
}

impl Backend {
    fn family(self) -> BackendFamily {
        match self {
            Backend::Meili => BackendFamily::Meilisearch,
            Backend::Algolia => BackendFamily::Algolia,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Search(SearchCommand),
    /// Print the capability schema loaded from a settings directory
    Schema { dir: PathBuf },
}

#[derive(Subcommand)]
enum SearchCommand {
    /// Plain query against one index
    Query {
        index: String,
        #[arg(default_value = "")]
        text: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Declarative single-index search; payload file or `-` for stdin
    Search { payload: PathBuf },
    /// Declarative multi-index search; payload file or `-` for stdin
    Multi { payload: PathBuf },
}

fn read_payload(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading payload from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("reading payload {}", path.display()))?
    };
    serde_json::from_str(&text).context("payload is not valid JSON")
}

async fn run<P: SearchProvider + ?Sized>(provider: &P, command: SearchCommand) -> Result<()> {
    let hits = match command {
        SearchCommand::Query { index, text, limit } => provider.search(&index, &text, &Fields::new(), limit).await?,
        SearchCommand::Search { payload } => provider.search_from_json(&read_payload(&payload)?).await?,
        SearchCommand::Multi { payload } => provider.multi_search_from_json(&read_payload(&payload)?).await?,
    };
    info!(backend = provider.name(), hits = hits.len(), "search complete");
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_writer(io::stderr).with_env_filter(filter).init();

    let cli = Cli::parse();

    let command = match cli.command {
        Command::Schema { dir } => {
            let schema = load_schema(&dir, cli.backend.family());
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }
        Command::Search(command) => command,
    };

    let config = Config::load().context("loading configuration")?;
    match cli.backend {
        Backend::Meili => run(&Meilisearch::from_config(config)?, command).await,
        Backend::Algolia => run(&Algolia::from_config(config)?, command).await,
    }
}
