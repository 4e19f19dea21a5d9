//! CLI command implementations.
//!
//! Every command returns its output as a string; the binary prints it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::client::create_provider;
use crate::agent::config::RagConfig;
use crate::agent::pipeline::{AskOptions, RagPipeline};
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_answer, format_strategies, format_written_prompts};
use crate::cli::parser::{Cli, Commands, SourceArgs};
use crate::core::Strategy;
use crate::error::{CommandError, ConfigError, Result};
use crate::memory::InMemoryStore;
use crate::retrieval::{HttpVectorStore, InMemoryVectorStore, SearchMode, VectorStore};
use crate::server::{self, AppState};

/// Session used by one-shot `ask` invocations.
const CLI_SESSION: &str = "cli";

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Serve { addr, source } => cmd_serve(addr, source),
        Commands::Ask {
            question,
            strategy,
            source,
        } => cmd_ask(question, strategy.as_deref(), source, format),
        Commands::Strategies => Ok(format_strategies(format)),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "mcp")]
        Commands::Mcp { source } => cmd_mcp(source),
    }
}

/// Resolves configuration: CLI flags first, then environment, then defaults.
fn build_config(source: &SourceArgs) -> Result<RagConfig> {
    let mut builder = RagConfig::builder();
    if let Some(path) = &source.corpus {
        builder = builder.corpus_path(path);
    }
    if let Some(url) = &source.vector_store_url {
        builder = builder.vector_store_url(url);
    }
    if let Some(dir) = &source.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(k) = source.top_k {
        builder = builder.top_k(k);
    }
    if let Some(mode) = &source.search_mode {
        builder = builder.search_mode(mode.parse::<SearchMode>()?);
    }
    if source.compress {
        builder = builder.compress_documents(true);
    }
    Ok(builder.from_env().build()?)
}

/// Opens the configured vector store. A corpus file takes precedence.
fn build_store(config: &RagConfig) -> Result<Arc<dyn VectorStore>> {
    if let Some(path) = &config.corpus_path {
        return Ok(Arc::new(InMemoryVectorStore::load(path)?));
    }
    if let Some(url) = &config.vector_store_url {
        let store = HttpVectorStore::new(url);
        info!(endpoint = store.endpoint(), "using external vector store");
        return Ok(Arc::new(store));
    }
    Err(ConfigError::NoVectorStore.into())
}

fn build_pipeline(config: &RagConfig) -> Result<Arc<RagPipeline>> {
    let store = build_store(config)?;
    let provider = Arc::from(create_provider(config)?);
    let memory =
        Arc::new(InMemoryStore::new(config.memory_retention).with_max_sessions(config.max_sessions));
    Ok(Arc::new(RagPipeline::new(provider, store, memory, config)))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn parse_strategy(label: &str) -> Result<Strategy> {
    Strategy::parse(label).ok_or_else(|| {
        CommandError::InvalidInput(format!(
            "unknown strategy {label:?} (expected one of: direct, rewrite, decompose, hyde)"
        ))
        .into()
    })
}

fn cmd_ask(
    question: &str,
    strategy: Option<&str>,
    source: &SourceArgs,
    format: OutputFormat,
) -> Result<String> {
    let strategy = strategy.map(parse_strategy).transpose()?;
    let config = build_config(source)?;
    let pipeline = build_pipeline(&config)?;

    let answer = runtime()?.block_on(pipeline.answer(
        CLI_SESSION,
        question,
        AskOptions {
            clear_history: false,
            strategy,
        },
    ))?;

    Ok(format_answer(&answer, format))
}

fn cmd_serve(addr: &str, source: &SourceArgs) -> Result<String> {
    let config = build_config(source)?;
    let pipeline = build_pipeline(&config)?;
    let state = AppState::new(pipeline, config.request_timeout);

    runtime()?
        .block_on(async {
            let shutdown = CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("shutdown requested");
                        trigger.cancel();
                    }
                    Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
                }
            });
            server::serve(state, addr, shutdown).await
        })
        .map_err(|e| CommandError::ExecutionFailed(format!("HTTP server error: {e}")))?;

    Ok(String::new())
}

fn cmd_init_prompts(dir: Option<&std::path::Path>, format: OutputFormat) -> Result<String> {
    let dir = dir
        .map(std::path::Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "cannot determine the home directory; pass --dir".to_string(),
            )
        })?;
    let written = PromptSet::write_defaults(&dir)?;
    Ok(format_written_prompts(&dir, &written, format))
}

#[cfg(feature = "mcp")]
fn cmd_mcp(source: &SourceArgs) -> Result<String> {
    use crate::mcp::{RagMcpServer, serve_stdio};

    let config = build_config(source)?;
    let server = RagMcpServer::new(build_pipeline(&config)?);

    runtime()?
        .block_on(serve_stdio(server))
        .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, RetrievalError};
    use tempfile::TempDir;

    fn config() -> crate::agent::config::RagConfigBuilder {
        RagConfig::builder().api_key("test")
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(parse_strategy("hyde").ok(), Some(Strategy::Hyde));
        assert!(matches!(
            parse_strategy("telepathy"),
            Err(Error::Command(CommandError::InvalidInput(_)))
        ));
    }

    #[test]
    fn test_ask_rejects_unknown_strategy_before_any_setup() {
        let result = cmd_ask(
            "What is X?",
            Some("telepathy"),
            &SourceArgs::default(),
            OutputFormat::Text,
        );
        assert!(matches!(result, Err(Error::Command(CommandError::InvalidInput(_)))));
    }

    #[test]
    fn test_build_store_requires_a_source() {
        let config = config().build().unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            build_store(&config),
            Err(Error::Config(ConfigError::NoVectorStore))
        ));
    }

    #[test]
    fn test_build_store_loads_corpus() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("docs.json");
        std::fs::write(
            &path,
            r#"[{"content": "B retries 3 times", "metadata": {"source": "b.md"}}]"#,
        )
        .unwrap_or_else(|_| unreachable!());
        let config = config()
            .corpus_path(&path)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let store = build_store(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_build_store_reports_bad_corpus() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("docs.json");
        std::fs::write(&path, "not json").unwrap_or_else(|_| unreachable!());
        let config = config()
            .corpus_path(&path)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            build_store(&config),
            Err(Error::Retrieval(RetrievalError::Corpus { .. }))
        ));
    }

    #[test]
    fn test_build_store_http() {
        let config = config()
            .vector_store_url("http://localhost:7700/")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let store = build_store(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(store.name(), "http");
    }

    #[test]
    fn test_invalid_search_mode() {
        let source = SourceArgs {
            search_mode: Some("fuzzy".to_string()),
            ..SourceArgs::default()
        };
        assert!(matches!(
            build_config(&source),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_init_prompts_writes_once() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let first = cmd_init_prompts(Some(dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(first.starts_with("Wrote 7 prompt template(s)"));
        let second = cmd_init_prompts(Some(dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(second.starts_with("All prompt templates already exist"));
    }
}
