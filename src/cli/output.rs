//! Output formatting for CLI commands.

use std::fmt::Write;
use std::path::PathBuf;

use serde_json::json;

use crate::agent::pipeline::Answer;
use crate::core::Strategy;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, defaulting to text for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Formats an answer with a provenance footer.
#[must_use]
pub fn format_answer(answer: &Answer, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(answer),
        OutputFormat::Text => {
            let meta = &answer.retrieval.metadata;
            let mut out = answer.answer.clone();
            out.push_str("\n\n---\n");
            let _ = writeln!(out, "Query: {}", answer.standalone_query);
            let _ = write!(
                out,
                "Strategy: {} (classified {}/{}{}) | Sub-queries: {}/{} ok | Documents: {} | Time: {:.1}s",
                meta.strategy_used,
                meta.decision.complexity,
                meta.decision.strategy,
                if meta.decision.defaulted { ", defaulted" } else { "" },
                meta.successful_subqueries,
                meta.subquery_count,
                answer.retrieval.documents.len(),
                meta.elapsed.as_secs_f64(),
            );
            if let Some(rewritten) = &meta.rewritten_query
                && rewritten != answer.standalone_query.as_str()
            {
                let _ = write!(out, "\nSearched: {rewritten}");
            }
            if meta.subqueries.len() > 1 {
                for (i, sub) in meta.subqueries.iter().enumerate() {
                    let status = sub
                        .error
                        .as_deref()
                        .map_or_else(|| format!("{} hits", sub.hits), |e| format!("failed: {e}"));
                    let _ = write!(out, "\n  {}. {} ({status})", i + 1, sub.text);
                }
            }
            let sources: Vec<&str> = answer
                .retrieval
                .documents
                .iter()
                .map(|d| d.source())
                .filter(|s| !s.is_empty())
                .collect();
            if !sources.is_empty() {
                let _ = write!(out, "\nSources: {}", sources.join(", "));
            }
            out
        }
    }
}

/// Formats the strategy catalogue.
#[must_use]
pub fn format_strategies(format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let list: Vec<_> = Strategy::ALL
                .iter()
                .map(|s| {
                    json!({
                        "name": s.as_str(),
                        "complexity": s.complexity().as_str(),
                        "description": s.description(),
                    })
                })
                .collect();
            to_json(&json!({ "strategies": list }))
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for s in Strategy::ALL {
                let _ = writeln!(out, "{:<10} {}", s.as_str(), s.description());
            }
            out.trim_end().to_string()
        }
    }
}

/// Formats the result of `init-prompts`.
#[must_use]
pub fn format_written_prompts(dir: &std::path::Path, written: &[PathBuf], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&json!({
            "directory": dir.display().to_string(),
            "written": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            if written.is_empty() {
                format!("All prompt templates already exist in {}", dir.display())
            } else {
                let mut out = format!("Wrote {} prompt template(s) to {}:", written.len(), dir.display());
                for path in written {
                    let _ = write!(out, "\n  {}", path.display());
                }
                out
            }
        }
    }
}
