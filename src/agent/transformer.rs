//! Query transformer: rewrite, decompose and hypothetical-answer generation.
//!
//! All three are pure text transforms backed by one generation call each.
//! None of them fails the caller: malformed or missing output falls back
//! to the input query.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::RagConfig;
use super::prompt::{
    PromptSet, build_decompose_prompt, build_hyde_prompt, build_rewrite_prompt,
};
use super::provider::LlmProvider;
use super::traits::{Agent, strip_code_fence};
use crate::core::query::normalize;
use crate::core::{StandaloneQuery, SubQuery};
use crate::error::ParseError;

/// Leading list markers: `1.`, `2)`, `-`, `*`, `•`.
static LIST_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s*").ok());

/// One transform role: a system prompt plus call settings.
struct TransformAgent {
    name: &'static str,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    json_mode: bool,
    system_prompt: String,
}

#[async_trait]
impl Agent for TransformAgent {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        self.json_mode
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Rewrites and decomposes queries for retrieval.
pub struct QueryTransformer {
    rewriter: TransformAgent,
    decomposer: TransformAgent,
    hyde: TransformAgent,
    max_subqueries: usize,
}

impl QueryTransformer {
    /// Creates a transformer using the reasoning model and the given prompts.
    #[must_use]
    pub fn new(config: &RagConfig, prompts: &PromptSet) -> Self {
        let agent = |name, json_mode, system_prompt: &str| TransformAgent {
            name,
            model: config.reasoning_model.clone(),
            max_tokens: config.reasoning_max_tokens,
            timeout: config.generation_timeout,
            json_mode,
            system_prompt: system_prompt.to_string(),
        };
        Self {
            rewriter: agent("rewriter", true, &prompts.rewrite),
            decomposer: agent("decomposer", true, &prompts.decompose),
            hyde: agent("hyde", false, &prompts.hyde),
            max_subqueries: config.max_subqueries,
        }
    }

    /// Produces one retrieval-friendly version of `query`.
    ///
    /// Returns `query` itself when the call fails or the output is unusable.
    pub async fn rewrite(&self, provider: &dyn LlmProvider, query: &str) -> String {
        let start = Instant::now();
        let result = match self
            .rewriter
            .execute(provider, &build_rewrite_prompt(query))
            .await
        {
            Ok(response) => parse_rewrite(&response.content).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(rewritten) => {
                debug!(
                    original = query,
                    rewritten = %rewritten,
                    elapsed_ms = start.elapsed().as_millis(),
                    "query rewritten"
                );
                rewritten
            }
            Err(error) => {
                warn!(query, error = %error, "rewrite failed, keeping original query");
                query.to_string()
            }
        }
    }

    /// Splits `query` into at most `max_subqueries` sub-queries.
    ///
    /// Always returns at least one sub-query. When the model yields nothing
    /// usable, or only repeats the input, the result is the original query
    /// alone.
    pub async fn decompose(
        &self,
        provider: &dyn LlmProvider,
        query: &StandaloneQuery,
    ) -> Vec<SubQuery> {
        let start = Instant::now();
        let prompt = build_decompose_prompt(query.as_str(), self.max_subqueries);
        let parsed = match self.decomposer.execute(provider, &prompt).await {
            Ok(response) => {
                parse_subquestions(&response.content, self.max_subqueries).map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        let subqueries: Vec<SubQuery> = match parsed {
            Ok(texts) => texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| SubQuery::new(i, text, query))
                .collect(),
            Err(error) => {
                warn!(error = %error, "decomposition failed, using original query");
                Vec::new()
            }
        };

        if subqueries.is_empty() || (subqueries.len() == 1 && subqueries[0].echoes_parent()) {
            return vec![SubQuery::new(0, query.as_str(), query)];
        }

        debug!(
            count = subqueries.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "query decomposed"
        );
        subqueries
    }

    /// Generates a hypothetical answer passage to search with.
    ///
    /// Returns `query` itself when the call fails or returns nothing.
    pub async fn hypothetical_answer(&self, provider: &dyn LlmProvider, query: &str) -> String {
        match self.hyde.execute(provider, &build_hyde_prompt(query)).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => {
                warn!(query, "hypothetical answer empty, searching with the query");
                query.to_string()
            }
            Err(e) => {
                warn!(query, error = %e, "hypothetical answer failed, searching with the query");
                query.to_string()
            }
        }
    }
}

fn unquote(s: &str) -> &str {
    s.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”' || c == '`')
        .trim()
}

fn strip_list_marker(line: &str) -> &str {
    LIST_MARKER
        .as_ref()
        .and_then(|re| re.find(line))
        .map_or(line, |m| &line[m.end()..])
}

/// Extracts the rewritten query from model output.
pub fn parse_rewrite(content: &str) -> Result<String, ParseError> {
    let body = strip_code_fence(content);

    let candidate = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["rewritten_query", "query", "rewrite"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(|s| unquote(s).to_string()),
        Ok(Value::String(s)) => Some(unquote(&s).to_string()),
        _ => body
            .lines()
            .map(|line| {
                let line = line.trim();
                let line = line
                    .split_once(':')
                    .filter(|(label, _)| label.to_lowercase().contains("query"))
                    .map_or(line, |(_, rest)| rest);
                unquote(line)
            })
            .find(|line| !line.is_empty())
            .map(str::to_string),
    };

    candidate
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::Rewrite {
            content: content.to_string(),
        })
}

/// Extracts sub-questions from model output, de-duplicated and capped at `max`.
///
/// Accepts `{"subquestions": [...]}`, a bare JSON array, or a numbered or
/// bulleted list.
pub fn parse_subquestions(content: &str, max: usize) -> Result<Vec<String>, ParseError> {
    let body = strip_code_fence(content);

    let raw: Vec<String> = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["subquestions", "sub_questions", "questions", "subqueries"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(|items| strings(items))
            .unwrap_or_default(),
        Ok(Value::Array(items)) => strings(&items),
        _ => body
            .lines()
            .map(strip_list_marker)
            .map(unquote)
            .filter(|line| !line.ends_with(':'))
            .map(str::to_string)
            .collect(),
    };

    let mut seen = HashSet::new();
    let questions: Vec<String> = raw
        .iter()
        .map(|q| unquote(q))
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(normalize(q)))
        .take(max.max(1))
        .map(str::to_string)
        .collect();

    if questions.is_empty() {
        return Err(ParseError::Decomposition {
            content: content.to_string(),
        });
    }
    Ok(questions)
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedProvider;
    use test_case::test_case;

    fn transformer() -> QueryTransformer {
        let config = RagConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        QueryTransformer::new(&config, &PromptSet::defaults())
    }

    #[test_case(r#"{"rewritten_query": "What is the Kubernetes (k8s) deployment process?"}"# => "What is the Kubernetes (k8s) deployment process?"; "json")]
    #[test_case("Rewritten query: \"explain CI pipeline stages\"" => "explain CI pipeline stages"; "labeled text")]
    #[test_case("\n\nexplain CI pipeline stages\nbecause it is clearer" => "explain CI pipeline stages"; "first line")]
    fn test_parse_rewrite(content: &str) -> String {
        parse_rewrite(content).unwrap_or_default()
    }

    #[test_case(""; "empty")]
    #[test_case(r#"{"rewritten_query": "  "}"#; "blank field")]
    #[test_case(r#"{"other": 1}"#; "missing field")]
    fn test_parse_rewrite_rejects(content: &str) {
        assert!(matches!(parse_rewrite(content), Err(ParseError::Rewrite { .. })));
    }

    #[test_case(r#"{"subquestions": ["What is X?", "What is Y?", "What is Z?"]}"# => 3; "json object")]
    #[test_case(r#"["What is X?", "What is Y?"]"# => 2; "json array")]
    #[test_case("Sub-questions:\n1. What is X?\n2) What is Y?\n- What is Z?" => 3; "numbered list")]
    #[test_case(r#"["What is X?", "what is x", "What is Y?"]"# => 2; "case insensitive dedupe")]
    #[test_case(r#"["a?", "b?", "c?", "d?", "e?"]"# => 3; "capped")]
    fn test_parse_subquestions(content: &str) -> usize {
        parse_subquestions(content, 3).map_or(0, |q| q.len())
    }

    #[test]
    fn test_parse_subquestions_strips_markers() {
        let q = parse_subquestions("1. What is X?\n* \"What is Y?\"", 3).unwrap_or_default();
        assert_eq!(q, vec!["What is X?".to_string(), "What is Y?".to_string()]);
    }

    #[test_case(r#"{"subquestions": []}"#; "empty list")]
    #[test_case("   "; "blank")]
    #[test_case(r#"{"subquestions": ["", "  "]}"#; "blank entries")]
    fn test_parse_subquestions_rejects(content: &str) {
        assert!(matches!(
            parse_subquestions(content, 3),
            Err(ParseError::Decomposition { .. })
        ));
    }

    #[tokio::test]
    async fn test_rewrite_failure_keeps_original() {
        let provider = ScriptedProvider::failing();
        assert_eq!(transformer().rewrite(&provider, "k8s deploy?").await, "k8s deploy?");
    }

    #[tokio::test]
    async fn test_decompose_echo_falls_back_to_original() {
        let provider = ScriptedProvider::fixed(r#"{"subquestions": ["compare x and y?"]}"#);
        let q = StandaloneQuery::new("Compare X and Y");
        let subs = transformer().decompose(&provider, &q).await;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "Compare X and Y");
        assert!(subs[0].echoes_parent());
    }

    #[tokio::test]
    async fn test_decompose_empty_falls_back_to_original() {
        let provider = ScriptedProvider::fixed("[]");
        let q = StandaloneQuery::new("Compare X and Y");
        let subs = transformer().decompose(&provider, &q).await;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].parent, "Compare X and Y");
    }

    #[tokio::test]
    async fn test_decompose_indexes_in_order() {
        let provider =
            ScriptedProvider::fixed(r#"{"subquestions": ["What is X?", "What is Y?", "What is Z?"]}"#);
        let q = StandaloneQuery::new("Compare X and Y, and explain Z");
        let subs = transformer().decompose(&provider, &q).await;
        let indexes: Vec<_> = subs.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(subs[2].text, "What is Z?");
    }

    #[tokio::test]
    async fn test_hypothetical_answer_falls_back() {
        let provider = ScriptedProvider::fixed("  ");
        assert_eq!(
            transformer().hypothetical_answer(&provider, "what is x").await,
            "what is x"
        );
    }
}
