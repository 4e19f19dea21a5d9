//! Retrieval strategy selector.
//!
//! Asks the reasoning model how complex a query is and which retrieval
//! path it recommends, then maps the answer onto [`StrategyDecision`].
//! Classification never fails a request: output that cannot be read
//! degrades to the direct path.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::RagConfig;
use super::prompt::build_classify_prompt;
use super::provider::LlmProvider;
use super::traits::{Agent, strip_code_fence};
use crate::core::{Complexity, StandaloneQuery, Strategy, StrategyDecision};
use crate::error::ParseError;

/// Agent that picks a retrieval strategy for a query.
pub struct Classifier {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    system_prompt: String,
}

impl Classifier {
    /// Creates a classifier with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &RagConfig, system_prompt: String) -> Self {
        Self {
            model: config.reasoning_model.clone(),
            max_tokens: config.reasoning_max_tokens,
            timeout: config.generation_timeout,
            system_prompt,
        }
    }

    /// Classifies `query`, falling back to [`StrategyDecision::fallback`]
    /// when the model fails or its answer cannot be parsed.
    pub async fn classify(
        &self,
        provider: &dyn LlmProvider,
        query: &StandaloneQuery,
    ) -> StrategyDecision {
        let start = Instant::now();
        let response = match self
            .execute(provider, &build_classify_prompt(query.as_str()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "classification call failed, defaulting to direct");
                return StrategyDecision::fallback();
            }
        };

        match parse_decision(&response.content) {
            Ok(decision) => {
                debug!(
                    complexity = %decision.complexity,
                    strategy = %decision.strategy,
                    elapsed_ms = start.elapsed().as_millis(),
                    "query classified"
                );
                decision
            }
            Err(e) => {
                warn!(error = %e, "classification unparseable, defaulting to direct");
                StrategyDecision::fallback()
            }
        }
    }
}

/// Reads a complexity label and a strategy label from model output.
///
/// JSON objects are read by field name; anything else is scanned word by
/// word for the first label of each kind.
pub fn parse_decision(content: &str) -> Result<StrategyDecision, ParseError> {
    let body = strip_code_fence(content);

    let (complexity, strategy) = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            let field = |names: &[&str]| {
                names
                    .iter()
                    .find_map(|n| map.get(*n).and_then(Value::as_str))
                    .map(str::to_string)
            };
            (
                field(&["complexity"]).and_then(|s| Complexity::parse(&s)),
                field(&["recommended_strategy", "strategy"]).and_then(|s| Strategy::parse(&s)),
            )
        }
        _ => scan_labels(body),
    };

    resolve(complexity, strategy).ok_or_else(|| ParseError::Classification {
        content: content.to_string(),
    })
}

fn scan_labels(text: &str) -> (Option<Complexity>, Option<Strategy>) {
    let words = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .filter(|w| !w.is_empty());
    let mut complexity = None;
    let mut strategy = None;
    for word in words {
        if complexity.is_none() {
            complexity = Complexity::parse(word);
        }
        if strategy.is_none() {
            strategy = strategy_word(word);
        }
        if complexity.is_some() && strategy.is_some() {
            break;
        }
    }
    (complexity, strategy)
}

/// A strategy named by its own vocabulary.
///
/// Complexity words also parse as strategies, so they are skipped here;
/// otherwise `complex ... rewrite` would read as two agreeing labels.
fn strategy_word(word: &str) -> Option<Strategy> {
    if Complexity::parse(word).is_some() {
        return None;
    }
    Strategy::parse(word).filter(|s| *s != Strategy::Hyde)
}

/// Combines the two signals. When they disagree the cheaper path wins.
fn resolve(complexity: Option<Complexity>, strategy: Option<Strategy>) -> Option<StrategyDecision> {
    let strategy = strategy.filter(|s| *s != Strategy::Hyde);
    let chosen = match (complexity, strategy) {
        (None, None) => return None,
        (Some(c), None) => c.strategy(),
        (None, Some(s)) => s,
        (Some(c), Some(s)) if c.strategy() == s => {
            return Some(StrategyDecision::new(c, s));
        }
        (Some(c), Some(s)) => c.strategy().min(s),
    };
    Some(StrategyDecision::new(chosen.complexity(), chosen))
}

#[async_trait]
impl Agent for Classifier {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
