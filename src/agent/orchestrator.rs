//! Adaptive retrieval orchestrator.
//!
//! Decides per query how much retrieval work to do:
//!
//! ```text
//! StandaloneQuery → Classifier
//!   ├── direct    → 1 search with the query
//!   ├── rewrite   → rewrite → 1 search
//!   ├── hyde      → hypothetical answer → 1 search (override only)
//!   └── decompose → N sub-queries, concurrently: rewrite → search
//!                   → merge in sub-query order → de-duplicate → rank
//!   (optional) → compress each document to its relevant passages
//! ```
//!
//! Store failures are contained per sub-query; the orchestrator always
//! returns a [`RetrievalResult`], possibly empty.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::classifier::Classifier;
use super::compressor::DocumentCompressor;
use super::config::RagConfig;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::transformer::QueryTransformer;
use crate::core::{
    RetrievalMetadata, RetrievalResult, RetrievedDocument, ScoredDocument, StandaloneQuery,
    Strategy, StrategyDecision, SubQuery, SubQueryReport, merge_ranked,
};
use crate::error::RetrievalError;
use crate::retrieval::{SearchMode, VectorStore};

/// Search settings shared by every store call of one retrieval.
#[derive(Debug, Clone, Copy)]
struct SearchSettings {
    mode: SearchMode,
    timeout: Duration,
}

/// Outcome of one search, ready to be merged.
struct Branch {
    report: SubQueryReport,
    documents: Vec<RetrievedDocument>,
}

/// Runs classification, query transformation and retrieval for one query.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn VectorStore>,
    classifier: Classifier,
    transformer: Arc<QueryTransformer>,
    compressor: Option<DocumentCompressor>,
    config: RagConfig,
}

impl Orchestrator {
    /// Creates an orchestrator over the given provider and store.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            provider,
            store,
            classifier: Classifier::new(config, prompts.classify.clone()),
            transformer: Arc::new(QueryTransformer::new(config, prompts)),
            compressor: config
                .compress_documents
                .then(|| DocumentCompressor::new(config, prompts.compress.clone())),
            config: config.clone(),
        }
    }

    /// Classifies `query` and runs the recommended strategy.
    pub async fn adaptive_retrieve(&self, query: &StandaloneQuery) -> RetrievalResult {
        self.retrieve(query, None).await
    }

    /// Runs `strategy` when given, otherwise the classifier's recommendation.
    ///
    /// A forced strategy skips classification entirely.
    pub async fn retrieve(
        &self,
        query: &StandaloneQuery,
        strategy: Option<Strategy>,
    ) -> RetrievalResult {
        let start = Instant::now();
        let decision = match strategy {
            Some(s) => StrategyDecision::forced(s),
            None => self.classifier.classify(&*self.provider, query).await,
        };

        let mut result = match decision.strategy {
            Strategy::Direct => self.single(query, decision, Strategy::Direct, None).await,
            Strategy::Rewrite => {
                let rewritten = self.transformer.rewrite(&*self.provider, query.as_str()).await;
                self.single(query, decision, Strategy::Rewrite, Some(rewritten))
                    .await
            }
            Strategy::Hyde => {
                let passage = self
                    .transformer
                    .hypothetical_answer(&*self.provider, query.as_str())
                    .await;
                self.single(query, decision, Strategy::Hyde, Some(passage))
                    .await
            }
            Strategy::Decompose => self.decompose(query, decision).await,
        };

        if let Some(compressor) = &self.compressor
            && !result.documents.is_empty()
        {
            let documents = std::mem::take(&mut result.documents);
            let (documents, report) = compressor
                .compress_all(&*self.provider, query.as_str(), documents)
                .await;
            result.documents = documents;
            result.metadata.compression = Some(report);
        }

        result.metadata.elapsed = start.elapsed();
        info!(
            strategy = %result.metadata.strategy_used,
            subqueries = result.metadata.subquery_count,
            successful = result.metadata.successful_subqueries,
            documents = result.documents.len(),
            elapsed_ms = result.metadata.elapsed.as_millis(),
            "retrieval complete"
        );
        result
    }

    fn settings(&self) -> SearchSettings {
        SearchSettings {
            mode: self.config.search_mode,
            timeout: self.config.retrieval_timeout,
        }
    }

    /// One search, with the query itself or a transformed search text.
    async fn single(
        &self,
        query: &StandaloneQuery,
        decision: StrategyDecision,
        strategy_used: Strategy,
        search_text: Option<String>,
    ) -> RetrievalResult {
        let text = search_text.clone().unwrap_or_else(|| query.as_str().to_string());
        let branch = run_search(
            &*self.store,
            0,
            query.as_str(),
            text,
            self.config.top_k,
            self.settings(),
        )
        .await;

        let successful = usize::from(branch.report.succeeded());
        RetrievalResult {
            documents: merge_ranked(branch.documents),
            metadata: RetrievalMetadata {
                decision,
                strategy_used,
                subquery_count: 1,
                successful_subqueries: successful,
                subqueries: vec![branch.report],
                rewritten_query: search_text,
                decomposition_fallback: false,
                compression: None,
                elapsed: Duration::ZERO,
            },
        }
    }

    async fn decompose(&self, query: &StandaloneQuery, decision: StrategyDecision) -> RetrievalResult {
        let subqueries = self.transformer.decompose(&*self.provider, query).await;

        if subqueries.len() == 1 && subqueries[0].echoes_parent() {
            debug!("decomposition produced no new sub-queries, running direct search");
            let mut result = self.single(query, decision, Strategy::Direct, None).await;
            result.metadata.decomposition_fallback = true;
            return result;
        }

        let per_k = self.config.per_subquery_k(subqueries.len());
        let branches = self.fan_out(&subqueries, per_k).await;

        let subquery_count = branches.len();
        let successful = branches.iter().filter(|b| b.report.succeeded()).count();
        if successful == 0 {
            warn!(subquery_count, "every sub-query retrieval failed");
        }

        let mut reports = Vec::with_capacity(subquery_count);
        let mut collected = Vec::new();
        for branch in branches {
            reports.push(branch.report);
            collected.extend(branch.documents);
        }

        let mut documents = merge_ranked(collected);
        documents.truncate(self.config.top_k.max(per_k));

        RetrievalResult {
            documents,
            metadata: RetrievalMetadata {
                decision,
                strategy_used: Strategy::Decompose,
                subquery_count,
                successful_subqueries: successful,
                subqueries: reports,
                rewritten_query: None,
                decomposition_fallback: false,
                compression: None,
                elapsed: Duration::ZERO,
            },
        }
    }

    /// Rewrites and searches every sub-query concurrently.
    ///
    /// Each task owns its buffer; buffers come back in sub-query order.
    async fn fan_out(&self, subqueries: &[SubQuery], k: usize) -> Vec<Branch> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let settings = self.settings();

        let mut handles = Vec::with_capacity(subqueries.len());
        for sub in subqueries {
            let sem = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let store = Arc::clone(&self.store);
            let transformer = Arc::clone(&self.transformer);
            let sub = sub.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return failed(&sub.text, &sub.text, "concurrency limiter closed");
                };
                let search_text = transformer.rewrite(&*provider, &sub.text).await;
                run_search(&*store, sub.index, &sub.text, search_text, k, settings).await
            }));
        }

        join_all(handles)
            .await
            .into_iter()
            .zip(subqueries)
            .map(|(joined, sub)| {
                joined.unwrap_or_else(|e| {
                    warn!(subquery = %sub.text, error = %e, "sub-query task failed");
                    failed(&sub.text, &sub.text, &e.to_string())
                })
            })
            .collect()
    }
}

fn failed(text: &str, search_text: &str, error: &str) -> Branch {
    Branch {
        report: SubQueryReport {
            text: text.to_string(),
            search_text: search_text.to_string(),
            hits: 0,
            error: Some(error.to_string()),
        },
        documents: Vec::new(),
    }
}

/// Searches the store under the retrieval timeout. Failures become an
/// empty branch with the error recorded.
async fn run_search(
    store: &dyn VectorStore,
    index: usize,
    text: &str,
    search_text: String,
    k: usize,
    settings: SearchSettings,
) -> Branch {
    let start = Instant::now();
    let outcome: Result<Vec<ScoredDocument>, RetrievalError> =
        tokio::time::timeout(settings.timeout, store.search(&search_text, k, settings.mode))
            .await
            .unwrap_or(Err(RetrievalError::Timeout {
                timeout: settings.timeout,
            }));

    match outcome {
        Ok(hits) => {
            debug!(
                subquery = text,
                store = store.name(),
                hits = hits.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "search complete"
            );
            let report = SubQueryReport {
                text: text.to_string(),
                search_text,
                hits: hits.len(),
                error: None,
            };
            Branch {
                report,
                documents: hits
                    .into_iter()
                    .map(|doc| RetrievedDocument::from_scored(doc, index))
                    .collect(),
            }
        }
        Err(e) => {
            warn!(subquery = text, store = store.name(), error = %e, "search failed, skipping");
            failed(text, &search_text, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::prompt::{
        CLASSIFY_SYSTEM_PROMPT, COMPRESS_SYSTEM_PROMPT, DECOMPOSE_SYSTEM_PROMPT, HYDE_SYSTEM_PROMPT,
        REWRITE_SYSTEM_PROMPT,
    };
    use crate::core::CompressionReport;
    use crate::error::GenerationError;
    use crate::agent::testing::{RecordingStore, ScriptedProvider, query_of, scored, system_of};
    use std::collections::HashSet;

    /// Provider that classifies with `label`, decomposes into `subquestions`
    /// and rewrites by prefixing `better `.
    fn provider(label: &'static str, subquestions: &'static str) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(move |request| {
            let system = system_of(request);
            if system == CLASSIFY_SYSTEM_PROMPT {
                Ok(format!(
                    r#"{{"complexity": "{label}", "recommended_strategy": "{label}"}}"#
                ))
            } else if system == DECOMPOSE_SYSTEM_PROMPT {
                Ok(subquestions.to_string())
            } else if system == REWRITE_SYSTEM_PROMPT {
                Ok(format!(
                    r#"{{"rewritten_query": "better {}"}}"#,
                    query_of(request)
                ))
            } else if system == HYDE_SYSTEM_PROMPT {
                Ok("a hypothetical passage".to_string())
            } else {
                Ok(String::new())
            }
        }))
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        store: Arc<RecordingStore>,
    ) -> Orchestrator {
        let config = RagConfig::builder()
            .api_key("test")
            .top_k(5)
            .build()
            .unwrap_or_else(|_| unreachable!());
        Orchestrator::new(provider, store, &config, &PromptSet::defaults())
    }

    fn topical_store() -> Arc<RecordingStore> {
        Arc::new(RecordingStore::new(|query, _k| {
            let q = query.to_lowercase();
            let mut hits = Vec::new();
            if q.contains(" x") {
                hits.push(scored("X is a service", "x.md", 0.9));
                hits.push(scored("shared overview", "overview.md", 0.4));
            }
            if q.contains(" y") {
                hits.push(scored("Y is a library", "y.md", 0.8));
                hits.push(scored("shared overview", "overview.md", 0.6));
            }
            if q.contains(" z") {
                hits.push(scored("Z is a protocol", "z.md", 0.7));
            }
            Ok(hits)
        }))
    }

    #[tokio::test]
    async fn test_simple_query_single_search_verbatim() {
        let store = Arc::new(RecordingStore::new(|_, _| {
            Ok(vec![scored("a", "a.md", 0.9), scored("b", "b.md", 0.5)])
        }));
        let orch = orchestrator(provider("simple", "[]"), Arc::clone(&store));
        let result = orch.adaptive_retrieve(&StandaloneQuery::new("What is X?")).await;

        assert_eq!(store.calls(), vec![("What is X?".to_string(), 5)]);
        let contents: Vec<_> = result.documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert_eq!(result.metadata.strategy_used, Strategy::Direct);
        assert_eq!(result.metadata.subquery_count, 1);
    }

    #[tokio::test]
    async fn test_complex_query_fans_out_and_merges() {
        let store = topical_store();
        let orch = orchestrator(
            provider("complex", r#"{"subquestions": ["What is X?", "What is Y?", "What is Z?"]}"#),
            Arc::clone(&store),
        );
        let result = orch
            .adaptive_retrieve(&StandaloneQuery::new("Compare X and Y, and explain Z"))
            .await;

        let calls = store.calls();
        assert_eq!(calls.len(), 3);
        let searched: HashSet<_> = calls.iter().map(|(q, _)| q.as_str()).collect();
        assert!(searched.contains("better What is X?"));
        assert!(calls.iter().all(|(_, k)| *k == 2));

        assert_eq!(result.metadata.subquery_count, 3);
        assert_eq!(result.metadata.successful_subqueries, 3);
        assert_eq!(result.metadata.strategy_used, Strategy::Decompose);

        // overview.md came back twice and is kept once at its best score
        let overview: Vec<_> = result
            .documents
            .iter()
            .filter(|d| d.content == "shared overview")
            .collect();
        assert_eq!(overview.len(), 1);
        assert!((overview[0].relevance_score - 0.6).abs() < f32::EPSILON);
        assert_eq!(overview[0].originating_subquery, 0);

        assert_eq!(result.documents.len(), 4);
        assert!(
            result
                .documents
                .windows(2)
                .all(|w| w[0].relevance_score >= w[1].relevance_score)
        );
        let origin = result.origin_of(&result.documents[0]);
        assert_eq!(origin.map(|r| r.text.as_str()), Some("What is X?"));
    }

    #[tokio::test]
    async fn test_one_failing_subquery_is_skipped() {
        let store = Arc::new(RecordingStore::new(|query, _| {
            if query.contains('Y') {
                Err(RetrievalError::Backend {
                    message: "index offline".to_string(),
                })
            } else {
                Ok(vec![scored(query, "doc.md", 0.5)])
            }
        }));
        let orch = orchestrator(
            provider("complex", r#"["What is X?", "What is Y?", "What is Z?"]"#),
            Arc::clone(&store),
        );
        let result = orch
            .adaptive_retrieve(&StandaloneQuery::new("Compare X and Y, and explain Z"))
            .await;

        assert_eq!(result.metadata.subquery_count, 3);
        assert_eq!(result.metadata.successful_subqueries, 2);
        assert_eq!(result.documents.len(), 2);
        assert!(result.metadata.subqueries[1].error.is_some());
        assert!(result.documents.iter().all(|d| d.originating_subquery != 1));
    }

    #[tokio::test]
    async fn test_all_failing_returns_empty_with_metadata() {
        let store = Arc::new(RecordingStore::new(|_, _| {
            Err(RetrievalError::Backend {
                message: "down".to_string(),
            })
        }));
        let orch = orchestrator(provider("complex", r#"["What is X?", "What is Y?"]"#), store);
        let result = orch
            .adaptive_retrieve(&StandaloneQuery::new("Compare X and Y"))
            .await;
        assert!(result.is_empty());
        assert_eq!(result.metadata.strategy_used, Strategy::Decompose);
        assert_eq!(result.metadata.subquery_count, 2);
        assert_eq!(result.metadata.successful_subqueries, 0);
    }

    #[tokio::test]
    async fn test_empty_decomposition_behaves_like_direct() {
        let direct_store = topical_store();
        let direct = orchestrator(provider("simple", "[]"), Arc::clone(&direct_store))
            .adaptive_retrieve(&StandaloneQuery::new("Compare X and Y"))
            .await;

        let fallback_store = topical_store();
        let fallback = orchestrator(provider("complex", "[]"), Arc::clone(&fallback_store))
            .adaptive_retrieve(&StandaloneQuery::new("Compare X and Y"))
            .await;

        assert_eq!(direct_store.calls(), fallback_store.calls());
        assert_eq!(direct.documents, fallback.documents);
        assert_eq!(fallback.metadata.strategy_used, Strategy::Direct);
        assert!(fallback.metadata.decomposition_fallback);
        assert_eq!(fallback.metadata.decision.strategy, Strategy::Decompose);
    }

    #[tokio::test]
    async fn test_hybrid_rewrites_once() {
        let store = topical_store();
        let orch = orchestrator(provider("hybrid", "[]"), Arc::clone(&store));
        let result = orch.adaptive_retrieve(&StandaloneQuery::new("x deploy?")).await;
        assert_eq!(store.calls(), vec![("better x deploy?".to_string(), 5)]);
        assert_eq!(result.metadata.strategy_used, Strategy::Rewrite);
        assert_eq!(result.metadata.rewritten_query.as_deref(), Some("better x deploy?"));
    }

    #[tokio::test]
    async fn test_forced_strategy_skips_classification() {
        let provider = provider("complex", "[]");
        let store = topical_store();
        let orch = orchestrator(Arc::clone(&provider), Arc::clone(&store));
        let result = orch
            .retrieve(&StandaloneQuery::new("What is X?"), Some(Strategy::Hyde))
            .await;
        assert!(result.metadata.decision.forced);
        assert_eq!(result.metadata.strategy_used, Strategy::Hyde);
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.calls()[0].0, "a hypothetical passage");
    }

    #[tokio::test]
    async fn test_store_timeout_is_contained() {
        struct SlowStore;

        #[async_trait::async_trait]
        impl VectorStore for SlowStore {
            fn name(&self) -> &'static str {
                "slow"
            }

            async fn search(
                &self,
                _query: &str,
                _k: usize,
                _mode: SearchMode,
            ) -> Result<Vec<ScoredDocument>, RetrievalError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Vec::new())
            }
        }

        let config = RagConfig::builder()
            .api_key("test")
            .retrieval_timeout(Duration::from_millis(20))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let orch = Orchestrator::new(
            provider("simple", "[]"),
            Arc::new(SlowStore),
            &config,
            &PromptSet::defaults(),
        );
        let result = orch.adaptive_retrieve(&StandaloneQuery::new("What is X?")).await;
        assert!(result.is_empty());
        assert_eq!(result.metadata.successful_subqueries, 0);
        let error = result.metadata.subqueries[0].error.clone().unwrap_or_default();
        assert!(error.contains("timed out"));
    }

    fn compressing_orchestrator(
        provider: Arc<ScriptedProvider>,
        store: Arc<RecordingStore>,
    ) -> Orchestrator {
        let config = RagConfig::builder()
            .api_key("test")
            .top_k(5)
            .compress_documents(true)
            .build()
            .unwrap_or_else(|_| unreachable!());
        Orchestrator::new(provider, store, &config, &PromptSet::defaults())
    }

    #[tokio::test]
    async fn test_compression_keeps_relevant_passages_only() {
        let provider = Arc::new(ScriptedProvider::new(|request| {
            let system = system_of(request);
            if system == CLASSIFY_SYSTEM_PROMPT {
                Ok(r#"{"complexity": "simple", "recommended_strategy": "direct"}"#.to_string())
            } else if system == COMPRESS_SYSTEM_PROMPT {
                let user = request.last_user_content().unwrap_or_default();
                if user.contains("retries") {
                    Ok("B retries 3 times.".to_string())
                } else {
                    Ok("NO_OUTPUT".to_string())
                }
            } else {
                Ok(String::new())
            }
        }));
        let store = Arc::new(RecordingStore::new(|_, _| {
            Ok(vec![
                scored("Service B overview. B retries 3 times. Changelog follows.", "b.md", 0.9),
                scored("Holiday calendar", "hr.md", 0.3),
            ])
        }));
        let result = compressing_orchestrator(Arc::clone(&provider), store)
            .adaptive_retrieve(&StandaloneQuery::new("How often does B retry?"))
            .await;

        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].content, "B retries 3 times.");
        assert_eq!(result.documents[0].source(), "b.md");
        assert_eq!(
            result.metadata.compression,
            Some(CompressionReport { extracted: 1, dropped: 1, failed: 0 })
        );
        // classification plus one extraction per document
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_compression_failure_keeps_documents() {
        let provider = Arc::new(ScriptedProvider::new(|request| {
            let system = system_of(request);
            if system == CLASSIFY_SYSTEM_PROMPT {
                Ok(r#"{"complexity": "simple"}"#.to_string())
            } else if system == COMPRESS_SYSTEM_PROMPT {
                Err(GenerationError::ApiRequest {
                    message: "overloaded".to_string(),
                    status: Some(529),
                })
            } else {
                Ok(String::new())
            }
        }));
        let store = Arc::new(RecordingStore::new(|_, _| {
            Ok(vec![scored("a", "a.md", 0.9), scored("b", "b.md", 0.5)])
        }));
        let result = compressing_orchestrator(provider, store)
            .adaptive_retrieve(&StandaloneQuery::new("What is X?"))
            .await;

        let contents: Vec<_> = result.documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert_eq!(result.metadata.compression.map(|r| r.failed), Some(2));
    }

    #[tokio::test]
    async fn test_compression_off_by_default() {
        let provider = provider("simple", "[]");
        let store = Arc::new(RecordingStore::new(|_, _| Ok(vec![scored("a", "a.md", 0.9)])));
        let result = orchestrator(Arc::clone(&provider), store)
            .adaptive_retrieve(&StandaloneQuery::new("What is X?"))
            .await;
        assert!(result.metadata.compression.is_none());
        assert_eq!(provider.calls(), 1);
    }

    /// Store that tracks how many searches are in flight at once.
    #[derive(Default)]
    struct GaugedStore {
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl VectorStore for GaugedStore {
        fn name(&self) -> &'static str {
            "gauged"
        }

        async fn search(
            &self,
            query: &str,
            _k: usize,
            _mode: SearchMode,
        ) -> Result<Vec<ScoredDocument>, RetrievalError> {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![scored(query, "doc.md", 0.5)])
        }
    }

    async fn peak_concurrency(limit: usize) -> usize {
        let store = Arc::new(GaugedStore::default());
        let config = RagConfig::builder()
            .api_key("test")
            .max_concurrency(limit)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let orch = Orchestrator::new(
            provider("complex", r#"["What is X?", "What is Y?", "What is Z?"]"#),
            Arc::clone(&store) as Arc<dyn VectorStore>,
            &config,
            &PromptSet::defaults(),
        );
        let result = orch
            .adaptive_retrieve(&StandaloneQuery::new("Compare X and Y, and explain Z"))
            .await;
        assert_eq!(result.metadata.successful_subqueries, 3);
        store.peak.load(std::sync::atomic::Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_limit() {
        assert_eq!(peak_concurrency(1).await, 1);
        assert!(peak_concurrency(2).await <= 2);
    }

    #[tokio::test]
    async fn test_fan_out_runs_searches_concurrently() {
        assert!(peak_concurrency(4).await >= 2);
    }
}
