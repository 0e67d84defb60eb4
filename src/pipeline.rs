//! Orchestrates one digest run: concurrent bounded fetch, then the pure
//! normalize → dedup → rank → assemble stages over the in-memory batch.
//!
//! Failure containment follows one rule: a single source failing is that
//! source's problem. Its items are absent and the failure is recorded on
//! the run report. Only every source failing aborts the run. The pipeline
//! never retries; adapters own their retry policy below the per-source
//! timeout.

use crate::assembler::DigestAssembler;
use crate::config::{DedupConfig, DigestBudget, FetchOptions, RankingConfig, SummarizeOptions};
use crate::dedup::Deduplicator;
use crate::normalizer::Normalizer;
use crate::ranker::Ranker;
use crate::sources::SourceAdapter;
use crate::summarizer::Summarizer;
use crate::types::{
    DigestEntry, DigestError, RawRecord, Result, RunReport, RunState, Source, SourceReport,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything one run produces: the ordered digest and the report that
/// explains what each source contributed.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub digest: Vec<DigestEntry>,
    pub report: RunReport,
}

pub struct Pipeline {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    fetch: FetchOptions,
    dedup: DedupConfig,
    ranking: RankingConfig,
    budget: DigestBudget,
    summarize: SummarizeOptions,
}

impl Pipeline {
    pub fn new(
        fetch: FetchOptions,
        dedup: DedupConfig,
        ranking: RankingConfig,
        budget: DigestBudget,
        summarize: SummarizeOptions,
    ) -> Self {
        Self {
            adapters: Vec::new(),
            summarizer: None,
            fetch,
            dedup,
            ranking,
            budget,
            summarize,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        info!(source = %adapter.source(), "adding source adapter");
        self.adapters.push(adapter);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        info!(summarizer = %summarizer.name(), "adding summarizer");
        self.summarizer = Some(summarizer);
        self
    }

    /// Executes one run. Returns `Err(DigestError::AllSourcesFailed)` when
    /// nothing could be aggregated, with the aborted report attached so the
    /// per-source errors survive; every other failure mode is absorbed into
    /// the outcome's report.
    pub async fn run(&self) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut report = RunReport::new(run_id, started_at);

        info!(%run_id, sources = self.adapters.len(), "starting digest run");
        if self.adapters.is_empty() {
            report.state = RunState::Aborted;
            error!(%run_id, "no sources configured; nothing to aggregate");
            return Err(DigestError::AllSourcesFailed {
                report: Box::new(report),
            });
        }

        let fetched = self.fetch_all().await;
        let mut raw_records: Vec<RawRecord> = Vec::new();
        for (source, outcome) in fetched {
            match outcome {
                Ok(records) => {
                    info!(source = %source, items = records.len(), "source fetch succeeded");
                    report.sources.push(SourceReport {
                        source,
                        items_fetched: records.len(),
                        error: None,
                    });
                    raw_records.extend(records);
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "source fetch failed; continuing without it");
                    report.sources.push(SourceReport {
                        source,
                        items_fetched: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if report.all_sources_failed() {
            report.state = RunState::Aborted;
            error!(%run_id, "every source failed; aborting run");
            return Err(DigestError::AllSourcesFailed {
                report: Box::new(report),
            });
        }

        report.state = RunState::Normalizing;
        let batch = Normalizer::new(started_at).normalize(raw_records);
        report.rejected_records = batch.rejected;
        info!(items = batch.items.len(), rejected = batch.rejected, "normalized batch");

        report.state = RunState::Deduplicating;
        let clusters = Deduplicator::new(self.dedup.clone()).cluster(batch.items);
        report.clusters = clusters.len();

        report.state = RunState::Ranking;
        let ranked = Ranker::new(self.ranking.clone()).rank(clusters, started_at);

        report.state = RunState::Assembling;
        let mut assembler = DigestAssembler::new(self.budget.clone(), self.summarize.clone());
        if let Some(summarizer) = &self.summarizer {
            assembler = assembler.with_summarizer(Arc::clone(summarizer));
        }
        let assembled = assembler.assemble(ranked).await;
        report.digest_entries = assembled.entries.len();
        report.below_minimum = assembled.below_minimum;

        report.state = RunState::Done;
        info!(
            %run_id,
            entries = report.digest_entries,
            clusters = report.clusters,
            failed_sources = report.failed_sources().count(),
            "digest run complete"
        );
        Ok(PipelineOutcome {
            digest: assembled.entries,
            report,
        })
    }

    /// Fetches every adapter concurrently, bounded by the configured ceiling.
    /// Each fetch races both the per-source timeout and the run-level fetch
    /// deadline; whichever fires first fails that source only. Results come
    /// back in adapter order so reports are deterministic.
    async fn fetch_all(&self) -> Vec<(Source, Result<Vec<RawRecord>>)> {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.fetch.deadline_secs);
        let per_source = Duration::from_secs(self.fetch.per_source_timeout_secs);
        let per_source_secs = self.fetch.per_source_timeout_secs;

        let mut results: Vec<(usize, Source, Result<Vec<RawRecord>>)> =
            stream::iter(self.adapters.iter().cloned().enumerate())
                .map(|(index, adapter)| async move {
                    let source = adapter.source();
                    let raced = tokio::time::timeout_at(
                        deadline,
                        tokio::time::timeout(per_source, adapter.fetch()),
                    )
                    .await;
                    let outcome = match raced {
                        Err(_) => Err(DigestError::SourceFetch {
                            source_name: source.label(),
                            message: "still pending at the fetch deadline".to_string(),
                        }),
                        Ok(Err(_)) => Err(DigestError::SourceFetch {
                            source_name: source.label(),
                            message: format!("timed out after {}s", per_source_secs),
                        }),
                        Ok(Ok(result)) => result,
                    };
                    (index, source, outcome)
                })
                .buffer_unordered(self.fetch.concurrency.max(1))
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, source, outcome)| (source, outcome))
            .collect()
    }
}
