//! Selects the top ranked entries under the digest budget and attaches
//! summaries. Summarization failures, timeouts and exhausted character
//! budgets degrade presentation only: a selected story is never dropped
//! because its summary could not be produced.

use crate::config::{DigestBudget, SummarizeOptions};
use crate::summarizer::Summarizer;
use crate::types::{DigestEntry, IncludedReason, RankedEntry};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct AssembledDigest {
    pub entries: Vec<DigestEntry>,
    /// Fewer qualifying stories than the configured minimum. The clustering
    /// threshold is not relaxed and nothing is retried; the digest simply
    /// ships shorter and the run report says so.
    pub below_minimum: bool,
}

pub struct DigestAssembler {
    budget: DigestBudget,
    options: SummarizeOptions,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl DigestAssembler {
    pub fn new(budget: DigestBudget, options: SummarizeOptions) -> Self {
        Self {
            budget,
            options,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub async fn assemble(&self, ranked: Vec<RankedEntry>) -> AssembledDigest {
        let selected: Vec<RankedEntry> = ranked
            .into_iter()
            .take(self.budget.max_entries)
            .collect();
        let below_minimum = selected.len() < self.budget.min_entries;
        if below_minimum {
            info!(
                selected = selected.len(),
                minimum = self.budget.min_entries,
                "fewer qualifying stories than requested; producing a shorter digest"
            );
        }

        let attempted = self.options.enabled && self.summarizer.is_some();
        let summaries = if attempted {
            self.summarize_all(&selected).await
        } else {
            vec![None; selected.len()]
        };

        let mut remaining_chars = self.budget.max_summary_chars;
        let entries: Vec<DigestEntry> = selected
            .into_iter()
            .zip(summaries)
            .map(|(entry, summary)| {
                let summary = summary.filter(|text| {
                    match remaining_chars.as_mut() {
                        None => true,
                        Some(remaining) => {
                            let length = text.chars().count();
                            if length <= *remaining {
                                *remaining -= length;
                                true
                            } else {
                                debug!(
                                    rank = entry.rank,
                                    "summary dropped: character budget exhausted"
                                );
                                false
                            }
                        }
                    }
                });
                let included_reason = if summary.is_some() || !attempted {
                    IncludedReason::TopRanked
                } else {
                    IncludedReason::Fallback
                };
                DigestEntry {
                    entry,
                    summary,
                    included_reason,
                }
            })
            .collect();

        AssembledDigest {
            entries,
            below_minimum,
        }
    }

    /// Summarizes the selected entries with bounded concurrency and a
    /// per-call timeout. Results come back in selection order regardless of
    /// completion order.
    async fn summarize_all(&self, selected: &[RankedEntry]) -> Vec<Option<String>> {
        let summarizer = match &self.summarizer {
            Some(summarizer) => summarizer,
            None => return vec![None; selected.len()],
        };
        let timeout = Duration::from_secs(self.options.timeout_secs);
        let mut results: Vec<Option<String>> = vec![None; selected.len()];

        let mut calls = stream::iter(selected.iter().enumerate())
            .map(|(index, entry)| {
                let summarizer = Arc::clone(summarizer);
                let item = entry.cluster.representative.clone();
                async move {
                    let outcome = tokio::time::timeout(timeout, async {
                        summarizer.summarize(&item).await
                    })
                    .await;
                    (index, item.id, outcome)
                }
            })
            .buffer_unordered(self.options.concurrency.max(1));

        while let Some((index, id, outcome)) = calls.next().await {
            match outcome {
                Ok(Ok(summary)) => results[index] = Some(summary),
                Ok(Err(e)) => {
                    warn!(item = %id, error = %e, "summarization failed; entry kept without summary");
                }
                Err(_) => {
                    warn!(item = %id, timeout_secs = self.options.timeout_secs, "summarization timed out; entry kept without summary");
                }
            }
        }
        results
    }
}
