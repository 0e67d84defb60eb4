use async_trait::async_trait;
use chrono::{Duration, Utc};
use news_digest::config::{
    DedupConfig, DigestBudget, FetchOptions, RankingConfig, SummarizeOptions,
};
use news_digest::pipeline::Pipeline;
use news_digest::sources::SourceAdapter;
use news_digest::summarizer::Summarizer;
use news_digest::types::{
    DigestError, ForumPost, IncludedReason, LinkStory, NewsItem, RawRecord, Result, RunState,
    Source,
};
use std::sync::Arc;

struct StaticAdapter {
    source: Source,
    records: Vec<RawRecord>,
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn source(&self) -> Source {
        self.source.clone()
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}

struct FailingAdapter {
    source: Source,
}

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn source(&self) -> Source {
        self.source.clone()
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        Err(DigestError::SourceFetch {
            source_name: self.source.label(),
            message: "connection refused".to_string(),
        })
    }
}

struct StuckAdapter {
    source: Source,
}

#[async_trait]
impl SourceAdapter for StuckAdapter {
    fn source(&self) -> Source {
        self.source.clone()
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

struct SelectiveSummarizer {
    fail_ids: Vec<String>,
}

#[async_trait]
impl Summarizer for SelectiveSummarizer {
    fn name(&self) -> String {
        "selective".to_string()
    }

    async fn summarize(&self, item: &NewsItem) -> Result<String> {
        if self.fail_ids.contains(&item.id) {
            return Err(DigestError::Summarization("model unavailable".to_string()));
        }
        Ok(format!("Summary of {}", item.title))
    }
}

fn hn_record(id: &str, title: &str, url: Option<&str>, hours_ago: i64, points: f64) -> RawRecord {
    RawRecord::LinkAggregator(LinkStory {
        story_id: id.to_string(),
        title: title.to_string(),
        url: url.map(|u| u.to_string()),
        created_at: Some(Utc::now() - Duration::hours(hours_ago)),
        points: Some(points),
        story_text: None,
    })
}

fn forum_record(id: &str, title: &str, url: Option<&str>, hours_ago: i64, ups: f64) -> RawRecord {
    RawRecord::Forum(ForumPost {
        post_id: id.to_string(),
        title: title.to_string(),
        url: url.map(|u| u.to_string()),
        created_at: Some(Utc::now() - Duration::hours(hours_ago)),
        upvotes: Some(ups),
        selftext: None,
    })
}

fn fetch_options() -> FetchOptions {
    FetchOptions {
        per_source_timeout_secs: 2,
        deadline_secs: 5,
        max_retries: 0,
        retry_delay_secs: 0,
        ..FetchOptions::default()
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        fetch_options(),
        DedupConfig::default(),
        RankingConfig::default(),
        DigestBudget {
            min_entries: 1,
            ..DigestBudget::default()
        },
        SummarizeOptions::default(),
    )
}

#[tokio::test]
async fn same_story_with_tracking_params_merges_across_sources() {
    let hn = StaticAdapter {
        source: Source::LinkAggregator,
        records: vec![hn_record(
            "hn1",
            "Big company announcement",
            Some("https://x.com/a?utm_source=y"),
            2,
            150.0,
        )],
    };
    let forum = StaticAdapter {
        source: Source::Forum,
        records: vec![forum_record(
            "fp1",
            "Thoughts on this announcement?",
            Some("https://x.com/a"),
            3,
            40.0,
        )],
    };

    let outcome = pipeline()
        .with_adapter(Arc::new(hn))
        .with_adapter(Arc::new(forum))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report.clusters, 1);
    assert_eq!(outcome.digest.len(), 1);
    assert_eq!(outcome.digest[0].entry.cluster.members.len(), 2);
    // Highest score hint wins the representative slot.
    assert_eq!(outcome.digest[0].entry.cluster.representative.id, "hn1");
}

#[tokio::test]
async fn similar_titles_cluster_and_unrelated_story_stays_separate() {
    let hn = StaticAdapter {
        source: Source::LinkAggregator,
        records: vec![hn_record("a", "Company X raises $10M", None, 2, 90.0)],
    };
    let forum = StaticAdapter {
        source: Source::Forum,
        records: vec![
            forum_record("b", "Company X Raises Ten Million", None, 4, 12.0),
            forum_record("c", "Unrelated story about Company Y", None, 4, 55.0),
        ],
    };

    let outcome = pipeline()
        .with_adapter(Arc::new(hn))
        .with_adapter(Arc::new(forum))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report.clusters, 2);
    let merged = outcome
        .digest
        .iter()
        .find(|e| e.entry.cluster.members.len() == 2)
        .expect("the two funding headlines should share a cluster");
    let mut ids: Vec<&str> = merged
        .entry
        .cluster
        .members
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn one_failing_source_is_recorded_and_does_not_halt_the_run() {
    let good = StaticAdapter {
        source: Source::LinkAggregator,
        records: vec![hn_record("a", "Working source story", None, 1, 20.0)],
    };
    let bad = FailingAdapter {
        source: Source::Forum,
    };

    let outcome = pipeline()
        .with_adapter(Arc::new(good))
        .with_adapter(Arc::new(bad))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.digest.len(), 1);
    assert_eq!(outcome.report.sources.len(), 2);
    let forum_report = outcome
        .report
        .sources
        .iter()
        .find(|s| s.source == Source::Forum)
        .unwrap();
    assert!(forum_report.error.is_some());
    assert_eq!(forum_report.items_fetched, 0);
}

#[tokio::test]
async fn all_sources_failing_aborts_with_the_report_attached() {
    let result = pipeline()
        .with_adapter(Arc::new(FailingAdapter {
            source: Source::LinkAggregator,
        }))
        .with_adapter(Arc::new(FailingAdapter {
            source: Source::Forum,
        }))
        .run()
        .await;

    match result {
        Err(DigestError::AllSourcesFailed { report }) => {
            assert_eq!(report.state, RunState::Aborted);
            assert_eq!(report.sources.len(), 2);
            for source in &report.sources {
                let error = source.error.as_deref().unwrap();
                assert!(error.contains("connection refused"), "got: {}", error);
            }
        }
        other => panic!("expected an all-sources-failed abort, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn stuck_source_fails_at_the_deadline_without_blocking_others() {
    let good = StaticAdapter {
        source: Source::LinkAggregator,
        records: vec![hn_record("a", "Fast source story", None, 1, 10.0)],
    };
    let stuck = StuckAdapter {
        source: Source::Feed {
            name: "slow-blog".to_string(),
        },
    };

    let outcome = pipeline()
        .with_adapter(Arc::new(good))
        .with_adapter(Arc::new(stuck))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.digest.len(), 1);
    let stuck_report = outcome
        .report
        .sources
        .iter()
        .find(|s| matches!(s.source, Source::Feed { .. }))
        .unwrap();
    assert!(stuck_report.error.is_some());
}

#[tokio::test]
async fn summarizer_failure_degrades_one_entry_but_drops_nothing() {
    let adapter = StaticAdapter {
        source: Source::LinkAggregator,
        records: vec![
            hn_record("ok", "Story that summarizes fine", None, 1, 80.0),
            hn_record("broken", "Story whose summary fails", None, 2, 60.0),
        ],
    };

    let outcome = pipeline()
        .with_adapter(Arc::new(adapter))
        .with_summarizer(Arc::new(SelectiveSummarizer {
            fail_ids: vec!["broken".to_string()],
        }))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.digest.len(), 2);
    let ok = outcome
        .digest
        .iter()
        .find(|e| e.entry.cluster.representative.id == "ok")
        .unwrap();
    let broken = outcome
        .digest
        .iter()
        .find(|e| e.entry.cluster.representative.id == "broken")
        .unwrap();
    assert!(ok.summary.is_some());
    assert_eq!(ok.included_reason, IncludedReason::TopRanked);
    assert!(broken.summary.is_none());
    assert_eq!(broken.included_reason, IncludedReason::Fallback);
}

#[tokio::test]
async fn digest_ordering_is_deterministic_for_the_same_batch() {
    let records = vec![
        hn_record("a", "First story about databases", None, 2, 120.0),
        hn_record("b", "Second story about compilers", None, 3, 120.0),
        hn_record("c", "Third story about networking", None, 4, 120.0),
    ];

    let order = |outcome: &news_digest::pipeline::PipelineOutcome| -> Vec<String> {
        outcome
            .digest
            .iter()
            .map(|e| e.entry.cluster.representative.id.clone())
            .collect()
    };

    let first = pipeline()
        .with_adapter(Arc::new(StaticAdapter {
            source: Source::LinkAggregator,
            records: records.clone(),
        }))
        .run()
        .await
        .unwrap();
    let second = pipeline()
        .with_adapter(Arc::new(StaticAdapter {
            source: Source::LinkAggregator,
            records,
        }))
        .run()
        .await
        .unwrap();

    assert_eq!(order(&first), order(&second));
}

#[tokio::test]
async fn successful_source_with_no_valid_items_still_finishes() {
    let adapter = StaticAdapter {
        source: Source::LinkAggregator,
        records: vec![hn_record("bad", "   ", None, 1, 5.0)],
    };

    let outcome = pipeline().with_adapter(Arc::new(adapter)).run().await.unwrap();
    assert!(outcome.digest.is_empty());
    assert_eq!(outcome.report.rejected_records, 1);
    assert!(outcome.report.below_minimum);
}
