use clap::Parser;
use news_digest::config::AppConfig;
use news_digest::delivery::{render_html, EmailSender};
use news_digest::pipeline::Pipeline;
use news_digest::sources::{build_client, FeedAdapter, ForumAdapter, HackerNewsAdapter};
use news_digest::summarizer::OpenAiSummarizer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "news-digest", about = "Aggregate, dedup, rank and email a news digest")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Print the rendered digest to stdout instead of sending email.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        warn!(path = %cli.config.display(), "config file not found; using defaults");
        AppConfig::default()
    };

    let client = build_client(&config.fetch)?;
    let mut pipeline = Pipeline::new(
        config.fetch.clone(),
        config.dedup.clone(),
        config.ranking.clone(),
        config.digest.clone(),
        config.summarize.clone(),
    );

    if config.sources.hacker_news.enabled {
        pipeline = pipeline.with_adapter(Arc::new(HackerNewsAdapter::new(
            client.clone(),
            config.sources.hacker_news.clone(),
            &config.fetch,
        )));
    }
    if config.sources.forum.enabled {
        pipeline = pipeline.with_adapter(Arc::new(ForumAdapter::new(
            client.clone(),
            config.sources.forum.clone(),
            &config.fetch,
        )));
    }
    for feed in &config.sources.feeds {
        pipeline = pipeline.with_adapter(Arc::new(FeedAdapter::new(
            client.clone(),
            feed.clone(),
            &config.fetch,
        )));
    }

    if config.summarize.enabled {
        match std::env::var("OPENAI_API_KEY") {
            Ok(api_key) => {
                pipeline = pipeline.with_summarizer(Arc::new(OpenAiSummarizer::new(
                    &config.summarize,
                    api_key,
                )));
            }
            Err(_) => {
                warn!("OPENAI_API_KEY not set; digest will be delivered without summaries");
            }
        }
    }

    let outcome = pipeline.run().await?;
    let html = render_html(&outcome.digest, &outcome.report);

    if cli.dry_run || !config.email.enabled {
        println!("{}", html);
        info!(
            entries = outcome.digest.len(),
            "dry run complete; digest printed to stdout"
        );
    } else {
        let sender = EmailSender::from_config(&config.email)?;
        sender.send(&config.email.subject, html).await?;
    }

    for source in &outcome.report.sources {
        match &source.error {
            Some(error) => warn!(source = %source.source, error, "source degraded this run"),
            None => info!(source = %source.source, items = source.items_fetched, "source ok"),
        }
    }

    Ok(())
}
