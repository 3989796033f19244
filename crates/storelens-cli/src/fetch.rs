use std::sync::Arc;

use futures::stream::{self, StreamExt};
use storelens_scraper::{AggregateRecord, FetchClient, LlmEnhancer, Orchestrator, OrchestratorConfig};

pub(crate) struct FetchOptions {
    pub no_enhance: bool,
    pub compact: bool,
    pub concurrency: usize,
}

/// Extracts every store in `urls` and prints one JSON record per store, in
/// input order. Stores that fail are logged and skipped; the run fails if
/// any store failed.
pub(crate) async fn run_fetch(urls: &[String], options: &FetchOptions) -> anyhow::Result<()> {
    let config = storelens_core::load_app_config()?;

    let fetcher = FetchClient::from_app_config(&config)?;
    let mut orchestrator =
        Orchestrator::new(Arc::new(fetcher), OrchestratorConfig::from_app_config(&config));

    match config.llm.as_ref() {
        Some(llm) if !options.no_enhance => {
            orchestrator = orchestrator.with_enhancer(Arc::new(LlmEnhancer::new(llm)?));
        }
        Some(_) => tracing::debug!("enhancement pass skipped by --no-enhance"),
        None => tracing::debug!("no LLM key configured, enhancement pass disabled"),
    }

    let orchestrator = &orchestrator;
    let results: Vec<_> = stream::iter(urls)
        .map(|url| async move { (url, orchestrator.fetch_insights(url).await) })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let mut failed = 0usize;
    for (url, result) in results {
        match result {
            Ok(record) => println!("{}", render(&record, options.compact)?),
            Err(e) => {
                failed += 1;
                tracing::error!(url = %url, kind = e.kind(), error = %e, "store extraction failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} stores failed", urls.len());
    }
    Ok(())
}

pub(crate) fn render(record: &AggregateRecord, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(record)
    } else {
        serde_json::to_string_pretty(record)
    }
}
