mod cache;
mod config;
mod error;
mod report;
mod scorer;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cache::ScoreCache;
use config::Config;
use report::ScoredUrl;
use scorer::Scorer;
use shopscan_common::dispatch;
use shopscan_common::fetch::Fetcher;
use shopscan_common::io;
use shopscan_common::redis::RedisCache;
use shopscan_common::rules::RuleSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting shop-score");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        input = %config.input_csv.display(),
        output = %config.output_csv.display(),
        country = config.country.code(),
        workers = config.workers,
        concurrency = config.worker_concurrency,
        threshold = config.threshold,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    // 2. Rule set: JSON file when given, built-in country set otherwise
    let mut rules = match &config.rules_path {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::for_country(config.country),
    };
    if let Some(policy) = config.match_policy {
        rules = rules.with_policy(policy);
    }
    info!(
        rule_set = rules.name(),
        rules = rules.rules().len(),
        total_weight = rules.total_weight(),
        policy = ?rules.policy(),
        "rule set loaded"
    );

    // 3. Score cache (optional, graceful degradation if unavailable)
    let redis = RedisCache::new(config.redis_url.as_deref());
    if redis.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, running without score cache");
    }
    let cache = ScoreCache::new(redis, rules.fingerprint(), config.cache_ttl_secs);
    if config.reset_cache {
        cache.invalidate_all().await;
    }

    // 4. Read input and split into chunks
    let records = io::read_records(&config.input_csv, &config.layout, &config.filter)?;
    info!(records = records.len(), "input loaded");
    let chunks = dispatch::partition(records, config.workers)?;

    // 5. Fan out
    let scorer = Scorer::new(
        Fetcher::new(config.fetch.clone())?,
        Arc::new(rules),
        Arc::new(cache),
    );
    let scored: Vec<ScoredUrl> = dispatch::run(chunks, config.worker_concurrency, move |record| {
        let scorer = scorer.clone();
        async move { scorer.score(record).await }
    })
    .await?;
    let results: Vec<_> = scored.iter().map(|s| s.result.clone()).collect();

    // 6. Write outputs
    io::write_scores(io::create_output(&config.output_csv)?, &results, config.threshold)?;
    info!(path = %config.output_csv.display(), rows = results.len(), "scores written");

    let zero_urls: Vec<&str> = results
        .iter()
        .filter(|r| !r.score().is_some_and(|s| s > 0.0))
        .map(|r| r.url.as_str())
        .collect();
    if let Some(path) = &config.zero_score_csv {
        io::write_url_list(io::create_output(path)?, &zero_urls)?;
        info!(path = %path.display(), rows = zero_urls.len(), "zero-score list written");
    }

    if let Some(path) = &config.report_csv {
        report::write_report(io::create_output(path)?, &scored)?;
        let with_cookies = scored
            .iter()
            .filter(|s| s.report.as_ref().is_some_and(|r| r.sets_cookies))
            .count();
        let with_rent = scored
            .iter()
            .filter(|s| s.report.as_ref().is_some_and(|r| r.mentions_rent))
            .count();
        info!(path = %path.display(), with_cookies, with_rent, "keyword report written");
    }

    let failed = results.iter().filter(|r| r.is_error()).count();
    let ecommerce = results
        .iter()
        .filter(|r| r.score().is_some_and(|s| s >= config.threshold))
        .count();
    info!(
        total = results.len(),
        ecommerce,
        zero = zero_urls.len() - failed,
        failed,
        "run complete"
    );
    Ok(())
}
