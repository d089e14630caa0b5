mod config;
mod error;
mod labeler;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use labeler::Labeler;
use shopscan_common::dispatch;
use shopscan_common::fetch::Fetcher;
use shopscan_common::filter::{self, FilterResult};
use shopscan_common::io::{self, RecordFilter};
use shopscan_common::model::Label;
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

    info!("starting business-filter");

    let config = Config::from_env()?;
    info!(
        input = %config.input_csv.display(),
        output = %config.output_csv.display(),
        country = config.country.code(),
        mode = ?config.mode,
        workers = config.workers,
        "configuration loaded"
    );

    let rules = Arc::new(RuleSet::for_country(config.country));
    let records = io::read_records(&config.input_csv, &config.layout, &RecordFilter::default())?;
    info!(records = records.len(), "input loaded");

    let labeler = Labeler::new(Fetcher::new(config.fetch.clone())?, rules, config.mode);
    let chunks = dispatch::partition(records, config.workers)?;
    let results: Vec<FilterResult> = dispatch::run(chunks, config.worker_concurrency, move |record| {
        let labeler = labeler.clone();
        async move { labeler.label(record).await }
    })
    .await?;

    filter::write_labels(io::create_output(&config.output_csv)?, &results)?;
    info!(path = %config.output_csv.display(), rows = results.len(), "labels written");

    let excluded: Vec<&str> = results
        .iter()
        .filter(|r| r.label == Label::NotEcommerce)
        .map(|r| r.url.as_str())
        .collect();
    if let Some(path) = &config.non_ecommerce_csv {
        io::write_url_list(io::create_output(path)?, &excluded)?;
        info!(path = %path.display(), rows = excluded.len(), "non-e-commerce list written");
    }

    let failed = results.iter().filter(|r| r.label == Label::FetchError).count();
    info!(
        total = results.len(),
        excluded = excluded.len(),
        kept = results.len() - excluded.len() - failed,
        failed,
        "run complete"
    );
    Ok(())
}
