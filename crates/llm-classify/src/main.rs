mod analysis;
mod classifier;
mod config;
mod error;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analysis::{ClassifyRow, OUTPUT_HEADER};
use classifier::Classifier;
use config::Config;
use error::AppError;
use shopscan_common::completion::CompletionClient;
use shopscan_common::dispatch;
use shopscan_common::fetch::Fetcher;
use shopscan_common::io;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting llm-classify");

    let config = Config::from_env()?;
    info!(
        input = %config.input_csv.display(),
        output = %config.output_csv.display(),
        endpoint = %config.completion.endpoint,
        max_page_chars = config.max_page_chars,
        "configuration loaded"
    );

    let client = CompletionClient::new(config.completion.clone())?;
    if client.is_healthy().await {
        info!("completion server is up");
    } else if config.skip_health_check {
        warn!("completion server health check failed, continuing anyway");
    } else {
        return Err(AppError::ServerUnavailable(config.completion.endpoint.clone()).into());
    }

    let records = io::read_records(&config.input_csv, &config.layout, &config.filter)?;
    info!(records = records.len(), "input loaded");

    // One worker: the model server handles a single prompt at a time.
    let classifier = Classifier::new(
        Fetcher::new(config.fetch.clone())?,
        client,
        config.max_page_chars,
    );
    let chunks = dispatch::partition(records, 1)?;
    let rows: Vec<ClassifyRow> = dispatch::run(chunks, 1, move |record| {
        let classifier = classifier.clone();
        async move { classifier.classify(record).await }
    })
    .await?;

    io::write_rows(
        io::create_output(&config.output_csv)?,
        &OUTPUT_HEADER,
        rows.iter().map(ClassifyRow::to_record),
    )?;

    let answered = rows.iter().filter(|r| !r.response.is_empty()).count();
    let ecommerce = rows.iter().filter(|r| r.analysis.ecommerce).count();
    info!(
        path = %config.output_csv.display(),
        total = rows.len(),
        answered,
        unanswered = rows.len() - answered,
        ecommerce,
        "run complete"
    );
    Ok(())
}
