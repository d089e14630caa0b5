/// Static scatter/gather fan-out.
///
/// Records are split round-robin into one chunk per worker before any work starts
/// (`records[i::W]`). Each worker is a tokio task that owns its chunk and processes it in
/// order; with `concurrency > 1` up to that many jobs overlap inside the worker while
/// results still come back in chunk order. The coordinator waits for every worker,
/// concatenates the outputs and restores input order by record index.
///
/// A worker that panics aborts the whole run: the remaining workers are cancelled and no
/// partial results are returned.
use std::future::Future;

use futures::StreamExt;
use tracing::{debug, info};

use crate::model::ScoreResult;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("worker {worker} failed: {reason}")]
    WorkerFailed { worker: usize, reason: String },

    #[error("result count mismatch: expected {expected}, got {actual}")]
    ResultCountMismatch { expected: usize, actual: usize },
}

/// Anything that remembers its position in the original input.
pub trait Indexed {
    fn index(&self) -> usize;
}

impl Indexed for ScoreResult {
    fn index(&self) -> usize {
        self.index
    }
}

/// The records assigned to one worker for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub worker: usize,
    pub items: Vec<T>,
}

/// Split `items` round-robin across `workers` chunks. Item `i` goes to chunk `i % workers`,
/// keeping relative order inside each chunk. More workers than items yields empty chunks.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Result<Vec<Chunk<T>>, DispatchError> {
    if workers == 0 {
        return Err(DispatchError::NoWorkers);
    }
    let per_chunk = items.len() / workers + 1;
    let mut chunks: Vec<Chunk<T>> = (0..workers)
        .map(|worker| Chunk {
            worker,
            items: Vec::with_capacity(per_chunk),
        })
        .collect();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % workers].items.push(item);
    }
    Ok(chunks)
}

/// Run `job` over every item of every chunk and gather the results in input order.
pub async fn run<T, R, F, Fut>(
    chunks: Vec<Chunk<T>>,
    concurrency: usize,
    job: F,
) -> Result<Vec<R>, DispatchError>
where
    T: Send + 'static,
    R: Indexed + Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let expected: usize = chunks.iter().map(|c| c.items.len()).sum();
    let concurrency = concurrency.max(1);
    info!(
        workers = chunks.len(),
        records = expected,
        concurrency,
        "dispatching chunks"
    );

    let handles: Vec<(usize, tokio::task::JoinHandle<Vec<R>>)> = chunks
        .into_iter()
        .map(|chunk| {
            let worker = chunk.worker;
            let job = job.clone();
            (worker, tokio::spawn(run_chunk(chunk, concurrency, job)))
        })
        .collect();

    let mut results: Vec<R> = Vec::with_capacity(expected);
    let mut pending = handles.into_iter();
    while let Some((worker, handle)) = pending.next() {
        match handle.await {
            Ok(worker_results) => results.extend(worker_results),
            Err(e) => {
                for (_, rest) in pending.by_ref() {
                    rest.abort();
                }
                return Err(DispatchError::WorkerFailed {
                    worker,
                    reason: e.to_string(),
                });
            }
        }
    }

    if results.len() != expected {
        return Err(DispatchError::ResultCountMismatch {
            expected,
            actual: results.len(),
        });
    }

    results.sort_by_key(|r| r.index());
    Ok(results)
}

async fn run_chunk<T, R, F, Fut>(chunk: Chunk<T>, concurrency: usize, job: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let worker = chunk.worker;
    let total = chunk.items.len();
    debug!(worker, records = total, "worker started");

    let mut out = Vec::with_capacity(total);
    let mut stream = futures::stream::iter(chunk.items.into_iter().map(job)).buffered(concurrency);
    while let Some(result) = stream.next().await {
        out.push(result);
        if out.len() % PROGRESS_EVERY == 0 {
            info!(worker, done = out.len(), total, "worker progress");
        }
    }

    info!(worker, records = total, "worker finished");
    out
}
