//! Producer / worker-pool insertion of one table.
//!
//! A single blocking producer owns the [`RowGenerator`] and pushes batches
//! onto a bounded channel; `workers` tasks pull batches and write them
//! through the shared [`SeedTarget`]. The first write failure cancels the
//! run: the producer stops generating and the workers drain what is left
//! without writing it.

use super::target::{InsertMode, SeedTarget};
use super::SeedError;
use crate::generator::{GenerateError, Row, RowGenerator};
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub workers: usize,
    pub mode: InsertMode,
}

/// Generate and write `rows` rows, returning how many were written
pub async fn run<T: SeedTarget + 'static>(
    target: Arc<T>,
    mut generator: RowGenerator,
    rows: u64,
    options: PipelineOptions,
    progress: Option<ProgressBar>,
) -> anyhow::Result<u64> {
    let table: Arc<str> = Arc::from(generator.table_name());
    let columns = Arc::new(generator.columns());
    let batch_size = options.batch_size.max(1);
    let workers = options.workers.max(1);

    let (tx, rx) = mpsc::channel::<Vec<Row>>(workers * 2);
    let rx = Arc::new(Mutex::new(rx));
    let cancel = CancellationToken::new();
    let failure: Arc<Mutex<Option<anyhow::Error>>> = Arc::new(Mutex::new(None));
    let inserted = Arc::new(AtomicU64::new(0));

    let producer = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || -> Result<(), GenerateError> {
            let mut remaining = rows;
            while remaining > 0 && !cancel.is_cancelled() {
                let size = remaining.min(batch_size as u64) as usize;
                let batch = match generator.generate_batch(size) {
                    Ok(batch) => batch,
                    Err(e) => {
                        cancel.cancel();
                        return Err(e);
                    }
                };
                if tx.blocking_send(batch).is_err() {
                    break;
                }
                remaining -= size as u64;
            }
            Ok(())
        })
    };

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let target = Arc::clone(&target);
        let rx = Arc::clone(&rx);
        let cancel = cancel.clone();
        let failure = Arc::clone(&failure);
        let inserted = Arc::clone(&inserted);
        let table = Arc::clone(&table);
        let columns = Arc::clone(&columns);
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let batch = rx.lock().await.recv().await;
                let Some(batch) = batch else {
                    break;
                };
                if cancel.is_cancelled() {
                    continue;
                }
                match target
                    .write_rows(options.mode, &table, &columns, &batch)
                    .await
                {
                    Ok(()) => {
                        let n = batch.len() as u64;
                        inserted.fetch_add(n, Ordering::Relaxed);
                        if let Some(pb) = &progress {
                            pb.inc(n);
                        }
                    }
                    Err(e) => {
                        let mut slot = failure.lock().await;
                        if slot.is_none() {
                            *slot = Some(e);
                            cancel.cancel();
                        }
                    }
                }
            }
        }));
    }

    let produced = producer.await?;
    for handle in handles {
        handle.await?;
    }

    if let Some(e) = failure.lock().await.take() {
        return Err(SeedError::Insert {
            table: table.to_string(),
            source: e.into(),
        }
        .into());
    }
    produced?;

    Ok(inserted.load(Ordering::Relaxed))
}
