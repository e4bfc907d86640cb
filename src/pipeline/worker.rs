//! Chunk worker pool.
//!
//! Chunks are fed to `states.len()` scoped threads through a crossbeam job
//! channel. Every worker owns one state value (its private copy of the node
//! graph, for instance) and sends `(chunk index, result)` back on a result
//! channel. Results are stored by chunk index, so the outcome never depends
//! on completion order.
//!
//! A shared watermark records the lowest failing chunk index. Workers skip
//! every chunk above it, and chunks below it still run, so the reported
//! error is the one a sequential run would report.

use crate::pipeline::chunking::ChunkRange;
use crate::pipeline::error::PipelineError;
use crossbeam_channel::unbounded;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Logs every ~10% of completed chunks when enabled.
struct Progress {
    enabled: bool,
    total: usize,
    step: usize,
    done: usize,
}

impl Progress {
    fn new(enabled: bool, total: usize) -> Self {
        Self {
            enabled,
            total,
            step: (total / 10).max(1),
            done: 0,
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        if self.enabled && (self.done % self.step == 0 || self.done == self.total) {
            tracing::info!(
                "Processed {}/{} chunks ({:.0}%)",
                self.done,
                self.total,
                100.0 * self.done as f64 / self.total.max(1) as f64
            );
        }
    }
}

/// Run `work` over every chunk, one state per worker thread.
///
/// A single state runs everything inline on the calling thread.
pub fn run_chunks<S, T, E, F>(
    chunks: &[ChunkRange],
    states: Vec<S>,
    progress: bool,
    work: F,
) -> Result<Vec<T>, E>
where
    S: Send,
    T: Send,
    E: Send + From<PipelineError>,
    F: Fn(&mut S, &ChunkRange) -> Result<T, E> + Sync,
{
    let mut progress = Progress::new(progress, chunks.len());

    if states.len() <= 1 || chunks.len() <= 1 {
        let mut state = states
            .into_iter()
            .next()
            .ok_or_else(|| E::from(PipelineError::WorkerLost))?;
        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            results.push(work(&mut state, chunk)?);
            progress.tick();
        }
        return Ok(results);
    }

    let (job_tx, job_rx) = unbounded::<usize>();
    for index in 0..chunks.len() {
        job_tx
            .send(index)
            .map_err(|_| E::from(PipelineError::WorkerLost))?;
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<(usize, Result<T, E>)>();
    let failed_at = AtomicUsize::new(usize::MAX);
    let work = &work;
    let failed_at = &failed_at;

    let num_workers = states.len();
    tracing::debug!(
        "Dispatching {} chunks to {} workers",
        chunks.len(),
        num_workers
    );

    std::thread::scope(|scope| {
        let handles: Vec<_> = states
            .into_iter()
            .map(|mut state| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(index) = job_rx.recv() {
                        if index > failed_at.load(Ordering::Acquire) {
                            continue;
                        }
                        let result = work(&mut state, &chunks[index]);
                        if result.is_err() {
                            failed_at.fetch_min(index, Ordering::AcqRel);
                        }
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(result_tx);

        let mut slots: Vec<Option<T>> = (0..chunks.len()).map(|_| None).collect();
        let mut first_error: Option<(usize, E)> = None;

        for (index, result) in result_rx.iter() {
            match result {
                Ok(value) => slots[index] = Some(value),
                Err(e) => {
                    if first_error.as_ref().map_or(true, |(seen, _)| index < *seen) {
                        first_error = Some((index, e));
                    }
                }
            }
            progress.tick();
        }

        let mut lost = false;
        for handle in handles {
            if handle.join().is_err() {
                lost = true;
            }
        }

        if let Some((index, e)) = first_error {
            tracing::debug!("Chunk {} failed, discarding partial results", chunks[index]);
            return Err(e);
        }
        if lost {
            return Err(E::from(PipelineError::WorkerLost));
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| E::from(PipelineError::WorkerLost)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chunking::divide_recording;

    #[test]
    fn test_results_follow_chunk_order() {
        let chunks = divide_recording(1_000, 37);
        for workers in [1, 2, 4] {
            let out: Vec<usize> = run_chunks(&chunks, vec![(); workers], false, |_, chunk| {
                Ok::<_, PipelineError>(chunk.start)
            })
            .unwrap();
            let expected: Vec<usize> = chunks.iter().map(|c| c.start).collect();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn test_every_queued_chunk_runs_once() {
        let chunks = divide_recording(640, 10);
        let counts: Vec<AtomicUsize> = (0..chunks.len()).map(|_| AtomicUsize::new(0)).collect();
        run_chunks(&chunks, vec![(); 5], false, |_, chunk| {
            counts[chunk.index].fetch_add(1, Ordering::Relaxed);
            Ok::<_, PipelineError>(())
        })
        .unwrap();
        assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_each_worker_keeps_its_state() {
        let chunks = divide_recording(100, 1);
        let seen = AtomicUsize::new(0);
        let out = run_chunks(&chunks, vec![0usize; 3], true, |count, _| {
            *count += 1;
            seen.fetch_add(1, Ordering::Relaxed);
            Ok::<_, PipelineError>(*count)
        })
        .unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(seen.load(Ordering::Relaxed), 100);
        assert!(out.iter().all(|&c| (1..=100).contains(&c)));
    }

    #[test]
    fn test_lowest_failing_chunk_is_reported() {
        let chunks = divide_recording(50, 1);
        for workers in [1, 3] {
            let err = run_chunks(&chunks, vec![(); workers], false, |_, chunk| {
                if chunk.index == 7 || chunk.index == 30 {
                    Err(PipelineError::Compute(format!("bad chunk {}", chunk.index)))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
            assert_eq!(err.to_string(), "Compute error: bad chunk 7");
        }
    }

    #[test]
    fn test_no_states() {
        let chunks = divide_recording(10, 5);
        let result: Result<Vec<()>, PipelineError> =
            run_chunks(&chunks, Vec::<()>::new(), false, |_, _| Ok(()));
        assert!(matches!(result, Err(PipelineError::WorkerLost)));
    }

    #[test]
    fn test_panicking_worker_is_reported() {
        let chunks = divide_recording(20, 1);
        let result: Result<Vec<()>, PipelineError> =
            run_chunks(&chunks, vec![(); 2], false, |_, chunk| {
                if chunk.index == 3 {
                    panic!("worker died");
                }
                Ok(())
            });
        assert!(matches!(result, Err(PipelineError::WorkerLost)));
    }
}
