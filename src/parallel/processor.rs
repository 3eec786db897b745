use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded};

use crate::scanner::CancelFlag;

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of worker threads (0 = derive from CPU count)
    pub workers: usize,
    /// Percentage of CPU cores to use when deriving (1-100)
    pub thread_percentage: u8,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            thread_percentage: 75,
        }
    }
}

/// Everything the pool produced before it stopped
#[derive(Debug)]
pub struct Processed<R> {
    /// Results in the order workers finished them
    pub results: Vec<R>,
    /// True when the cancel flag stopped dispatch before all items ran
    pub cancelled: bool,
}

/// Generic parallel processor for work distribution
pub struct ParallelProcessor {
    config: ParallelConfig,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    /// Calculate the number of worker threads for `work_count` items
    pub fn calculate_optimal_workers(&self, work_count: usize) -> usize {
        let requested = if self.config.workers > 0 {
            self.config.workers
        } else {
            let cpu_cores = num_cpus::get();
            let percentage = self.config.thread_percentage.clamp(1, 100) as usize;
            std::cmp::max(1, (cpu_cores * percentage) / 100)
        };

        // Don't create more workers than work items
        std::cmp::min(requested, work_count.max(1))
    }

    /// Run `worker_fn` over every item on the worker pool.
    ///
    /// Each item is handed to exactly one worker. Once `cancel` is raised no
    /// further items are started; items already running finish and their
    /// results are kept.
    pub fn process<T, R, F>(&self, work_items: Vec<T>, worker_fn: F, cancel: &CancelFlag) -> Result<Processed<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let work_count = work_items.len();
        if work_count == 0 {
            return Ok(Processed {
                results: Vec::new(),
                cancelled: cancel.is_cancelled(),
            });
        }

        let workers = self.calculate_optimal_workers(work_count);
        tracing::debug!(workers, items = work_count, "Starting worker pool");

        // Total work is known up front, so both queues can hold all of it
        let (work_tx, work_rx): (Sender<T>, Receiver<T>) = bounded(work_count);
        let (result_tx, result_rx): (Sender<R>, Receiver<R>) = bounded(work_count);

        let mut dispatched = 0usize;
        for item in work_items {
            if cancel.is_cancelled() {
                break;
            }
            if work_tx.send(item).is_err() {
                break;
            }
            dispatched += 1;
        }
        // Close the work channel so workers exit once it drains
        drop(work_tx);

        let worker_fn = &worker_fn;
        let results = crossbeam::thread::scope(|s| {
            for worker_id in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();

                s.spawn(move |_| {
                    while let Ok(item) = work_rx.recv() {
                        if cancel.is_cancelled() {
                            tracing::trace!(worker_id, "Cancelled, dropping queued item");
                            continue;
                        }
                        if result_tx.send(worker_fn(item)).is_err() {
                            break; // Receiver dropped
                        }
                    }
                });
            }

            // Drop the original sender so the collector sees the end of the stream
            drop(result_tx);

            Self::collect_results(result_rx, dispatched)
        })
        .map_err(|_| anyhow::anyhow!("Thread panic occurred during parallel processing"))?;

        let cancelled = results.len() < work_count;
        Ok(Processed { results, cancelled })
    }

    /// Collect results from workers until every sender is gone
    fn collect_results<R>(result_rx: Receiver<R>, expected: usize) -> Vec<R> {
        let mut results = Vec::with_capacity(expected);
        while let Ok(result) = result_rx.recv() {
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn processor(workers: usize) -> ParallelProcessor {
        ParallelProcessor::new(ParallelConfig {
            workers,
            ..ParallelConfig::default()
        })
    }

    #[test]
    fn test_every_item_processed_once() {
        let seen = Mutex::new(Vec::new());
        let items: Vec<usize> = (0..200).collect();
        let processed = processor(8)
            .process(
                items,
                |x| {
                    seen.lock().unwrap().push(x);
                    x * 2
                },
                &CancelFlag::new(),
            )
            .unwrap();

        assert!(!processed.cancelled);
        assert_eq!(processed.results.len(), 200);
        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
        let unique: HashSet<usize> = processed.results.into_iter().collect();
        assert_eq!(unique.len(), 200);
    }

    #[test]
    fn test_single_worker() {
        let processed = processor(1)
            .process(vec!["a", "b", "c"], |s| s.to_uppercase(), &CancelFlag::new())
            .unwrap();
        assert_eq!(processed.results, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_empty_input() {
        let processed = processor(4).process(Vec::<u8>::new(), |x| x, &CancelFlag::new()).unwrap();
        assert!(processed.results.is_empty());
        assert!(!processed.cancelled);
    }

    #[test]
    fn test_cancel_before_start_runs_nothing() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let processed = processor(2).process(vec![1, 2, 3], |x| x, &cancel).unwrap();
        assert!(processed.results.is_empty());
        assert!(processed.cancelled);
    }

    #[test]
    fn test_cancel_mid_run_keeps_finished_results() {
        let cancel = CancelFlag::new();
        let started = AtomicUsize::new(0);
        let processed = processor(1)
            .process(
                (0..50).collect::<Vec<_>>(),
                |x| {
                    if started.fetch_add(1, Ordering::SeqCst) == 4 {
                        cancel.cancel();
                    }
                    std::thread::sleep(Duration::from_millis(1));
                    x
                },
                &cancel,
            )
            .unwrap();

        assert!(processed.cancelled);
        assert_eq!(processed.results, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_optimal_workers_calculation() {
        assert_eq!(processor(8).calculate_optimal_workers(3), 3);
        assert_eq!(processor(2).calculate_optimal_workers(100), 2);
        assert_eq!(processor(4).calculate_optimal_workers(0), 1);

        let auto = processor(0).calculate_optimal_workers(1000);
        assert!(auto >= 1);
        assert!(auto <= num_cpus::get());
    }
}
