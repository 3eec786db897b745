//! Generic parallel execution framework
//!
//! A fixed pool of worker threads pulls work items from one bounded channel
//! and pushes results into another; the caller's thread collects them. Both
//! channels are sized to the number of items, so producers never block once
//! discovery is done.
//!
//! The module knows nothing about files or tokens. Callers hand it a list of
//! items and a worker function and get results back in completion order.
//!
//! ```rust
//! use canary_sweep::parallel::{ParallelConfig, ParallelProcessor};
//! use canary_sweep::scanner::CancelFlag;
//!
//! let processor = ParallelProcessor::new(ParallelConfig { workers: 4, ..Default::default() });
//! let processed = processor.process(vec![1, 2, 3], |x| x * 2, &CancelFlag::new()).unwrap();
//! let mut results = processed.results;
//! results.sort();
//! assert_eq!(results, vec![2, 4, 6]);
//! ```

pub mod processor;

pub use processor::{ParallelConfig, ParallelProcessor, Processed};
