//! Fork-join evaluation over contiguous output blocks
//!
//! The output buffer is split into one contiguous block per worker, with
//! block sizes differing by at most one. Each block is written by exactly
//! one task, so results do not depend on the worker count or on scheduling
//! order.

use crate::core::{Parallelism, Result};
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Lengths of the contiguous blocks covering `len` slots shared by `workers`
///
/// There are `min(workers, len)` blocks and the first `len % blocks` of them
/// take one extra slot. `workers == 0` counts as one worker.
pub fn block_lengths(len: usize, workers: usize) -> Vec<usize> {
    let blocks = workers.max(1).min(len);
    if blocks == 0 {
        return Vec::new();
    }
    let base = len / blocks;
    let extra = len % blocks;
    (0..blocks).map(|b| base + usize::from(b < extra)).collect()
}

/// Cut `output` into blocks of the given lengths, tagged with their offset
fn split_blocks<'a, T>(mut rest: &'a mut [T], lengths: &[usize]) -> Vec<(usize, &'a mut [T])> {
    let mut blocks = Vec::with_capacity(lengths.len());
    let mut start = 0;
    for &n in lengths {
        let (block, tail) = std::mem::take(&mut rest).split_at_mut(n);
        blocks.push((start, block));
        start += n;
        rest = tail;
    }
    blocks
}

/// Advisory progress counter; reports through the logger only
struct Progress {
    total: usize,
    done: AtomicUsize,
    enabled: bool,
}

impl Progress {
    fn new(total: usize, enabled: bool) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            enabled,
        }
    }

    fn advance(&self, n: usize) {
        if !self.enabled {
            return;
        }
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        debug!(
            "{}/{} vectors processed ({:.0}%)",
            done,
            self.total,
            100.0 * done as f64 / self.total as f64
        );
    }
}

/// Workers for one [`Parallelism`] setting
///
/// With `num_threads > 1` a local rayon pool is built by the first fill that
/// needs it and reused by every later fill through this value. `0` uses
/// rayon's current pool and `1` runs on the calling thread.
#[derive(Debug)]
pub struct WorkerPool {
    parallelism: Parallelism,
    pool: OnceLock<ThreadPool>,
}

impl WorkerPool {
    pub fn new(parallelism: &Parallelism) -> Self {
        Self {
            parallelism: *parallelism,
            pool: OnceLock::new(),
        }
    }

    pub fn parallelism(&self) -> &Parallelism {
        &self.parallelism
    }

    /// Number of blocks a fill is split into
    pub fn num_workers(&self) -> usize {
        match self.parallelism.num_threads {
            0 => rayon::current_num_threads(),
            n => n,
        }
    }

    fn local_pool(&self) -> Result<&ThreadPool> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let built = ThreadPoolBuilder::new()
            .num_threads(self.parallelism.num_threads)
            .build()?;
        debug!(
            "built worker pool with {} threads",
            self.parallelism.num_threads
        );
        Ok(self.pool.get_or_init(|| built))
    }

    /// Fill `output` block by block, calling `fill(start, block)` where
    /// `start` is the offset of `block` within `output`
    ///
    /// The first error from any block is returned after all workers join.
    pub fn fill_blocks<T, F>(&self, output: &mut [T], fill: F) -> Result<()>
    where
        T: Send,
        F: Fn(usize, &mut [T]) -> Result<()> + Sync,
    {
        let len = output.len();
        if len == 0 {
            return Ok(());
        }

        let progress = Progress::new(len, self.parallelism.show_progress);

        if self.parallelism.num_threads == 1 {
            fill(0, output)?;
            progress.advance(len);
            return Ok(());
        }

        let blocks = split_blocks(output, &block_lengths(len, self.num_workers()));
        let run = || {
            blocks.into_par_iter().try_for_each(|(start, block)| {
                fill(start, block)?;
                progress.advance(block.len());
                Ok(())
            })
        };

        if self.parallelism.num_threads == 0 {
            run()
        } else {
            self.local_pool()?.install(run)
        }
    }
}

/// One-shot [`WorkerPool::fill_blocks`] for callers with a single fill
pub fn fill_blocks<T, F>(output: &mut [T], parallelism: &Parallelism, fill: F) -> Result<()>
where
    T: Send,
    F: Fn(usize, &mut [T]) -> Result<()> + Sync,
{
    WorkerPool::new(parallelism).fill_blocks(output, fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MachineError;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread::ThreadId;

    #[test]
    fn test_block_lengths() {
        assert_eq!(block_lengths(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(block_lengths(9, 4), vec![3, 2, 2, 2]);
        assert_eq!(block_lengths(10, 3), vec![4, 3, 3]);
        assert_eq!(block_lengths(2, 8), vec![1, 1]);
        assert_eq!(block_lengths(5, 0), vec![5]);
        assert!(block_lengths(0, 4).is_empty());
    }

    #[test]
    fn test_block_lengths_differ_by_at_most_one() {
        for len in 1..40 {
            for workers in 1..9 {
                let lengths = block_lengths(len, workers);
                let min = lengths.iter().copied().min().expect("non-empty");
                let max = lengths.iter().copied().max().expect("non-empty");

                assert_eq!(lengths.len(), workers.min(len));
                assert_eq!(lengths.iter().sum::<usize>(), len);
                assert!(max - min <= 1, "len = {len}, workers = {workers}");
            }
        }
    }

    #[test]
    fn test_one_block_per_worker() {
        let offsets = Mutex::new(Vec::new());
        let mut output = vec![0u8; 9];
        fill_blocks(&mut output, &Parallelism::with_threads(4), |start, block| {
            offsets
                .lock()
                .expect("offsets lock")
                .push((start, block.len()));
            Ok(())
        })
        .expect("fill should succeed");

        let mut offsets = offsets.into_inner().expect("offsets lock");
        offsets.sort_unstable();
        assert_eq!(offsets, vec![(0, 3), (3, 2), (5, 2), (7, 2)]);
    }

    #[test]
    fn test_every_slot_written_once() {
        for threads in [0, 1, 2, 3, 7] {
            let mut output = vec![0usize; 23];
            fill_blocks(&mut output, &Parallelism::with_threads(threads), |start, block| {
                for (offset, slot) in block.iter_mut().enumerate() {
                    *slot += start + offset + 1;
                }
                Ok(())
            })
            .expect("fill should succeed");

            let expected: Vec<usize> = (1..=23).collect();
            assert_eq!(output, expected, "threads = {threads}");
        }
    }

    /// Repeated fills through one pool stay on that pool's threads
    #[test]
    fn test_pool_reused_across_fills() {
        let workers = WorkerPool::new(&Parallelism::with_threads(3));
        assert_eq!(workers.num_workers(), 3);

        let seen: Mutex<HashSet<ThreadId>> = Mutex::new(HashSet::new());
        for _ in 0..5 {
            let mut output = vec![0.0; 30];
            workers
                .fill_blocks(&mut output, |_, block| {
                    assert_eq!(rayon::current_num_threads(), 3);
                    seen.lock()
                        .expect("thread set lock")
                        .insert(std::thread::current().id());
                    block.iter_mut().for_each(|slot| *slot = 1.0);
                    Ok(())
                })
                .expect("fill should succeed");
            assert!(output.iter().all(|&v| v == 1.0));
        }

        let seen = seen.into_inner().expect("thread set lock");
        assert!(seen.len() <= 3, "{} distinct worker threads", seen.len());
    }

    #[test]
    fn test_sequential_needs_no_pool() {
        let workers = WorkerPool::new(&Parallelism::sequential());
        assert_eq!(workers.num_workers(), 1);

        let caller = std::thread::current().id();
        let mut output = vec![0; 5];
        workers
            .fill_blocks(&mut output, |start, block| {
                assert_eq!(start, 0);
                assert_eq!(std::thread::current().id(), caller);
                block.iter_mut().for_each(|slot| *slot = 7);
                Ok(())
            })
            .expect("fill should succeed");
        assert_eq!(output, vec![7; 5]);
    }

    #[test]
    fn test_empty_output() {
        let mut output: Vec<f64> = Vec::new();
        fill_blocks(&mut output, &Parallelism::with_threads(4), |_, _| {
            Err(MachineError::Configuration("never called".into()))
        })
        .expect("empty output needs no work");
    }

    #[test]
    fn test_error_propagates() {
        let mut output = vec![0.0; 8];
        let result = fill_blocks(&mut output, &Parallelism::with_threads(2), |start, _| {
            if start > 0 {
                Err(MachineError::Configuration("second block".into()))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(MachineError::Configuration(_))));
    }

    #[test]
    fn test_progress_does_not_change_values() {
        let mut quiet = vec![0.0; 16];
        let mut loud = vec![0.0; 16];
        let fill = |start: usize, block: &mut [f64]| {
            for (offset, slot) in block.iter_mut().enumerate() {
                *slot = ((start + offset) as f64).sqrt();
            }
            Ok(())
        };

        fill_blocks(&mut quiet, &Parallelism::with_threads(3), fill).expect("fill");
        fill_blocks(
            &mut loud,
            &Parallelism::with_threads(3).with_progress(true),
            fill,
        )
        .expect("fill");
        assert_eq!(quiet, loud);
    }
}
