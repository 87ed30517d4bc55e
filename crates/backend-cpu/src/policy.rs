//! Loop execution policies over index ranges.
//!
//! `Forall_*` kernel bodies are written once as closures over an index (or a
//! row of an output buffer) and handed to one of the entry points together
//! with an [`ExecPolicy`]. `Seq` runs a plain loop on the calling thread, `Par`
//! splits the range across the current rayon pool.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecPolicy {
    Seq,
    /// Rayon-parallel; `min_len` is the smallest number of indices a task
    /// will be split down to.
    Par { min_len: usize },
}

impl ExecPolicy {
    pub fn par() -> Self {
        ExecPolicy::Par { min_len: 1 }
    }

    pub fn par_chunked(min_len: usize) -> Self {
        ExecPolicy::Par {
            min_len: min_len.max(1),
        }
    }
}

impl Default for ExecPolicy {
    fn default() -> Self {
        ExecPolicy::Seq
    }
}

/// Invoke `body(i, &mut a[i], &mut b[i], &mut c[i])` for every index. All
/// outputs must have equal length.
pub fn forall_mut3<A, B, C, F>(policy: ExecPolicy, a: &mut [A], b: &mut [B], c: &mut [C], body: F)
where
    A: Send,
    B: Send,
    C: Send,
    F: Fn(usize, &mut A, &mut B, &mut C) + Send + Sync,
{
    assert!(
        a.len() == b.len() && b.len() == c.len(),
        "forall_mut3 output length mismatch: {} / {} / {}",
        a.len(),
        b.len(),
        c.len()
    );
    match policy {
        ExecPolicy::Seq => a
            .iter_mut()
            .zip(b.iter_mut())
            .zip(c.iter_mut())
            .enumerate()
            .for_each(|(i, ((x, y), z))| body(i, x, y, z)),
        ExecPolicy::Par { min_len } => a
            .par_iter_mut()
            .zip(b.par_iter_mut())
            .zip(c.par_iter_mut())
            .with_min_len(min_len)
            .enumerate()
            .for_each(|(i, ((x, y), z))| body(i, x, y, z)),
    }
}

/// Invoke `body(row, chunk)` for consecutive `row_len`-sized chunks of `out`.
/// A trailing partial chunk is passed as-is.
pub fn forall_rows<T, F>(policy: ExecPolicy, out: &mut [T], row_len: usize, body: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if row_len == 0 {
        return;
    }
    match policy {
        ExecPolicy::Seq => out
            .chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, chunk)| body(row, chunk)),
        ExecPolicy::Par { min_len } => out
            .par_chunks_mut(row_len)
            .with_min_len(min_len)
            .enumerate()
            .for_each(|(row, chunk)| body(row, chunk)),
    }
}

/// Replace every element with the sum of the elements before it and return
/// the total.
pub fn exclusive_scan_inplace(values: &mut [usize]) -> usize {
    let mut running = 0usize;
    for value in values.iter_mut() {
        let current = *value;
        *value = running;
        running += current;
    }
    running
}

/// Stable stream compaction: writes `map(i)` for every `i` in `0..len` where
/// `keep(i)` holds into the front of `out`, preserving index order, and
/// returns the number of elements written.
///
/// The parallel path counts per block, scans the counts and writes each block
/// into its own disjoint window of `out`, so the result is identical to the
/// sequential path.
pub fn stream_compact<T, P, M>(
    policy: ExecPolicy,
    len: usize,
    out: &mut [T],
    keep: P,
    map: M,
) -> usize
where
    T: Send,
    P: Fn(usize) -> bool + Send + Sync,
    M: Fn(usize) -> T + Send + Sync,
{
    assert!(out.len() >= len, "compaction output shorter than input range");
    match policy {
        ExecPolicy::Seq => {
            let mut count = 0;
            for i in 0..len {
                if keep(i) {
                    out[count] = map(i);
                    count += 1;
                }
            }
            count
        }
        ExecPolicy::Par { min_len } => {
            let block = compaction_block(len, min_len);
            let blocks = len.div_ceil(block);

            let mut offsets: Vec<usize> = (0..blocks)
                .into_par_iter()
                .map(|b| {
                    let end = ((b + 1) * block).min(len);
                    (b * block..end).filter(|&i| keep(i)).count()
                })
                .collect();
            let total = exclusive_scan_inplace(&mut offsets);

            let mut windows = Vec::with_capacity(blocks);
            let mut rest = &mut out[..total];
            for b in 0..blocks {
                let end = offsets.get(b + 1).copied().unwrap_or(total);
                let (window, tail) = std::mem::take(&mut rest).split_at_mut(end - offsets[b]);
                windows.push((b, window));
                rest = tail;
            }

            windows.into_par_iter().for_each(|(b, window)| {
                let end = ((b + 1) * block).min(len);
                let mut slot = 0;
                for i in b * block..end {
                    if keep(i) {
                        window[slot] = map(i);
                        slot += 1;
                    }
                }
            });
            total
        }
    }
}

fn compaction_block(len: usize, min_len: usize) -> usize {
    let threads = rayon::current_num_threads().max(1);
    (len / (threads * 4)).max(min_len).max(1)
}
