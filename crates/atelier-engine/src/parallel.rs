//! Row-level fan-out for batch recomputation.
//!
//! Rows never read each other, so the batch runs on a crate-local Rayon pool when the `parallel`
//! feature is on and a pool can be built, and sequentially otherwise. Results keep row order
//! either way.

use atelier_model::Row;

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::ThreadPool;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::sync::OnceLock;

/// Built lazily; `None` when the host refuses to spawn worker threads.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
static ROW_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn build_row_pool() -> Option<ThreadPool> {
    let requested = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let try_build = |n| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("atelier-recompute-{i}"))
            .build()
    };

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(_) if requested > 1 => try_build(1).ok(),
        Err(err) => {
            log::warn!("recompute pool unavailable, running batches sequentially: {err}");
            None
        }
    }
}

/// Below this many rows the pool hand-off costs more than it saves.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
const MIN_PARALLEL_ROWS: usize = 64;

/// Apply `f` to every row, in parallel when possible, returning results in row order.
pub(crate) fn map_rows<R, F>(rows: &mut [Row], f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&mut Row) -> R + Sync + Send,
{
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    {
        use rayon::prelude::*;

        if rows.len() >= MIN_PARALLEL_ROWS {
            if let Some(pool) = ROW_POOL.get_or_init(build_row_pool).as_ref() {
                return pool.install(|| rows.par_iter_mut().map(|row| f(row)).collect());
            }
        }
    }

    rows.iter_mut().map(f).collect()
}
