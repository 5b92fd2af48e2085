//! Execution of the per-partition phases.
//!
//! With the `parallel` feature each partition runs as one Rayon task, on a
//! dedicated pool when `num_threads` is set and on the global pool otherwise.
//! Without it the partitions run in index order on the calling thread.
//! Results come back in partition order either way.

use crate::partition::PartitionState;
use crate::SimResult;
#[cfg(feature = "parallel")]
use crate::SimError;

#[derive(Debug)]
pub(crate) struct Workers {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Workers {
    #[cfg(feature = "parallel")]
    pub fn new(num_threads: Option<usize>) -> SimResult<Self> {
        let pool = match num_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("qs-partition-{i}"))
                    .build()
                    .map_err(|e| SimError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    #[cfg(not(feature = "parallel"))]
    pub fn new(_num_threads: Option<usize>) -> SimResult<Self> {
        Ok(Self {})
    }

    /// Run `f` once per partition.
    pub fn each<T, F>(&self, parts: &mut [PartitionState], f: F) -> SimResult<Vec<T>>
    where
        T: Send,
        F: Fn(&mut PartitionState) -> SimResult<T> + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let mut run = || parts.par_iter_mut().map(|p| f(p)).collect::<SimResult<Vec<T>>>();
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            parts.iter_mut().map(f).collect()
        }
    }

    /// Run `f` once per partition with that partition's entry of `inputs`.
    pub fn zip_each<I, T, F>(
        &self,
        parts:  &mut [PartitionState],
        inputs: Vec<I>,
        f:      F,
    ) -> SimResult<Vec<T>>
    where
        I: Send,
        T: Send,
        F: Fn(&mut PartitionState, I) -> SimResult<T> + Sync + Send,
    {
        debug_assert_eq!(parts.len(), inputs.len());

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let run = || {
                parts
                    .par_iter_mut()
                    .zip(inputs.into_par_iter())
                    .map(|(p, input)| f(p, input))
                    .collect::<SimResult<Vec<T>>>()
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            parts.iter_mut().zip(inputs).map(|(p, input)| f(p, input)).collect()
        }
    }
}
