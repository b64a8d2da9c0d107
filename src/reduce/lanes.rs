//! Independent per-lane reduction trees for one channel group.

use super::plan::ReductionPlan;
use super::tree::ReductionTree;
use crate::dtype::Element;
use crate::error::Result;
#[cfg(feature = "rayon")]
use crate::error::Error;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "rayon")]
use std::sync::Arc;

/// Lanes below which reduction stays on the calling thread.
const DEFAULT_MIN_PARALLEL_LANES: usize = 8;

/// Controls how channel-group lanes are spread across threads.
///
/// Lanes share no state, so they may be reduced in any order. Parallelism
/// only takes effect with the `rayon` feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParallelismConfig {
    num_threads: Option<usize>,
    min_lanes: Option<usize>,
}

impl ParallelismConfig {
    /// `num_threads`: dedicated pool size (`None` uses the global pool).
    /// `min_lanes`: smallest group reduced in parallel.
    pub fn new(num_threads: Option<usize>, min_lanes: Option<usize>) -> Self {
        Self {
            num_threads,
            min_lanes,
        }
    }

    /// Reduce every lane on the calling thread.
    pub fn sequential() -> Self {
        Self::new(Some(1), None)
    }

    /// Configured pool size.
    #[inline]
    pub fn num_threads(&self) -> Option<usize> {
        self.num_threads
    }

    /// Smallest lane count reduced in parallel.
    #[inline]
    pub fn min_lanes(&self) -> usize {
        self.min_lanes.unwrap_or(DEFAULT_MIN_PARALLEL_LANES).max(1)
    }

    #[cfg(feature = "rayon")]
    fn is_parallel_for(&self, lanes: usize) -> bool {
        self.num_threads != Some(1) && lanes >= self.min_lanes()
    }
}

/// One [`ReductionTree`] per lane of a channel group.
#[derive(Debug)]
pub struct LaneReducer<T: Element> {
    trees: Vec<ReductionTree<T>>,
    parallelism: ParallelismConfig,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<T: Element> LaneReducer<T> {
    /// Build `lanes` trees executing `plan`.
    pub fn new(plan: ReductionPlan, lanes: usize, parallelism: ParallelismConfig) -> Result<Self> {
        crate::layer::validate::validate_positive(lanes, "lanes")?;

        #[cfg(feature = "rayon")]
        let pool = match parallelism.num_threads() {
            Some(n) if n > 1 => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::invalid_argument("num_threads", e.to_string()))?,
            )),
            _ => None,
        };

        Ok(Self {
            trees: vec![ReductionTree::new(plan); lanes],
            parallelism,
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// Number of lanes.
    #[inline]
    pub fn lanes(&self) -> usize {
        self.trees.len()
    }

    /// Number of values each lane reduces.
    #[inline]
    pub fn input_len(&self) -> usize {
        self.trees[0].input_len()
    }

    /// Plan shared by every lane.
    #[inline]
    pub fn plan(&self) -> &ReductionPlan {
        self.trees[0].plan()
    }

    /// Reduce `products[lane]` into `sums[lane]` for every lane.
    pub fn reduce_lanes(&mut self, products: &[Vec<T>], sums: &mut [T]) {
        debug_assert_eq!(products.len(), self.trees.len(), "product lanes");
        debug_assert_eq!(sums.len(), self.trees.len(), "sum lanes");

        #[cfg(feature = "rayon")]
        {
            if self.parallelism.is_parallel_for(self.trees.len()) {
                let trees = &mut self.trees;
                let mut work = move || {
                    trees
                        .par_iter_mut()
                        .zip(products.par_iter())
                        .zip(sums.par_iter_mut())
                        .for_each(|((tree, lane), sum)| *sum = tree.reduce(lane));
                };
                match &self.pool {
                    Some(pool) => pool.install(work),
                    None => work(),
                }
                return;
            }
        }

        #[cfg(not(feature = "rayon"))]
        let _ = &self.parallelism;

        for ((tree, lane), sum) in self.trees.iter_mut().zip(products).zip(sums.iter_mut()) {
            *sum = tree.reduce(lane);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane_products(lanes: usize, n: usize) -> Vec<Vec<f64>> {
        (0..lanes)
            .map(|l| (0..n).map(|i| (l * n + i) as f64).collect())
            .collect()
    }

    fn expected(products: &[Vec<f64>]) -> Vec<f64> {
        products.iter().map(|lane| lane.iter().sum()).collect()
    }

    #[test]
    fn test_sequential_lanes() {
        let plan = ReductionPlan::pairwise(27).unwrap();
        let mut reducer =
            LaneReducer::<f64>::new(plan, 4, ParallelismConfig::sequential()).unwrap();
        let products = lane_products(4, 27);
        let mut sums = vec![0.0; 4];
        reducer.reduce_lanes(&products, &mut sums);
        assert_eq!(sums, expected(&products));
    }

    #[test]
    fn test_parallel_lanes_match_sequential() {
        let plan = ReductionPlan::auto(300).unwrap();
        let mut reducer =
            LaneReducer::<f64>::new(plan, 16, ParallelismConfig::new(Some(2), Some(2))).unwrap();
        let products = lane_products(16, 300);
        let mut sums = vec![0.0; 16];
        reducer.reduce_lanes(&products, &mut sums);
        assert_eq!(sums, expected(&products));
    }

    #[test]
    fn test_parallel_lanes_on_global_pool() {
        let plan = ReductionPlan::auto(64).unwrap();
        let mut reducer =
            LaneReducer::<i64>::new(plan, 8, ParallelismConfig::new(None, Some(2))).unwrap();
        let products: Vec<Vec<i64>> = (0..8).map(|l| (0..64).map(|i| l * 64 + i).collect()).collect();
        let mut sums = vec![0; 8];
        reducer.reduce_lanes(&products, &mut sums);
        let want: Vec<i64> = products.iter().map(|lane| lane.iter().sum()).collect();
        assert_eq!(sums, want);
    }

    #[test]
    fn test_zero_lanes_rejected() {
        let plan = ReductionPlan::pairwise(4).unwrap();
        assert!(LaneReducer::<f32>::new(plan, 0, ParallelismConfig::default()).is_err());
    }
}
