#![allow(dead_code)]

use fluxbench::{Bencher, flux};
use std::hint::black_box;

use convflow::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ramp_f32(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| ((i * 17 + 3) % 1000) as f32 / 1000.0)
        .collect()
}

fn ramp_lanes(lanes: usize, n: usize) -> Vec<Vec<f32>> {
    (0..lanes).map(|l| ramp_f32(n + l)[l..].to_vec()).collect()
}

// ---------------------------------------------------------------------------
// Single tree: filter volumes of common layers
// ---------------------------------------------------------------------------

#[flux::bench(group = "tree_f32")]
fn tree_pairwise_27(b: &mut Bencher) {
    let mut tree = ReductionTree::<f32>::new(ReductionPlan::pairwise(27).unwrap());
    let input = ramp_f32(27);
    b.iter(|| black_box(tree.reduce(&input)));
}

#[flux::bench(group = "tree_f32")]
fn tree_pairwise_576(b: &mut Bencher) {
    let mut tree = ReductionTree::<f32>::new(ReductionPlan::pairwise(576).unwrap());
    let input = ramp_f32(576);
    b.iter(|| black_box(tree.reduce(&input)));
}

#[flux::bench(group = "tree_f32")]
fn tree_auto_576(b: &mut Bencher) {
    let mut tree = ReductionTree::<f32>::auto(576).unwrap();
    let input = ramp_f32(576);
    b.iter(|| black_box(tree.reduce(&input)));
}

#[flux::bench(group = "tree_f32")]
fn tree_auto_4608(b: &mut Bencher) {
    let mut tree = ReductionTree::<f32>::auto(4608).unwrap();
    let input = ramp_f32(4608);
    b.iter(|| black_box(tree.reduce(&input)));
}

#[flux::bench(group = "tree_f32")]
fn linear_sum_4608(b: &mut Bencher) {
    let input = ramp_f32(4608);
    b.iter(|| black_box(input.iter().sum::<f32>()));
}

// ---------------------------------------------------------------------------
// Lanes: one channel group
// ---------------------------------------------------------------------------

#[flux::bench(group = "lanes_f32")]
fn lanes_sequential_32x576(b: &mut Bencher) {
    let plan = ReductionPlan::auto(576).unwrap();
    let mut reducer = LaneReducer::<f32>::new(plan, 32, ParallelismConfig::sequential()).unwrap();
    let products = ramp_lanes(32, 576);
    let mut sums = vec![0.0f32; 32];
    b.iter(|| {
        reducer.reduce_lanes(&products, &mut sums);
        black_box(sums[0])
    });
}

#[flux::bench(group = "lanes_f32")]
fn lanes_parallel_32x576(b: &mut Bencher) {
    let plan = ReductionPlan::auto(576).unwrap();
    let mut reducer = LaneReducer::<f32>::new(plan, 32, ParallelismConfig::default()).unwrap();
    let products = ramp_lanes(32, 576);
    let mut sums = vec![0.0f32; 32];
    b.iter(|| {
        reducer.reduce_lanes(&products, &mut sums);
        black_box(sums[0])
    });
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

#[flux::compare(
    id = "tree_vs_linear",
    title = "Staged tree vs linear sum (4608 values)",
    benchmarks = ["tree_auto_4608", "linear_sum_4608"],
    baseline = "linear_sum_4608",
    metric = "mean"
)]
struct TreeVsLinear;

#[flux::compare(
    id = "lanes_32",
    title = "32 lanes of 576 (sequential vs rayon)",
    benchmarks = ["lanes_sequential_32x576", "lanes_parallel_32x576"],
    baseline = "lanes_sequential_32x576",
    metric = "mean"
)]
struct Lanes32;

#[flux::synthetic(
    id = "lane_speedup",
    formula = "lanes_sequential_32x576 / lanes_parallel_32x576",
    unit = "x"
)]
struct LaneSpeedup;

fn main() {
    fluxbench_cli::run().unwrap();
}
