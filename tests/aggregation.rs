//! Integration tests for aggregators driven by real traversals
//!
//! Tests verify:
//! - Max pooling over windows produced by a pooled traversal
//! - Running sums over fusion slices, adjusted on commit
//! - Chained running sum and max pool for fused pooled layers

use convflow::aggregate::{AggregateFlags, Aggregator};
use convflow::index::{FusedIndexer, FusedPooledIndexer, PooledIndexer, Traversal};
use convflow::stages::{Activation, AdjustmentTable};

#[test]
fn test_max_pool_running_sequence() {
    let mut traversal = PooledIndexer::new(1, 1, 1, 2).unwrap();
    let mut agg = Aggregator::<f32>::max_pool(1).unwrap();

    let samples = [3.0, 7.0, 2.0, 5.0];
    let mut running = Vec::new();
    let mut committed = Vec::new();
    for (step, &v) in traversal.pass().zip(&samples) {
        if let Some(out) = agg.accept(&[v], AggregateFlags::from_step(&step)) {
            committed.push(out.to_vec());
        }
        running.push(agg.state()[0]);
    }
    assert_eq!(running, vec![3.0, 7.0, 7.0, 7.0]);
    assert_eq!(committed, vec![vec![7.0]]);
}

#[test]
fn test_max_pool_windows_are_independent() {
    // two windows in sequence; the second is smaller everywhere
    let mut traversal = PooledIndexer::new(1, 2, 1, 2).unwrap();
    let mut agg = Aggregator::<i32>::max_pool(2).unwrap();
    let samples = [
        [9, -1],
        [2, -5],
        [4, -3],
        [1, -2],
        [-7, -9],
        [-8, -6],
        [-6, -8],
        [-9, -7],
    ];
    let mut commits = Vec::new();
    for (step, values) in traversal.pass().zip(&samples) {
        if let Some(out) = agg.accept(values, AggregateFlags::from_step(&step)) {
            commits.push((step.output.col, out.to_vec()));
        }
    }
    assert_eq!(commits, vec![(0, vec![9, -1]), (1, vec![-6, -6])]);
}

#[test]
fn test_fusion_accumulation_commits_on_fourth_step() {
    let mut traversal = FusedIndexer::new(1, 1, 4).unwrap();
    let table = AdjustmentTable::<f64>::identity(1);
    let mut agg = Aggregator::running_sum(table);

    let partials = [2.0, 3.0, 5.0, 1.0];
    let mut commit_at = Vec::new();
    for (n, (step, &v)) in traversal.pass().zip(&partials).enumerate() {
        if let Some(out) = agg.accept(&[v], AggregateFlags::from_step(&step)) {
            commit_at.push((n, out[0]));
        }
    }
    assert_eq!(commit_at, vec![(3, 11.0)]);
    assert_eq!(agg.last_raw(), Some(&[11.0][..]));
    assert_eq!(agg.state(), &[0.0]);
}

#[test]
fn test_fusion_adjusts_only_committed_sum() {
    let table =
        AdjustmentTable::from_columns(&[20.0f32], &[1.0], &[0.0], Activation::Relu).unwrap();
    let mut agg = Aggregator::running_sum(table);
    let mut traversal = FusedIndexer::new(1, 2, 2).unwrap();

    let partials = [5.0, 10.0, 15.0, 10.0];
    let mut out = Vec::new();
    for (step, &v) in traversal.pass().zip(&partials) {
        if let Some(values) = agg.accept(&[v], AggregateFlags::from_step(&step)) {
            out.push(values[0]);
        }
        // intermediate state is the raw running sum, not adjusted
        if !step.commit {
            assert_eq!(agg.state()[0], v);
        }
    }
    // relu((15 - 20)) = 0, relu(25 - 20) = 5
    assert_eq!(out, vec![0.0, 5.0]);
}

#[test]
fn test_fused_pooled_chain() {
    let (p, steps) = (2, 2);
    let mut traversal = FusedPooledIndexer::new(1, 1, p, steps).unwrap();
    let mut sum = Aggregator::running_sum(AdjustmentTable::<i32>::identity(1));
    let mut pool = Aggregator::<i32>::max_pool(1).unwrap();

    // two slices per sub-position; sub-position sums are 3, 9, -4, 6
    let partials = [1, 2, 4, 5, -1, -3, 6, 0];
    let mut pooled = Vec::new();
    let mut sums = Vec::new();
    for (step, &v) in traversal.pass().zip(&partials) {
        let flags = AggregateFlags::new(
            step.fusion.is_some_and(|f| f.is_first()),
            step.fusion_commit(),
        );
        let Some(s) = sum.accept(&[v], flags) else {
            continue;
        };
        sums.push(s[0]);
        let flags = AggregateFlags::new(step.pool_reset(), step.pool_commit());
        if let Some(m) = pool.accept(s, flags) {
            pooled.push(m[0]);
        }
    }
    assert_eq!(sums, vec![3, 9, -4, 6]);
    assert_eq!(pooled, vec![9]);
}

#[test]
fn test_reset_clears_state() {
    let mut agg = Aggregator::<i64>::max_pool(3).unwrap();
    agg.accept(&[5, 6, 7], AggregateFlags::new(true, false));
    agg.reset();
    assert_eq!(agg.state(), &[0, 0, 0]);
    assert_eq!(agg.width(), 3);
}
