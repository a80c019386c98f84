use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_rtree::{DataId, RTreeVariant, Region};
use spatial_rtree_int_test::test_util::{
    brute_force_intersection, cleanup, create_memory_context_with, create_test_context_with,
    random_boxes, run_test, sorted, test_config, TestContext,
};

fn mixed_workload(ctx: TestContext, seed: u64) -> spatial_rtree::SpatialResult<()> {
    let tree = ctx.tree();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut live: Vec<(DataId, Region)> = Vec::new();
    let mut next_id: DataId = 0;

    for round in 0..6 {
        for region in random_boxes(&mut rng, 120, 100.0, 4.0) {
            tree.insert_data(None, &region, next_id)?;
            live.push((next_id, region));
            next_id += 1;
        }

        for _ in 0..50 {
            let victim = rng.random_range(0..live.len());
            let (id, region) = live.swap_remove(victim);
            assert!(tree.delete_data(&region, id)?, "entry {} not found", id);
        }

        let report = tree.check_integrity()?;
        assert!(report.is_valid, "round {}: {:?}", round, report.errors);
        assert_eq!(tree.statistics().data_count, live.len() as u64);

        for _ in 0..10 {
            let query = random_boxes(&mut rng, 1, 100.0, 30.0).remove(0);
            let mut hits: Vec<DataId> = Vec::new();
            tree.intersection_query(&query, &mut hits)?;
            assert_eq!(sorted(hits), brute_force_intersection(&live, &query));
        }
    }

    // Drain everything; the tree ends as a single empty leaf.
    while let Some((id, region)) = live.pop() {
        assert!(tree.delete_data(&region, id)?);
    }
    let stats = tree.statistics();
    assert_eq!(stats.data_count, 0);
    assert_eq!(stats.tree_height, 1);
    assert_eq!(stats.node_count, 1);
    assert!(tree.is_index_valid()?);
    Ok(())
}

#[test]
fn test_rstar_mixed_workload() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::RStar)),
        |ctx| mixed_workload(ctx, 7),
        cleanup,
    )
}

#[test]
fn test_rstar_mixed_workload_in_memory() {
    run_test(
        || create_memory_context_with(test_config(RTreeVariant::RStar)),
        |ctx| mixed_workload(ctx, 17),
        cleanup,
    )
}

#[test]
fn test_quadratic_mixed_workload() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::Quadratic)),
        |ctx| mixed_workload(ctx, 11),
        cleanup,
    )
}

#[test]
fn test_linear_mixed_workload() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::Linear)),
        |ctx| mixed_workload(ctx, 13),
        cleanup,
    )
}

#[test]
fn test_duplicate_boxes_delete_by_identifier() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::RStar)),
        |ctx| {
            let tree = ctx.tree();
            let region = Region::new(vec![1.0, 1.0], vec![2.0, 2.0])?;
            for id in 0..40 {
                tree.insert_data(None, &region, id)?;
            }
            assert!(tree.statistics().tree_height > 1);

            for id in (0..40).step_by(2) {
                assert!(tree.delete_data(&region, id)?);
            }
            assert!(!tree.delete_data(&region, 0)?);

            let mut hits: Vec<DataId> = Vec::new();
            tree.intersection_query(&region, &mut hits)?;
            assert_eq!(sorted(hits), (1..40).step_by(2).collect::<Vec<_>>());
            assert!(tree.is_index_valid()?);
            Ok(())
        },
        cleanup,
    )
}
