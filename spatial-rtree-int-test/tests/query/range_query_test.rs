use rand::rngs::StdRng;
use rand::SeedableRng;
use spatial_rtree::{DataId, Point, RTreeVariant, Region, SpatialError};
use spatial_rtree_int_test::test_util::{
    boxed, brute_force_intersection, cleanup, create_test_context, create_test_context_with,
    random_boxes, run_test, sorted, test_config,
};

#[test]
fn test_containment_is_subset_of_intersection() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::Linear)),
        |ctx| {
            let tree = ctx.tree();
            let mut rng = StdRng::seed_from_u64(3);
            let live: Vec<(DataId, Region)> = random_boxes(&mut rng, 300, 100.0, 6.0)
                .into_iter()
                .enumerate()
                .map(|(i, r)| (i as DataId, r))
                .collect();
            for (id, region) in &live {
                tree.insert_data(None, region, *id)?;
            }

            for query in random_boxes(&mut rng, 20, 100.0, 40.0) {
                let mut intersecting: Vec<DataId> = Vec::new();
                let mut contained: Vec<DataId> = Vec::new();
                tree.intersection_query(&query, &mut intersecting)?;
                tree.containment_query(&query, &mut contained)?;

                let intersecting = sorted(intersecting);
                let contained = sorted(contained);
                assert_eq!(intersecting, brute_force_intersection(&live, &query));
                assert!(contained.iter().all(|id| intersecting.binary_search(id).is_ok()));

                let expected: Vec<DataId> = live
                    .iter()
                    .filter(|(_, r)| query.contains(r))
                    .map(|(id, _)| *id)
                    .collect();
                assert_eq!(contained, sorted(expected));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_point_location() {
    run_test(
        create_test_context,
        |ctx| {
            let tree = ctx.tree();
            tree.insert_data(None, &boxed(0.0, 0.0, 4.0, 4.0), 1)?;
            tree.insert_data(None, &boxed(2.0, 2.0, 6.0, 6.0), 2)?;
            tree.insert_data(None, &boxed(8.0, 8.0, 9.0, 9.0), 3)?;

            let mut hits: Vec<DataId> = Vec::new();
            tree.point_location_query(&Point::new(vec![3.0, 3.0]), &mut hits)?;
            assert_eq!(sorted(hits), vec![1, 2]);

            // Boundaries are closed.
            let mut hits: Vec<DataId> = Vec::new();
            tree.point_location_query(&Point::new(vec![9.0, 8.0]), &mut hits)?;
            assert_eq!(hits, vec![3]);

            let mut hits: Vec<DataId> = Vec::new();
            tree.point_location_query(&Point::new(vec![7.0, 7.0]), &mut hits)?;
            assert!(hits.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_queries_on_empty_tree() {
    run_test(
        create_test_context,
        |ctx| {
            let tree = ctx.tree();
            let mut hits: Vec<DataId> = Vec::new();
            tree.intersection_query(&boxed(0.0, 0.0, 10.0, 10.0), &mut hits)?;
            tree.nearest_neighbor_query(3, &Point::new(vec![1.0, 1.0]), &mut hits)?;
            assert!(hits.is_empty());
            assert!(matches!(tree.bounds(), Err(SpatialError::InvalidState(_))));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_query_dimension_is_checked() {
    run_test(
        create_test_context,
        |ctx| {
            let tree = ctx.tree();
            let query = Region::new(vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0])?;
            let mut hits: Vec<DataId> = Vec::new();
            assert!(matches!(
                tree.intersection_query(&query, &mut hits),
                Err(SpatialError::InvalidArgument(_))
            ));
            assert!(matches!(
                tree.nearest_neighbor_query(1, &query, &mut hits),
                Err(SpatialError::InvalidArgument(_))
            ));
            Ok(())
        },
        cleanup,
    )
}
