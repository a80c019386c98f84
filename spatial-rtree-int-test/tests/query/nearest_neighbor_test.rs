use rand::rngs::StdRng;
use rand::SeedableRng;
use spatial_rtree::{
    Data, DataId, Point, RTreeVariant, Region, Shape, SpatialEntry,
};
use spatial_rtree_int_test::test_util::{
    cleanup, create_test_context_with, random_boxes, run_test, test_config, unit_box,
};

#[test]
fn test_results_ordered_by_distance() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::RStar)),
        |ctx| {
            let tree = ctx.tree();
            let mut rng = StdRng::seed_from_u64(21);
            let live: Vec<(DataId, Region)> = random_boxes(&mut rng, 250, 100.0, 3.0)
                .into_iter()
                .enumerate()
                .map(|(i, r)| (i as DataId, r))
                .collect();
            for (id, region) in &live {
                tree.insert_data(None, region, *id)?;
            }

            let query = Point::new(vec![50.0, 50.0]);
            let mut found: Vec<Data> = Vec::new();
            tree.nearest_neighbor_query(10, &query, &mut found)?;
            assert!(found.len() >= 10);

            let distances: Vec<f64> = found
                .iter()
                .map(|d| query.minimum_distance(d.region()))
                .collect();
            assert!(distances.windows(2).all(|w| w[0] <= w[1]));

            let mut all: Vec<f64> = live
                .iter()
                .map(|(_, r)| query.minimum_distance(r))
                .collect();
            all.sort_by(f64::total_cmp);
            assert_eq!(distances[..10], all[..10]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_ties_with_kth_distance_are_reported() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::Quadratic)),
        |ctx| {
            let tree = ctx.tree();
            // Four boxes one unit away from the origin point, one farther.
            tree.insert_data(None, &unit_box(1.0, -0.5), 1)?;
            tree.insert_data(None, &unit_box(-2.0, -0.5), 2)?;
            tree.insert_data(None, &unit_box(-0.5, 1.0), 3)?;
            tree.insert_data(None, &unit_box(-0.5, -2.0), 4)?;
            tree.insert_data(None, &unit_box(5.0, 5.0), 5)?;

            let query = Point::new(vec![0.0, 0.0]);
            let mut found: Vec<DataId> = Vec::new();
            tree.nearest_neighbor_query(2, &query, &mut found)?;
            found.sort();
            assert_eq!(found, vec![1, 2, 3, 4]);

            let mut none: Vec<DataId> = Vec::new();
            tree.nearest_neighbor_query(0, &query, &mut none)?;
            assert!(none.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_custom_comparator() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::Linear)),
        |ctx| {
            let tree = ctx.tree();
            for i in 0..30 {
                tree.insert_data(None, &unit_box(i as f64 * 3.0, 0.0), i)?;
            }

            // Rank by distance along the x axis only, from the far end.
            let from_right = |query: &dyn Shape, entry: &dyn SpatialEntry| {
                let x = query.center().coord(0).unwrap_or_default();
                let region = entry.region();
                if x > region.high()[0] {
                    x - region.high()[0]
                } else if x < region.low()[0] {
                    region.low()[0] - x
                } else {
                    0.0
                }
            };

            let mut found: Vec<DataId> = Vec::new();
            let query = Point::new(vec![200.0, 1000.0]);
            tree.nearest_neighbor_query_with(3, &query, &mut found, &from_right)?;
            assert_eq!(found, vec![29, 28, 27]);
            Ok(())
        },
        cleanup,
    )
}
