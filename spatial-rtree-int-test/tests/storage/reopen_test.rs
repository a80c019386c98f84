use rand::rngs::StdRng;
use rand::SeedableRng;
use spatial_rtree::{
    DataId, DiskStorageConfig, DiskStorageManager, RTree, RTreeVariant, Region, ReopenOptions,
    SpatialError, StorageManager,
};
use spatial_rtree_int_test::test_util::{
    brute_force_intersection, cleanup, create_test_context, random_boxes, random_path, run_test,
    sorted, test_config,
};
use std::fs;
use std::sync::Arc;

fn open_disk(path: &str, overwrite: bool) -> Arc<dyn StorageManager> {
    let config = DiskStorageConfig::new(path)
        .with_page_size(256)
        .with_overwrite(overwrite);
    Arc::new(DiskStorageManager::open(&config).unwrap())
}

#[test]
fn test_tree_survives_process_restart() {
    let path = random_path();
    let mut rng = StdRng::seed_from_u64(99);
    let regions = random_boxes(&mut rng, 400, 50.0, 2.0);
    let live: Vec<(DataId, Region)> = regions
        .into_iter()
        .enumerate()
        .map(|(i, region)| (i as DataId, region))
        .collect();

    let (header_id, height) = {
        let storage = open_disk(&path, true);
        let tree = RTree::create(storage, test_config(RTreeVariant::RStar)).unwrap();
        for (id, region) in &live {
            let payload = format!("entry-{}", id);
            tree.insert_data(Some(payload.as_bytes()), region, *id).unwrap();
        }
        tree.flush().unwrap();
        (tree.header_id(), tree.statistics().tree_height)
    };

    {
        let storage = open_disk(&path, false);
        let tree = RTree::open(storage, header_id, ReopenOptions::default()).unwrap();
        let stats = tree.statistics();
        assert_eq!(stats.data_count, 400);
        assert_eq!(stats.tree_height, height);
        assert_eq!(tree.properties().variant, RTreeVariant::RStar);
        assert!(tree.is_index_valid().unwrap());

        let query = Region::new(vec![10.0, 10.0], vec![30.0, 30.0]).unwrap();
        let mut hits: Vec<spatial_rtree::Data> = Vec::new();
        tree.intersection_query(&query, &mut hits).unwrap();
        for data in &hits {
            let expected = format!("entry-{}", data.identifier());
            assert_eq!(data.payload(), Some(expected.as_bytes()));
        }
        let ids: Vec<DataId> = hits.iter().map(|d| d.identifier()).collect();
        assert_eq!(sorted(ids), brute_force_intersection(&live, &query));
    }

    let _ = fs::remove_file(format!("{}.idx", path));
    let _ = fs::remove_file(format!("{}.dat", path));
}

#[test]
fn test_reopen_with_overrides() {
    run_test(
        create_test_context,
        |ctx| {
            let tree = ctx.tree();
            for i in 0..30 {
                let region = Region::new(vec![i as f64, 0.0], vec![i as f64 + 0.5, 1.0])?;
                tree.insert_data(None, &region, i)?;
            }

            let options = ReopenOptions::default()
                .with_variant(RTreeVariant::Quadratic)
                .with_reinsert_factor(0.5);
            let reopened = ctx.reopen(options)?;
            assert_eq!(reopened.properties().variant, RTreeVariant::Quadratic);
            assert_eq!(reopened.properties().reinsert_factor, 0.5);
            assert_eq!(reopened.properties().leaf_capacity, 8);
            assert_eq!(reopened.statistics().data_count, 30);

            let bad = ReopenOptions::default().with_reinsert_factor(1.5);
            assert!(matches!(
                ctx.reopen(bad),
                Err(SpatialError::InvalidArgument(_))
            ));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_open_unknown_header_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let result = RTree::open(ctx.storage(), 10_000, ReopenOptions::default());
            assert!(matches!(result, Err(SpatialError::InvalidPage(10_000))));
            Ok(())
        },
        cleanup,
    )
}
