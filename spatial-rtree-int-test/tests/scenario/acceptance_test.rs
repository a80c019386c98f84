use spatial_rtree::{Data, DataId, Node, RTreeConfig, RTreeVariant, Region, Visitor};
use spatial_rtree_int_test::test_util::{
    boxed, cleanup, create_test_context_with, run_test, sorted, test_config, unit_box,
};

#[test]
fn test_single_split_grows_tree() {
    run_test(
        || {
            create_test_context_with(
                RTreeConfig::default()
                    .with_variant(RTreeVariant::RStar)
                    .with_dimension(2)
                    .with_leaf_capacity(5)
                    .with_fill_factor(1.0),
            )
        },
        |ctx| {
            let tree = ctx.tree();
            for i in 0..6 {
                tree.insert_data(None, &unit_box(i as f64 * 3.0, 0.0), i)?;
            }

            let stats = tree.statistics();
            assert_eq!(stats.splits, 1);
            assert_eq!(stats.tree_height, 2);
            assert_eq!(stats.nodes_in_level, vec![2, 1]);
            assert_eq!(stats.data_count, 6);

            let mut root_children = 0;
            tree.query_strategy(&mut |node: &Node| {
                root_children = node.children_count();
                None
            })?;
            assert_eq!(root_children, 2);

            assert!(tree.is_index_valid()?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_shrinks_root_box() {
    run_test(
        || create_test_context_with(RTreeConfig::default()),
        |ctx| {
            let tree = ctx.tree();
            tree.insert_data(None, &boxed(0.0, 0.0, 1.0, 1.0), 1)?;
            tree.insert_data(None, &boxed(5.0, 5.0, 6.0, 6.0), 2)?;
            tree.insert_data(None, &boxed(10.0, 10.0, 11.0, 11.0), 3)?;
            assert_eq!(tree.bounds()?, boxed(0.0, 0.0, 11.0, 11.0));

            assert!(tree.delete_data(&boxed(5.0, 5.0, 6.0, 6.0), 2)?);
            assert_eq!(tree.statistics().data_count, 2);
            assert_eq!(tree.bounds()?, boxed(0.0, 0.0, 11.0, 11.0));

            let mut hits: Vec<DataId> = Vec::new();
            tree.intersection_query(&boxed(0.0, 0.0, 11.0, 11.0), &mut hits)?;
            assert_eq!(sorted(hits), vec![1, 3]);

            // Dropping an outer box pulls the root box in.
            assert!(tree.delete_data(&boxed(10.0, 10.0, 11.0, 11.0), 3)?);
            assert_eq!(tree.bounds()?, boxed(0.0, 0.0, 1.0, 1.0));
            assert!(tree.is_index_valid()?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_visitor_sees_loaded_nodes() {
    struct Counting {
        nodes: usize,
        data: Vec<DataId>,
    }

    impl Visitor for Counting {
        fn visit_node(&mut self, _node: &Node) {
            self.nodes += 1;
        }

        fn visit_data(&mut self, data: &Data) {
            self.data.push(data.identifier());
        }
    }

    run_test(
        || create_test_context_with(test_config(RTreeVariant::Quadratic)),
        |ctx| {
            let tree = ctx.tree();
            for i in 0..50 {
                tree.insert_data(None, &unit_box((i % 10) as f64 * 2.0, (i / 10) as f64 * 2.0), i)?;
            }

            let mut visitor = Counting {
                nodes: 0,
                data: Vec::new(),
            };
            let query = Region::new(vec![-1.0, -1.0], vec![100.0, 100.0])?;
            tree.intersection_query(&query, &mut visitor)?;

            assert_eq!(visitor.data.len(), 50);
            assert_eq!(visitor.nodes as u64, tree.statistics().node_count);
            Ok(())
        },
        cleanup,
    )
}
