use spatial_rtree::{DataId, RTreeVariant};
use spatial_rtree_int_test::test_util::{
    boxed, cleanup, create_test_context_with, run_test, test_config, unit_box,
};
use std::thread;

#[test]
fn test_readers_alongside_writer() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::RStar)),
        |ctx| {
            let tree = ctx.tree();
            for i in 0..100 {
                tree.insert_data(None, &unit_box((i % 10) as f64 * 2.0, (i / 10) as f64 * 2.0), i)?;
            }

            let writer = {
                let tree = tree.clone();
                thread::spawn(move || {
                    for i in 100..300 {
                        let x = 100.0 + (i % 20) as f64 * 2.0;
                        let y = (i / 20) as f64 * 2.0;
                        tree.insert_data(None, &unit_box(x, y), i).unwrap();
                    }
                })
            };

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let tree = tree.clone();
                    thread::spawn(move || {
                        for _ in 0..50 {
                            // The first hundred boxes never move.
                            let mut hits: Vec<DataId> = Vec::new();
                            tree.intersection_query(&boxed(-1.0, -1.0, 20.0, 20.0), &mut hits)
                                .unwrap();
                            assert_eq!(hits.len(), 100);
                        }
                    })
                })
                .collect();

            writer.join().expect("writer panicked");
            for reader in readers {
                reader.join().expect("reader panicked");
            }

            assert_eq!(tree.statistics().data_count, 300);
            assert!(tree.is_index_valid()?);
            Ok(())
        },
        cleanup,
    )
}
