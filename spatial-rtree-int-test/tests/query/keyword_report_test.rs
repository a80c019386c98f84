use spatial_rtree::{RTreeVariant, Region};
use spatial_rtree_int_test::test_util::{
    boxed, cleanup, create_test_context_with, run_test, test_config,
};

#[test]
fn test_keyword_frequencies_in_region() {
    run_test(
        || create_test_context_with(test_config(RTreeVariant::RStar)),
        |ctx| {
            let tree = ctx.tree();
            let names = ["harbor", "market", "station", "harbor", "school"];
            let mut id = 0;
            for x in 0..10 {
                for y in 0..10 {
                    let low = names[(x + y) % names.len()];
                    let high = names[(x * y) % names.len()];
                    let payload = format!("{},{}", low, high);
                    let (x, y) = (x as f64 * 10.0, y as f64 * 10.0);
                    tree.insert_data(Some(payload.as_bytes()), &boxed(x, y, x + 5.0, y + 5.0), id)?;
                    id += 1;
                }
            }

            // Every corner lies inside the full extent.
            let report = tree.keyword_report(&boxed(0.0, 0.0, 100.0, 100.0))?;
            let total: usize = report.counts.values().sum();
            assert_eq!(total, 200);
            assert_eq!(report.ranked[0].0, "harbor");
            assert!(report.ranked.windows(2).all(|w| w[0].1 >= w[1].1));

            // Only the low corners of the first column fall in a thin strip.
            let strip = Region::new(vec![-1.0, -1.0], vec![1.0, 100.0])?;
            let report = tree.keyword_report(&strip)?;
            let total: usize = report.counts.values().sum();
            assert_eq!(total, 10);
            assert_eq!(report.top(2).len(), 2);
            Ok(())
        },
        cleanup,
    )
}
