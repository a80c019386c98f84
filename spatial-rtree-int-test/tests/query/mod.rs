mod concurrent_test;
mod keyword_report_test;
mod nearest_neighbor_test;
mod range_query_test;
