mod acceptance_test;
mod workload_test;
