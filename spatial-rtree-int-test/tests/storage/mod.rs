mod page_store_test;
mod reopen_test;
