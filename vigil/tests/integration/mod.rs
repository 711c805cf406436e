#![cfg(feature = "test-utils")]

mod bulk_test;
mod listener_test;
mod store_test;
