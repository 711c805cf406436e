pub mod error;
pub mod listeners;
pub mod macros;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
