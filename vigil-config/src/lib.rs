pub mod environment;
mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config};
