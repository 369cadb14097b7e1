//! Batch orchestration module.

mod driver;
mod stats;

pub use driver::BatchDriver;
pub use stats::BatchStats;
