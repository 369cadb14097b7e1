//! # Ingestion
//!
//! Loads the input set of an evaluation batch.
//!
//! Responsibilities:
//! - Read delimited tables (CSV/TSV/...) or JSON Lines into [`Item`]s
//! - Assign positional ids when no id column is configured
//! - Tag each item with a topic via keyword rules when no topic column is present
//!
//! ## Usage
//!
//! ```no_run
//! use contracts::InputConfig;
//! use ingestion::{ItemLoader, TopicDetector};
//!
//! let loader = ItemLoader::new(InputConfig::new("questions.csv"), TopicDetector::default());
//! let items = loader.load().unwrap();
//! println!("{} items", items.len());
//! ```

mod error;
mod loader;
mod topic;

pub use contracts::Item;
pub use error::{IngestionError, Result};
pub use loader::ItemLoader;
pub use topic::{TopicDetector, DEFAULT_TOPIC};
