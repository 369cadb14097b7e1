//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Result Model
//! - One `Outcome` per (item, backend) pair, never partially populated
//! - Row order follows input order, column order follows backend registration order

mod backend;
mod backend_name;
mod blueprint;
mod error;
mod item;
mod outcome;
mod prompt;
mod sink;
mod table;

pub use backend::{Backend, Deadline, RegisteredBackend};
pub use backend_name::BackendName;
pub use blueprint::*;
pub use error::*;
pub use item::Item;
pub use outcome::{Failure, FailureKind, Outcome};
pub use prompt::{language_name, PromptTemplate, TemplateError};
pub use sink::*;
pub use table::{Resolution, ResultRow, ResultTable, ITEM_COLUMNS};

/// Re-exported so adapters implement [`Backend`] with the same macro version.
pub use async_trait::async_trait;
