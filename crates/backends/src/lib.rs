//! # Backends
//!
//! Backend Registry and provider adapters.
//!
//! Responsibilities:
//! - Normalize each provider (OpenAI, Anthropic, Groq, Google Translate,
//!   Digital Umuganda, chains, local echo) into `contracts::Backend`
//! - Convert every provider error into a typed `Failure`
//! - Retry transient failures inside the call deadline
//! - Build the registry from configuration, skipping backends that lack credentials
//!
//! ## Usage
//!
//! ```no_run
//! use backends::BackendFactory;
//! use contracts::{BackendConfig, ProviderKind};
//!
//! let configs = vec![BackendConfig::new("echo", ProviderKind::Echo)];
//! let report = BackendFactory::from_env().build(&configs).unwrap();
//! for skipped in &report.skipped {
//!     eprintln!("skipped {}: {}", skipped.name, skipped.reason);
//! }
//! println!("{} backends active", report.registry.len());
//! ```

pub mod adapters;
mod credentials;
mod factory;
mod http;
pub mod mock;
mod registry;
mod retry;
mod task;

#[cfg(test)]
mod test_support;

pub use credentials::{
    credential_status, mask_secret, resolve_api_key, CredentialSource, CredentialStatus,
    EnvCredentials, StaticCredentials,
};
pub use factory::{BackendFactory, BuildReport, SkippedBackend};
pub use http::classify_status;
pub use registry::BackendRegistry;
pub use retry::RetryPolicy;
pub use task::{fluency_score, TaskPrompt};
