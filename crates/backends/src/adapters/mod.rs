//! Provider adapters
//!
//! Each adapter turns one provider's request/response/error shape into
//! `Backend::query`. Nothing provider-specific crosses this boundary.

mod anthropic;
mod chain;
mod echo;
mod google;
mod limited;
mod openai;
mod umuganda;

pub use anthropic::AnthropicBackend;
pub use chain::{ChainBackend, ChainStep};
pub use echo::EchoBackend;
pub use google::GoogleTranslateBackend;
pub use limited::ConcurrencyLimited;
pub use openai::OpenAiBackend;
pub use umuganda::UmugandaBackend;
