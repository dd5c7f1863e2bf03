//! LLM Provider implementations for Librarian.
//!
//! All backends implement the `librarian_core::Provider` trait.
//! The router implements `ModelGateway` on top of them.

pub mod catalogue;
pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{BoundModel, ProviderRouter, build_from_config};
