//! LLM enrichment: a translated title and short summary per entry.
//!
//! - [`client`] - the [`LanguageModel`] seam and its Ollama implementation
//! - [`prompt`] - prompt template loading and rendering
//! - [`response`] - splitting the model reply into title and summary
//! - [`engine`] - retry, model fallback and degraded-output rules

mod client;
mod engine;
mod prompt;
mod response;

pub use client::{LanguageModel, ModelError, OllamaClient, API_KEY_ENV};
pub use engine::{EnrichOutcome, EnrichSettings, Enricher, Enrichment};
pub use prompt::{PromptTemplate, DEFAULT_TEMPLATE};
pub use response::{parse_response, ParseMode, DELIMITER};
