use std::time::Duration;

use super::client::{LanguageModel, ModelError};
use super::prompt::PromptTemplate;
use super::response::{parse_response, ParseMode};
use crate::util::truncate_to_width;

/// Prompt sent to each candidate by [`Enricher::probe`].
const PROBE_PROMPT: &str = "Reply with OK.";

/// Retry, pacing and fallback knobs for the enrichment engine.
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    /// Candidate models, preferred first.
    pub models: Vec<String>,
    /// Rate-limited attempts allowed per item before falling back.
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
    /// Pause after every `enrich` call.
    pub cooldown: Duration,
    pub fallback_summary_width: usize,
    pub lenient_parse: bool,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            models: vec!["llama3".to_string()],
            max_attempts: 3,
            rate_limit_backoff: Duration::from_secs(30),
            cooldown: Duration::from_secs(1),
            fallback_summary_width: 200,
            lenient_parse: false,
        }
    }
}

/// How an [`Enrichment`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched,
    /// The model answered with nothing usable.
    Malformed,
    /// Still rate limited after `max_attempts`.
    RateLimited,
    /// No candidate model is available on the server.
    NoModel,
    /// Any other model or transport failure.
    Failed,
}

impl EnrichOutcome {
    pub fn is_fallback(self) -> bool {
        self != EnrichOutcome::Enriched
    }
}

/// Translated title and summary for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub title: String,
    pub summary: String,
    pub outcome: EnrichOutcome,
}

/// Drives one model through the per-item retry and fallback rules.
///
/// The active model index only moves forward: once a model is reported
/// missing, later items go straight to its successor.
pub struct Enricher<M> {
    model: M,
    prompt: PromptTemplate,
    settings: EnrichSettings,
    active: usize,
}

impl<M: LanguageModel> Enricher<M> {
    pub fn new(model: M, prompt: PromptTemplate, settings: EnrichSettings) -> Self {
        Self {
            model,
            prompt,
            settings,
            active: 0,
        }
    }

    /// Name of the model the next call will use.
    pub fn active_model(&self) -> Option<&str> {
        self.settings.models.get(self.active).map(String::as_str)
    }

    /// Pick the first candidate that answers, or is merely rate limited.
    ///
    /// When none responds the first candidate stays active. Returns the
    /// chosen model name.
    pub async fn probe(&mut self) -> Option<&str> {
        for (index, name) in self.settings.models.iter().enumerate() {
            match self.model.generate(name, PROBE_PROMPT).await {
                Ok(_) | Err(ModelError::RateLimited) => {
                    tracing::info!(model = %name, "Model probe succeeded");
                    self.active = index;
                    return self.active_model();
                }
                Err(e) => {
                    tracing::warn!(model = %name, error = %e, "Model probe failed");
                }
            }
        }

        tracing::warn!("No model answered the probe, keeping the first candidate");
        self.active = 0;
        self.active_model()
    }

    /// Translate and summarize one entry. Never fails: every error path ends
    /// in the fallback of the original title plus a truncated snippet.
    pub async fn enrich(&mut self, title: &str, snippet: &str) -> Enrichment {
        let enrichment = self.attempt(title, snippet).await;
        if !self.settings.cooldown.is_zero() {
            tokio::time::sleep(self.settings.cooldown).await;
        }
        enrichment
    }

    async fn attempt(&mut self, title: &str, snippet: &str) -> Enrichment {
        let prompt = self.prompt.render(title, snippet);
        let mode = if self.settings.lenient_parse {
            ParseMode::Lenient
        } else {
            ParseMode::Strict
        };
        let max_attempts = self.settings.max_attempts.max(1);
        let mut rate_limited = 0u32;
        let mut demoted = false;

        loop {
            let Some(model) = self.settings.models.get(self.active).cloned() else {
                return self.fallback(title, snippet, EnrichOutcome::NoModel);
            };

            match self.model.generate(&model, &prompt).await {
                Ok(text) => {
                    return match parse_response(&text, title, mode) {
                        Some((new_title, summary)) => Enrichment {
                            title: new_title,
                            summary,
                            outcome: EnrichOutcome::Enriched,
                        },
                        None => {
                            tracing::warn!(model = %model, "Empty model response");
                            self.fallback(title, snippet, EnrichOutcome::Malformed)
                        }
                    };
                }
                Err(ModelError::RateLimited) => {
                    rate_limited += 1;
                    if rate_limited >= max_attempts {
                        tracing::warn!(model = %model, attempts = rate_limited, "Rate limit persisted");
                        return self.fallback(title, snippet, EnrichOutcome::RateLimited);
                    }
                    tracing::info!(
                        model = %model,
                        attempt = rate_limited,
                        delay_ms = self.settings.rate_limit_backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(self.settings.rate_limit_backoff).await;
                }
                Err(ModelError::ModelNotFound(name)) => {
                    if demoted || self.active + 1 >= self.settings.models.len() {
                        tracing::warn!(model = %name, "Model not found and no fallback left");
                        return self.fallback(title, snippet, EnrichOutcome::NoModel);
                    }
                    self.active += 1;
                    demoted = true;
                    tracing::warn!(
                        missing = %name,
                        next = self.active_model().unwrap_or_default(),
                        "Model not found, switching to fallback model"
                    );
                }
                Err(e @ ModelError::Other(_)) => {
                    tracing::warn!(model = %model, error = %e, "Enrichment failed");
                    return self.fallback(title, snippet, EnrichOutcome::Failed);
                }
            }
        }
    }

    fn fallback(&self, title: &str, snippet: &str, outcome: EnrichOutcome) -> Enrichment {
        Enrichment {
            title: title.to_string(),
            summary: truncate_to_width(snippet, self.settings.fallback_summary_width).into_owned(),
            outcome,
        }
    }
}
