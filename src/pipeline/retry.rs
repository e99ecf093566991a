//! Retry/fallback controller around a single page extraction.
//!
//! The controller is a small explicit state machine:
//!
//! ```text
//!            ┌──────── RateLimited, attempt < max ───────┐
//!            ▼                                           │
//!   Attempting(model, attempt) ──────────────────────────┘
//!     │  Success            │ ModelError, or RateLimited at max
//!     ▼                     ▼
//!   Succeeded          ExhaustedModel(model) ── next model ──▶ Attempting(model + 1, 1)
//!                           │ no models left
//!                           ▼
//!                      ExhaustedAll
//! ```
//!
//! Rate limits are retried on the same model with exponential backoff;
//! anything else moves straight to the next candidate model, since a model
//! that returned garbage once will usually do so again. `ExhaustedAll` is
//! not fatal: the caller emits an image-only slide and moves on.

use crate::config::ConversionConfig;
use crate::error::{ExtractError, Pdf2PptxError};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::extract::{extract_page, PageExtraction};
use crate::pipeline::llm::VisionBackend;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Attempt limits and backoff timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Calls per model before moving to the next one. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 2000 ms.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay. Default: 60 000 ms.
    pub max_delay_ms: u64,
    /// Jitter as a fraction of the exponential delay, in `[0, 1]`. Default: 0.25.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
            jitter_ratio: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), Pdf2PptxError> {
        if self.max_attempts == 0 {
            return Err(Pdf2PptxError::InvalidConfig(
                "max attempts must be ≥ 1".into(),
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "retry base delay ({} ms) exceeds the cap ({} ms)",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "jitter ratio must be within 0–1, got {}",
                self.jitter_ratio
            )));
        }
        Ok(())
    }

    /// `base × 2^(attempt−1)` in milliseconds, saturating. `attempt` is 1-based.
    pub fn exponential_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(63);
        self.base_delay_ms.saturating_mul(1u64 << shift)
    }

    /// Delay before retrying after failed attempt `attempt` (1-based).
    ///
    /// `unit` is a jitter sample in `[0, 1)`; the result is
    /// `min(cap, exp + exp × jitter_ratio × unit)`.
    pub fn delay(&self, attempt: u32, unit: f64) -> Duration {
        let exp = self.exponential_ms(attempt);
        let jitter = (exp as f64 * self.jitter_ratio * unit.clamp(0.0, 1.0)) as u64;
        Duration::from_millis(exp.saturating_add(jitter).min(self.max_delay_ms))
    }

    /// Like [`Self::delay`] but honours a server-provided `Retry-After`,
    /// still bounded by the cap.
    pub fn delay_with_hint(&self, attempt: u32, unit: f64, retry_after_secs: Option<u64>) -> Duration {
        let computed = self.delay(attempt, unit);
        match retry_after_secs {
            Some(secs) => {
                let hinted = Duration::from_secs(secs).min(Duration::from_millis(self.max_delay_ms));
                computed.max(hinted)
            }
            None => computed,
        }
    }
}

/// A jitter sample in `[0, 1)`.
fn jitter_unit() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u32(nanos);
    (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64
}

/// Classified result of one model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    ModelError,
}

impl AttemptOutcome {
    pub fn classify(err: &ExtractError) -> AttemptOutcome {
        match err {
            ExtractError::RateLimited { .. } => AttemptOutcome::RateLimited,
            _ => AttemptOutcome::ModelError,
        }
    }
}

/// Controller state. `model` indexes the candidate list; `attempt` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempting { model: usize, attempt: u32 },
    Succeeded,
    ExhaustedModel { model: usize },
    ExhaustedAll,
}

impl AttemptState {
    pub fn start(model_count: usize) -> AttemptState {
        if model_count == 0 {
            AttemptState::ExhaustedAll
        } else {
            AttemptState::Attempting {
                model: 0,
                attempt: 1,
            }
        }
    }

    /// Transition after a call made in the `Attempting` state.
    /// Other states ignore outcomes.
    pub fn on_outcome(self, outcome: AttemptOutcome, max_attempts: u32) -> AttemptState {
        match self {
            AttemptState::Attempting { model, attempt } => match outcome {
                AttemptOutcome::Success => AttemptState::Succeeded,
                AttemptOutcome::RateLimited if attempt < max_attempts => {
                    AttemptState::Attempting {
                        model,
                        attempt: attempt + 1,
                    }
                }
                AttemptOutcome::RateLimited | AttemptOutcome::ModelError => {
                    AttemptState::ExhaustedModel { model }
                }
            },
            other => other,
        }
    }

    /// Leave `ExhaustedModel` for the next candidate, or give up.
    pub fn next_model(self, model_count: usize) -> AttemptState {
        match self {
            AttemptState::ExhaustedModel { model } if model + 1 < model_count => {
                AttemptState::Attempting {
                    model: model + 1,
                    attempt: 1,
                }
            }
            AttemptState::ExhaustedModel { .. } => AttemptState::ExhaustedAll,
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::ExhaustedAll)
    }
}

/// A successful extraction plus how much effort it took.
#[derive(Debug, Clone)]
pub struct ControlledExtraction {
    pub page: PageExtraction,
    /// Calls made across all models, including the successful one.
    pub attempts: u32,
}

/// Run the extraction for one page through the candidate models.
///
/// Returns `ExtractError::Exhausted` when every model failed, and passes
/// `ExtractError::Unauthorized` through untouched so the caller can abort.
pub async fn extract_with_fallback<B: VisionBackend>(
    backend: &B,
    image: &EncodedImage,
    page_num: usize,
    config: &ConversionConfig,
) -> Result<ControlledExtraction, ExtractError> {
    let models = &config.models;
    let policy = config.retry;
    let mut state = AttemptState::start(models.len());
    let mut calls = 0u32;
    let mut last_error = String::from("no candidate models configured");
    let mut success: Option<PageExtraction> = None;

    while !state.is_terminal() {
        state = match state {
            AttemptState::Attempting { model, attempt } => {
                let model_id = &models[model];
                calls += 1;
                debug!(
                    "Page {}: calling {} (attempt {}/{})",
                    page_num, model_id, attempt, policy.max_attempts
                );

                match extract_page(backend, model_id, image, config).await {
                    Ok(page) => {
                        success = Some(page);
                        state.on_outcome(AttemptOutcome::Success, policy.max_attempts)
                    }
                    Err(e @ ExtractError::Unauthorized { .. }) => return Err(e),
                    Err(e) => {
                        let outcome = AttemptOutcome::classify(&e);
                        let next = state.on_outcome(outcome, policy.max_attempts);
                        if let AttemptState::Attempting { .. } = next {
                            let retry_after = match &e {
                                ExtractError::RateLimited {
                                    retry_after_secs, ..
                                } => *retry_after_secs,
                                _ => None,
                            };
                            let delay = policy.delay_with_hint(attempt, jitter_unit(), retry_after);
                            warn!(
                                "Page {}: {} rate limited, waiting {}ms (attempt {}/{})",
                                page_num,
                                model_id,
                                delay.as_millis(),
                                attempt,
                                policy.max_attempts
                            );
                            sleep(delay).await;
                        } else {
                            warn!("Page {}: {} gave up — {}", page_num, model_id, e);
                        }
                        last_error = e.to_string();
                        next
                    }
                }
            }
            AttemptState::ExhaustedModel { model } => {
                let next = state.next_model(models.len());
                if let AttemptState::Attempting { model: m, .. } = next {
                    info!(
                        "Page {}: falling back from {} to {}",
                        page_num, models[model], models[m]
                    );
                }
                next
            }
            terminal => terminal,
        };
    }

    match (state, success) {
        (AttemptState::Succeeded, Some(page)) => Ok(ControlledExtraction {
            page,
            attempts: calls,
        }),
        _ => Err(ExtractError::Exhausted {
            attempts: calls,
            last_error,
        }),
    }
}
