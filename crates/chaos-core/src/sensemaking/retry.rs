//! Retry layer
//!
//! One retrieval request is served by up to `max_retries` info seeker
//! calls. Every call is recorded in the execution state. Failures build an
//! error history that goes with the next call, and the sensemaker may
//! rewrite the request between calls.

use crate::error::{Error, Result};
use crate::state::ExecutionState;
use crate::types::{ErrorAttempt, RetrievalOutcome, SeekContext};
use tracing::{debug, info, warn};

use super::core::{SensemakingLoop, COMPONENT};
use super::types::SeekOutcome;

impl SensemakingLoop {
    /// Serve `request` for `step`, retrying failed retrievals
    ///
    /// With `allow_revision` off the request text is never rewritten, which
    /// is how human-written requests are kept verbatim.
    pub async fn seek_with_retries(
        &self,
        query: &str,
        step: u32,
        request: &str,
        base: SeekContext,
        allow_revision: bool,
        state: &mut ExecutionState,
    ) -> Result<SeekOutcome> {
        let budget = self.config.max_retries.max(1);
        let mut context = SeekContext { step, ..base };
        let mut current = request.to_string();
        let mut history: Vec<ErrorAttempt> = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match self.info_seeker.seek(&current, &context).await {
                Ok(outcome) => outcome,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => RetrievalOutcome::failure(current.clone(), e.to_string()),
            };

            state.record_result(
                step,
                outcome.code(),
                outcome.result.clone(),
                outcome.success(),
                outcome.error.clone(),
            );

            if outcome.success() {
                debug!(step, attempt, truncated = outcome.truncated, "Retrieval succeeded");
                return Ok(SeekOutcome {
                    outcome,
                    attempts: attempt,
                    retries_exhausted: false,
                });
            }

            let error = outcome.text().to_string();
            warn!(step, attempt, error = %error, "Retrieval failed");
            self.events.warn(
                COMPONENT,
                format!("Step {} attempt {} failed: {}", step, attempt, error),
            );
            history.push(ErrorAttempt {
                attempt,
                request: current.clone(),
                error,
            });

            if attempt >= budget {
                return Ok(SeekOutcome {
                    outcome,
                    attempts: attempt,
                    retries_exhausted: true,
                });
            }

            context.errors = history.clone();
            if allow_revision {
                match self
                    .sensemaker
                    .guide_recovery(query, request, &history, &self.sources)
                    .await
                {
                    Ok(guidance) => {
                        let revised = guidance.revised_request.trim();
                        if !revised.is_empty() && revised != current {
                            info!(step, attempt, "Retrying with revised request");
                            self.events.info(
                                COMPONENT,
                                format!("Recovery for step {}: {}", step, guidance.summary),
                            );
                            current = revised.to_string();
                        }
                    }
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => warn!(step, error = %e, "Recovery guidance unavailable"),
                }
            }
        }
    }
}
