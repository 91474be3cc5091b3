//! Dispatcher: walks a ranked candidate list until one attempt succeeds.
//!
//! States: `Selecting -> Attempting(i) -> Success | Attempting(i + 1) | Exhausted`.
//! Attempts run sequentially unless hedging races the top two candidates.

use crate::error::AttemptFailure;
use crate::policy::{Candidate, RoutingDecision};
use crate::registry::ProviderPool;
use crate::request::RoutingRequest;
use crate::{Result, RoutingError};
use std::mem;
use std::result::Result as StdResult;
use std::sync::Arc;
use switchyard_core::{Completion, ErrorClass, ProviderError};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSuccess {
    pub completion: Completion,
    pub provider_id: String,
    pub model_id: String,
    /// Index of the answering candidate in the ranked list
    pub fallback_depth: usize,
    /// Failed attempts before the answer, in completion order
    pub failures: Vec<AttemptFailure>,
    /// Provider calls started, including a cancelled hedge loser
    pub calls_made: usize,
}

#[derive(Debug)]
enum DispatchState {
    Selecting,
    Hedging,
    Attempting(usize),
    Success(Box<DispatchSuccess>),
    Exhausted,
}

/// Result of one attempt on one candidate.
type AttemptResult = StdResult<Completion, AttemptFailure>;

/// Executes routing decisions against the provider pool.
pub struct Dispatcher {
    pool: Arc<ProviderPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<ProviderPool>) -> Self {
        Self { pool }
    }

    /// Run the fallback walk for `decision`.
    ///
    /// # Errors
    /// - `InvalidRequest` as soon as any provider rejects the request
    /// - `AllProvidersFailed` with every attempt's class once candidates run out
    /// - `Cancelled` when `cancel` fires; the in-flight attempt is dropped
    pub async fn dispatch(
        &self,
        request: &RoutingRequest,
        decision: &RoutingDecision,
        hedge: bool,
        cancel: &CancellationToken,
    ) -> Result<DispatchSuccess> {
        let candidates = &decision.candidates;
        let mut failures = Vec::new();
        let mut calls_made = 0_usize;
        let mut state = DispatchState::Selecting;

        loop {
            state = match state {
                DispatchState::Selecting => {
                    if candidates.is_empty() {
                        DispatchState::Exhausted
                    } else if hedge && candidates.len() >= 2 {
                        DispatchState::Hedging
                    } else {
                        DispatchState::Attempting(0)
                    }
                }
                DispatchState::Hedging => {
                    calls_made += 2;
                    let outcome = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(RoutingError::Cancelled),
                        outcome = self.hedge(request, &candidates[0], &candidates[1]) => outcome,
                    };
                    match outcome {
                        HedgeOutcome::Won { index, completion, failures: lost } => {
                            failures.extend(lost);
                            DispatchState::Success(Box::new(self.success(
                                &candidates[index],
                                index,
                                completion,
                                &mut failures,
                                calls_made,
                            )))
                        }
                        HedgeOutcome::Lost(lost) => {
                            let fatal = lost
                                .iter()
                                .find(|failure| !failure.class.is_fallback_eligible())
                                .map(|failure| failure.message.clone());
                            failures.extend(lost);
                            if let Some(message) = fatal {
                                return Err(RoutingError::InvalidRequest {
                                    message,
                                    attempts: failures,
                                });
                            }
                            DispatchState::Attempting(2)
                        }
                    }
                }
                DispatchState::Attempting(index) if index >= candidates.len() => {
                    DispatchState::Exhausted
                }
                DispatchState::Attempting(index) => {
                    let candidate = &candidates[index];
                    calls_made += 1;
                    let result = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            info!(
                                correlation_id = %request.correlation_id,
                                provider = %candidate.provider_id,
                                "Request cancelled mid-attempt"
                            );
                            return Err(RoutingError::Cancelled);
                        }
                        result = self.attempt(request, candidate) => result,
                    };
                    match result {
                        Ok(completion) => DispatchState::Success(Box::new(self.success(
                            candidate,
                            index,
                            completion,
                            &mut failures,
                            calls_made,
                        ))),
                        Err(failure) if !failure.class.is_fallback_eligible() => {
                            let message = failure.message.clone();
                            failures.push(failure);
                            return Err(RoutingError::InvalidRequest {
                                message,
                                attempts: failures,
                            });
                        }
                        Err(failure) => {
                            warn!(
                                correlation_id = %request.correlation_id,
                                provider = %failure.provider,
                                model = %failure.model,
                                class = %failure.class,
                                "Attempt failed, falling back"
                            );
                            failures.push(failure);
                            DispatchState::Attempting(index + 1)
                        }
                    }
                }
                DispatchState::Success(success) => return Ok(*success),
                DispatchState::Exhausted => {
                    return Err(RoutingError::AllProvidersFailed { attempts: failures });
                }
            };
        }
    }

    fn success(
        &self,
        candidate: &Candidate,
        index: usize,
        completion: Completion,
        failures: &mut Vec<AttemptFailure>,
        calls_made: usize,
    ) -> DispatchSuccess {
        debug!(
            provider = %candidate.provider_id,
            model = %candidate.model_id,
            pool_size = self.pool.len(),
            "Attempt succeeded"
        );
        DispatchSuccess {
            completion,
            provider_id: candidate.provider_id.clone(),
            model_id: candidate.model_id.clone(),
            fallback_depth: index,
            failures: mem::take(failures),
            calls_made,
        }
    }

    /// Race two candidates; the first success wins and the other is dropped.
    async fn hedge(
        &self,
        request: &RoutingRequest,
        first: &Candidate,
        second: &Candidate,
    ) -> HedgeOutcome {
        let first_attempt = self.attempt(request, first);
        let second_attempt = self.attempt(request, second);
        tokio::pin!(first_attempt, second_attempt);

        let (settled, pending_index) = tokio::select! {
            result = &mut first_attempt => ((0, result), 1),
            result = &mut second_attempt => ((1, result), 0),
        };

        let first_failure = match settled {
            (index, Ok(completion)) => {
                return HedgeOutcome::Won {
                    index,
                    completion,
                    failures: Vec::new(),
                };
            }
            (_, Err(failure)) => failure,
        };
        if !first_failure.class.is_fallback_eligible() {
            return HedgeOutcome::Lost(vec![first_failure]);
        }

        let remaining = if pending_index == 1 {
            second_attempt.await
        } else {
            first_attempt.await
        };
        match remaining {
            Ok(completion) => HedgeOutcome::Won {
                index: pending_index,
                completion,
                failures: vec![first_failure],
            },
            Err(failure) => HedgeOutcome::Lost(vec![first_failure, failure]),
        }
    }

    /// One bounded call: waits for a concurrency permit and runs the
    /// completion inside the candidate's timeout, then updates health.
    async fn attempt(&self, request: &RoutingRequest, candidate: &Candidate) -> AttemptResult {
        let failure = |error: ProviderError| AttemptFailure {
            provider: candidate.provider_id.clone(),
            model: candidate.model_id.clone(),
            class: error.class,
            message: error.message,
        };

        let Some(entry) = self.pool.get(&candidate.provider_id) else {
            return Err(failure(ProviderError::unavailable("provider is not in the pool")));
        };

        let deadline = candidate.timeout;
        let started = Instant::now();
        let call = async {
            let _permit = entry
                .permits()
                .acquire()
                .await
                .map_err(|_closed| ProviderError::unavailable("provider permits closed"))?;
            let remaining = deadline.saturating_sub(started.elapsed());
            entry
                .adapter()
                .complete(&candidate.model_id, &request.text, remaining)
                .await
        };

        let outcome = match timeout(deadline, call).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(ProviderError::unavailable(format!(
                "timed out after {}ms",
                deadline.as_millis()
            ))),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(completion) => {
                entry.health().record_success(elapsed);
                if let Some(ceiling) = request.options.max_cost
                    && completion.cost > ceiling
                {
                    return Err(failure(ProviderError::new(
                        ErrorClass::PolicyViolation,
                        format!("actual cost {:.6} exceeds ceiling {ceiling:.6}", completion.cost),
                    )));
                }
                Ok(completion)
            }
            Err(error) => {
                entry.health().record_failure(error.class);
                debug!(
                    correlation_id = %request.correlation_id,
                    provider = %candidate.provider_id,
                    elapsed_ms = elapsed.as_millis(),
                    %error,
                    "Attempt error"
                );
                Err(failure(error))
            }
        }
    }
}

enum HedgeOutcome {
    Won {
        index: usize,
        completion: Completion,
        failures: Vec<AttemptFailure>,
    },
    Lost(Vec<AttemptFailure>),
}
