//! Stage executor.
//!
//! Builds the oracle request for one category node from the current state,
//! then calls the oracle under the retry policy and validates the reply.
//! The executor never writes state.

use crate::policy::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use triad_core::{CategoryKey, EvaluationState, Judgment, Stage1Judgment, SuperCategory};
use triad_oracle::{
    InstructionCatalog, JudgmentValidator, Oracle, OracleContext, OracleError, OracleRequest,
};

/// Executor error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// A prerequisite judgment was absent when the node was prepared
    #[error("Missing dependency for {key}: {missing} not recorded")]
    MissingDependency {
        /// Node being prepared
        key: CategoryKey,
        /// Absent prerequisite
        missing: CategoryKey,
    },

    /// The oracle kept returning records that failed validation
    #[error("Invalid output for {key} after {attempts} attempt(s): {message}")]
    OracleInvalidOutput {
        /// Node being judged
        key: CategoryKey,
        /// Last validation failure
        message: String,
        /// Attempts made
        attempts: u32,
    },

    /// Every attempt exceeded the call deadline
    #[error("Oracle call for {key} timed out after {attempts} attempt(s)")]
    OracleTimeout {
        /// Node being judged
        key: CategoryKey,
        /// Attempts made
        attempts: u32,
    },

    /// Any other oracle failure
    #[error("Oracle call for {key} failed after {attempts} attempt(s): {error}")]
    OracleFailed {
        /// Node being judged
        key: CategoryKey,
        /// Last oracle error
        error: OracleError,
        /// Attempts made
        attempts: u32,
    },

    /// The node was abandoned before it resolved
    #[error("Node {key} cancelled")]
    Cancelled {
        /// Node that was abandoned
        key: CategoryKey,
    },
}

impl ExecutorError {
    /// Node the error belongs to
    #[must_use]
    pub const fn key(&self) -> CategoryKey {
        match self {
            Self::MissingDependency { key, .. }
            | Self::OracleInvalidOutput { key, .. }
            | Self::OracleTimeout { key, .. }
            | Self::OracleFailed { key, .. }
            | Self::Cancelled { key } => *key,
        }
    }

    /// Oracle attempts made before the error surfaced
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::OracleInvalidOutput { attempts, .. }
            | Self::OracleTimeout { attempts, .. }
            | Self::OracleFailed { attempts, .. } => *attempts,
            Self::MissingDependency { .. } | Self::Cancelled { .. } => 0,
        }
    }

    /// Short stable name of the error kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingDependency { .. } => "missing_dependency",
            Self::OracleInvalidOutput { .. } => "oracle_invalid_output",
            Self::OracleTimeout { .. } => "oracle_timeout",
            Self::OracleFailed { .. } => "oracle_failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    fn from_oracle(key: CategoryKey, err: OracleError, attempts: u32) -> Self {
        match err {
            OracleError::InvalidOutput { message } => Self::OracleInvalidOutput {
                key,
                message,
                attempts,
            },
            OracleError::Timeout { .. } => Self::OracleTimeout { key, attempts },
            error => Self::OracleFailed {
                key,
                error,
                attempts,
            },
        }
    }
}

/// A validated judgment for one node
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    /// Judged node
    pub key: CategoryKey,
    /// Validated record
    pub judgment: Judgment,
    /// Oracle attempts it took
    pub attempts: u32,
}

/// Executes category nodes against an oracle
///
/// Shared by every task of a run behind an `Arc`.
pub struct StageExecutor {
    oracle: Arc<dyn Oracle>,
    catalog: InstructionCatalog,
    validator: JudgmentValidator,
    retry: RetryPolicy,
}

impl StageExecutor {
    /// Create an executor with the standard catalog and default policy
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            catalog: InstructionCatalog::standard(),
            validator: JudgmentValidator::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the instruction catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: InstructionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Set the reply validator
    #[must_use]
    pub fn with_validator(mut self, validator: JudgmentValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Name of the underlying oracle
    #[must_use]
    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Build the request for `key` from the recorded state
    ///
    /// Stage-3 siblings without a recorded result are left out.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` if the parent Stage-1 record is absent,
    /// or if the catalog has no instructions for the key
    pub fn prepare(
        &self,
        key: CategoryKey,
        state: &EvaluationState,
    ) -> Result<OracleRequest, ExecutorError> {
        let instruction = self
            .catalog
            .get(key)
            .map_err(|_| ExecutorError::MissingDependency { key, missing: key })?
            .clone();

        let context = match key {
            CategoryKey::Stage1(_) => OracleContext::Initial,
            CategoryKey::Stage2(sub) => OracleContext::Critique {
                parent: parent_stage1(key, sub.parent(), state)?,
            },
            CategoryKey::Stage3(group) => OracleContext::Verification {
                parent: parent_stage1(key, group, state)?,
                siblings: state
                    .siblings(group)
                    .map(|(sub, judgment)| (sub, judgment.clone()))
                    .collect(),
            },
        };

        Ok(OracleRequest {
            key,
            instruction,
            triple: state.triple().clone(),
            context,
        })
    }

    /// Call the oracle for a prepared request
    ///
    /// Each attempt is bounded by the policy's call deadline.
    ///
    /// # Errors
    ///
    /// Returns the last failure once its retry budget is spent
    pub async fn run(&self, request: OracleRequest) -> Result<StageOutput, ExecutorError> {
        let key = request.key;
        let mut transient_left = self.retry.transient_retries;
        let mut invalid_left = self.retry.invalid_output_retries;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match self.attempt(&request).await {
                Ok(judgment) => {
                    debug!(key = %key, attempts, "Judgment accepted");
                    return Ok(StageOutput {
                        key,
                        judgment,
                        attempts,
                    });
                }
                Err(err) => err,
            };

            let budget = if matches!(err, OracleError::InvalidOutput { .. }) {
                Some(&mut invalid_left)
            } else if err.is_transient() {
                Some(&mut transient_left)
            } else {
                None
            };
            match budget {
                Some(left) if *left > 0 => *left -= 1,
                _ => return Err(ExecutorError::from_oracle(key, err, attempts)),
            }

            warn!(key = %key, attempt = attempts, kind = err.kind(), "Oracle call failed, retrying: {}", err);
            let pause = match err {
                OracleError::RateLimited {
                    retry_after_secs: Some(secs),
                } => self.retry.backoff.max(Duration::from_secs(secs)),
                _ => self.retry.backoff,
            };
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
    }

    async fn attempt(&self, request: &OracleRequest) -> Result<Judgment, OracleError> {
        let judgment = tokio::time::timeout(self.retry.call_timeout, self.oracle.judge(request))
            .await
            .map_err(|_| OracleError::Timeout {
                after_ms: u64::try_from(self.retry.call_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;
        self.validator.validate(request.key, &judgment)?;
        Ok(judgment)
    }

    /// Prepare and run one node
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::prepare`] or [`Self::run`]
    pub async fn execute(
        &self,
        key: CategoryKey,
        state: &EvaluationState,
    ) -> Result<(CategoryKey, Judgment), ExecutorError> {
        let request = self.prepare(key, state)?;
        let output = self.run(request).await?;
        Ok((output.key, output.judgment))
    }
}

fn parent_stage1(
    key: CategoryKey,
    group: SuperCategory,
    state: &EvaluationState,
) -> Result<Stage1Judgment, ExecutorError> {
    state
        .stage1(group)
        .cloned()
        .ok_or(ExecutorError::MissingDependency {
            key,
            missing: group.stage1_key(),
        })
}

impl std::fmt::Debug for StageExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageExecutor")
            .field("oracle", &self.oracle.name())
            .field("instructions", &self.catalog.len())
            .field("validator", &self.validator)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triad_core::{Stage2Judgment, SubCategory, TranslationTriple};
    use triad_oracle::{ScriptedOracle, ScriptedReply, clean_judgment};

    fn state() -> EvaluationState {
        EvaluationState::new(TranslationTriple::new(
            "Le chat dort.",
            "The cat sleeps.",
            "The cat is sleeping.",
        ))
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_call_timeout(Duration::from_millis(50))
            .with_backoff(Duration::ZERO)
    }

    fn executor(oracle: &Arc<ScriptedOracle>) -> StageExecutor {
        let oracle: Arc<dyn Oracle> = oracle.clone();
        StageExecutor::new(oracle).with_retry(fast_retry())
    }

    fn bad_stage1() -> Judgment {
        Judgment::Stage1(Stage1Judgment {
            probability: 1.5,
            reason: "out of range".to_string(),
            confidence: 90.0,
        })
    }

    #[test]
    fn test_prepare_stage1_has_no_context() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let request = executor(&oracle)
            .prepare(SuperCategory::Fluency.stage1_key(), &state())
            .unwrap();
        assert_eq!(request.context, OracleContext::Initial);
        assert_eq!(request.instruction.id, "mqm.fluency.stage1");
    }

    #[test]
    fn test_prepare_missing_parent() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = CategoryKey::Stage2(SubCategory::Grammar);
        let err = executor(&oracle).prepare(key, &state()).unwrap_err();
        assert_eq!(
            err,
            ExecutorError::MissingDependency {
                key,
                missing: SuperCategory::Fluency.stage1_key(),
            }
        );
        assert_eq!(err.kind(), "missing_dependency");

        let err = executor(&oracle)
            .prepare(SuperCategory::Style.stage3_key(), &state())
            .unwrap_err();
        assert!(matches!(err, ExecutorError::MissingDependency { .. }));
    }

    #[test]
    fn test_prepare_verification_skips_absent_siblings() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let mut state = state();
        let group = SuperCategory::Terminology;
        state
            .insert(group.stage1_key(), clean_judgment(group.stage1_key()))
            .unwrap();
        let present = CategoryKey::Stage2(SubCategory::InconsistencyUse);
        state
            .insert(
                present,
                Judgment::Stage2(Stage2Judgment {
                    re_evaluated_prob: 0.4,
                    thoughts_on_stage1: "partly agree".to_string(),
                    reason: "two renderings of one term".to_string(),
                    re_evaluated_confidence: 70.0,
                }),
            )
            .unwrap();

        let request = executor(&oracle).prepare(group.stage3_key(), &state).unwrap();
        let OracleContext::Verification { siblings, .. } = &request.context else {
            panic!("expected verification context");
        };
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].0, SubCategory::InconsistencyUse);
    }

    #[tokio::test]
    async fn test_execute_returns_judgment() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Accuracy.stage1_key();
        let (got, judgment) = executor(&oracle).execute(key, &state()).await.unwrap();
        assert_eq!(got, key);
        assert_eq!(judgment, clean_judgment(key));
        assert_eq!(oracle.call_count(key), 1);
    }

    #[tokio::test]
    async fn test_invalid_output_retried_once() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Accuracy.stage1_key();
        oracle.push_reply(key, bad_stage1());

        let request = executor(&oracle).prepare(key, &state()).unwrap();
        let output = executor(&oracle).run(request).await.unwrap();
        assert_eq!(output.attempts, 2);
        assert_eq!(oracle.call_count(key), 2);
    }

    #[tokio::test]
    async fn test_invalid_output_surfaces() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Accuracy.stage1_key();
        oracle.push_reply(key, bad_stage1());
        oracle.push_reply(key, bad_stage1());

        let err = executor(&oracle).execute(key, &state()).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::OracleInvalidOutput { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_invalid_output() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Style.stage1_key();
        let wrong = clean_judgment(SuperCategory::Style.stage3_key());
        oracle.push_reply(key, wrong.clone());
        oracle.push_reply(key, wrong);

        let err = executor(&oracle).execute(key, &state()).await.unwrap_err();
        assert_eq!(err.kind(), "oracle_invalid_output");
    }

    #[tokio::test]
    async fn test_timeout_retried_then_succeeds() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Fluency.stage1_key();
        oracle.push_reply(
            key,
            ScriptedReply::delayed(Duration::from_secs(5), clean_judgment(key).into()),
        );

        let (_, judgment) = executor(&oracle).execute(key, &state()).await.unwrap();
        assert_eq!(judgment, clean_judgment(key));

        let calls = oracle.calls_for(key);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls.iter().filter(|c| !c.completed).count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_budget_exhausted() {
        let oracle = Arc::new(ScriptedOracle::clean().with_delay(
            SuperCategory::Fluency.stage1_key(),
            Duration::from_secs(5),
        ));
        let key = SuperCategory::Fluency.stage1_key();

        let err = executor(&oracle).execute(key, &state()).await.unwrap_err();
        assert_eq!(err, ExecutorError::OracleTimeout { key, attempts: 3 });
        assert_eq!(oracle.call_count(key), 3);
    }

    #[tokio::test]
    async fn test_transient_errors_share_timeout_budget() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Style.stage1_key();
        oracle.push_reply(key, OracleError::Transport { message: "reset".into() });
        oracle.push_reply(key, OracleError::RateLimited { retry_after_secs: None });
        oracle.push_reply(key, OracleError::Transport { message: "reset".into() });

        let err = executor(&oracle).execute(key, &state()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::OracleFailed { attempts: 3, .. }));
        assert_eq!(oracle.remaining_replies(), 0);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Style.stage1_key();
        oracle.push_reply(
            key,
            OracleError::Api {
                status: 401,
                message: "bad key".into(),
            },
        );

        let err = executor(&oracle).execute(key, &state()).await.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.kind(), "oracle_failed");
        assert_eq!(oracle.call_count(key), 1);
    }
}
