//! Deterministic oracle driven by scripted replies.
//!
//! Used for tests, failure injection, and replaying a saved state document.
//! Every call is recorded with start and finish offsets from the oracle's
//! epoch, so callers can check ordering and overlap after a run.

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use triad_core::{
    CategoryKey, ErrorsExist, EvaluationState, Judgment, Stage1Judgment, Stage2Judgment,
    Stage3Judgment,
};

/// One scripted reply
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// Return this judgment
    Judgment(Judgment),
    /// Fail with this error
    Error(OracleError),
    /// Wait, then resolve the inner reply
    Delayed {
        /// Time to wait
        delay: Duration,
        /// Reply after the wait
        reply: Box<ScriptedReply>,
    },
}

impl ScriptedReply {
    /// Reply after a delay
    #[must_use]
    pub fn delayed(delay: Duration, reply: ScriptedReply) -> Self {
        Self::Delayed {
            delay,
            reply: Box::new(reply),
        }
    }
}

impl From<Judgment> for ScriptedReply {
    fn from(judgment: Judgment) -> Self {
        Self::Judgment(judgment)
    }
}

impl From<OracleError> for ScriptedReply {
    fn from(err: OracleError) -> Self {
        Self::Error(err)
    }
}

/// Record of one oracle call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Requested key
    pub key: CategoryKey,
    /// Offset from the oracle epoch when the call began
    pub started: Duration,
    /// Offset from the oracle epoch when the call ended
    pub finished: Duration,
    /// Keys embedded in the request context
    pub context_keys: Vec<CategoryKey>,
    /// False if the caller abandoned the call before it resolved
    pub completed: bool,
}

/// Oracle returning scripted replies
pub struct ScriptedOracle {
    name: String,
    epoch: Instant,
    defaults: HashMap<CategoryKey, Judgment>,
    delays: HashMap<CategoryKey, Duration>,
    queues: Mutex<HashMap<CategoryKey, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedOracle {
    /// Oracle with no defaults; unscripted keys fail
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            epoch: Instant::now(),
            defaults: HashMap::new(),
            delays: HashMap::new(),
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Oracle that finds no error anywhere, with full confidence
    #[must_use]
    pub fn clean() -> Self {
        let mut oracle = Self::new();
        for key in CategoryKey::all() {
            oracle.defaults.insert(key, clean_judgment(key));
        }
        oracle
    }

    /// Oracle replaying the judgments recorded in a state document
    ///
    /// Keys absent from the state are unscripted.
    #[must_use]
    pub fn from_state(state: &EvaluationState) -> Self {
        let mut oracle = Self::new().with_name("fixture");
        for (key, judgment) in state.iter() {
            oracle.defaults.insert(key, judgment.clone());
        }
        oracle
    }

    /// Set the oracle name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reply used for a key once its queue is empty
    #[must_use]
    pub fn with_default(mut self, key: CategoryKey, judgment: impl Into<Judgment>) -> Self {
        self.defaults.insert(key, judgment.into());
        self
    }

    /// Delay applied to every call for a key
    #[must_use]
    pub fn with_delay(mut self, key: CategoryKey, delay: Duration) -> Self {
        self.delays.insert(key, delay);
        self
    }

    /// Delay applied to every call
    #[must_use]
    pub fn with_uniform_delay(mut self, delay: Duration) -> Self {
        for key in CategoryKey::all() {
            self.delays.insert(key, delay);
        }
        self
    }

    /// Queue a reply for the next call on a key
    pub fn push_reply(&self, key: CategoryKey, reply: impl Into<ScriptedReply>) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push_back(reply.into());
    }

    /// Every call so far, in order of completion
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls made for one key
    #[must_use]
    pub fn calls_for(&self, key: CategoryKey) -> Vec<CallRecord> {
        self.calls().into_iter().filter(|c| c.key == key).collect()
    }

    /// Number of calls made for one key
    #[must_use]
    pub fn call_count(&self, key: CategoryKey) -> usize {
        self.calls_for(key).len()
    }

    /// Largest number of calls that were in flight at once
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Scripted replies not yet consumed
    #[must_use]
    pub fn remaining_replies(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(VecDeque::len)
            .sum()
    }

    fn next_reply(&self, key: CategoryKey) -> ScriptedReply {
        let queued = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(reply) => reply,
            None => match self.defaults.get(&key) {
                Some(judgment) => ScriptedReply::Judgment(judgment.clone()),
                None => ScriptedReply::Error(OracleError::Unscripted {
                    key: key.as_str().to_string(),
                }),
            },
        }
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one in-flight call; records it when dropped
struct CallGuard<'a> {
    oracle: &'a ScriptedOracle,
    key: CategoryKey,
    started: Duration,
    context_keys: Vec<CategoryKey>,
    completed: bool,
}

impl<'a> CallGuard<'a> {
    fn enter(oracle: &'a ScriptedOracle, request: &OracleRequest) -> Self {
        let now = oracle.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        oracle.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            oracle,
            key: request.key,
            started: oracle.epoch.elapsed(),
            context_keys: request.context_keys(),
            completed: false,
        }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let record = CallRecord {
            key: self.key,
            started: self.started,
            finished: self.oracle.epoch.elapsed(),
            context_keys: std::mem::take(&mut self.context_keys),
            completed: self.completed,
        };
        self.oracle
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        self.oracle.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn judge(&self, request: &OracleRequest) -> Result<Judgment, OracleError> {
        let mut guard = CallGuard::enter(self, request);
        let mut reply = self.next_reply(request.key);

        if let Some(delay) = self.delays.get(&request.key) {
            tokio::time::sleep(*delay).await;
        }

        loop {
            match reply {
                ScriptedReply::Delayed { delay, reply: inner } => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                ScriptedReply::Judgment(judgment) => {
                    guard.completed = true;
                    return Ok(judgment);
                }
                ScriptedReply::Error(err) => {
                    guard.completed = true;
                    return Err(err);
                }
            }
        }
    }
}

/// Zero-error judgment of the key's shape
#[must_use]
pub fn clean_judgment(key: CategoryKey) -> Judgment {
    match key {
        CategoryKey::Stage1(_) => Judgment::Stage1(Stage1Judgment {
            probability: 0.0,
            reason: "no error found".to_string(),
            confidence: 100.0,
        }),
        CategoryKey::Stage2(_) => Judgment::Stage2(Stage2Judgment {
            re_evaluated_prob: 0.0,
            thoughts_on_stage1: "agree with stage 1".to_string(),
            reason: "no error found".to_string(),
            re_evaluated_confidence: 100.0,
        }),
        CategoryKey::Stage3(_) => Judgment::Stage3(Stage3Judgment {
            consistency_score: 100.0,
            errors_exists: ErrorsExist::No,
            existance_reasoning: "agents agree there is no error".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionCatalog;
    use crate::oracle::OracleContext;
    use std::sync::Arc;
    use triad_core::{SuperCategory, TranslationTriple};

    fn request(key: CategoryKey) -> OracleRequest {
        OracleRequest {
            key,
            instruction: InstructionCatalog::standard().get(key).unwrap().clone(),
            triple: TranslationTriple::new("a", "b", "c"),
            context: OracleContext::Initial,
        }
    }

    #[tokio::test]
    async fn test_clean_oracle_defaults() {
        let oracle = ScriptedOracle::clean();
        let key = SuperCategory::Accuracy.stage3_key();
        let judgment = oracle.judge(&request(key)).await.unwrap();
        assert_eq!(judgment, clean_judgment(key));
        assert_eq!(oracle.call_count(key), 1);
        assert!(oracle.calls()[0].completed);
    }

    #[tokio::test]
    async fn test_queue_before_default() {
        let key = SuperCategory::Style.stage1_key();
        let oracle = ScriptedOracle::clean();
        oracle.push_reply(key, OracleError::Transport { message: "reset".into() });

        assert!(oracle.judge(&request(key)).await.is_err());
        assert!(oracle.judge(&request(key)).await.is_ok());
        assert_eq!(oracle.remaining_replies(), 0);
    }

    #[tokio::test]
    async fn test_unscripted_key() {
        let oracle = ScriptedOracle::new();
        let err = oracle
            .judge(&request(SuperCategory::Fluency.stage1_key()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OracleError::Unscripted {
                key: "fluencyStage1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_from_state_replays_records() {
        let key = SuperCategory::Terminology.stage1_key();
        let mut state = EvaluationState::new(TranslationTriple::new("a", "b", "c"));
        let judgment = Judgment::Stage1(Stage1Judgment {
            probability: 0.42,
            reason: "term".to_string(),
            confidence: 64.0,
        });
        state.insert(key, judgment.clone()).unwrap();

        let oracle = ScriptedOracle::from_state(&state);
        assert_eq!(oracle.name(), "fixture");
        assert_eq!(oracle.judge(&request(key)).await.unwrap(), judgment);
        assert!(oracle.judge(&request(SuperCategory::Style.stage1_key())).await.is_err());
    }

    #[tokio::test]
    async fn test_abandoned_call_recorded() {
        let key = SuperCategory::Accuracy.stage1_key();
        let oracle = ScriptedOracle::clean().with_delay(key, Duration::from_millis(200));
        let result =
            tokio::time::timeout(Duration::from_millis(10), oracle.judge(&request(key))).await;
        assert!(result.is_err());

        let calls = oracle.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].completed);
        assert_eq!(oracle.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_peak_in_flight() {
        let oracle = Arc::new(ScriptedOracle::clean().with_uniform_delay(Duration::from_millis(50)));
        let mut handles = Vec::new();
        for group in SuperCategory::ALL {
            let oracle = Arc::clone(&oracle);
            handles.push(tokio::spawn(async move {
                oracle.judge(&request(group.stage1_key())).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(oracle.peak_in_flight(), 4);
    }

    #[tokio::test]
    async fn test_delayed_reply() {
        let key = SuperCategory::Style.stage1_key();
        let oracle = ScriptedOracle::clean();
        oracle.push_reply(
            key,
            ScriptedReply::delayed(Duration::from_millis(20), clean_judgment(key).into()),
        );
        assert!(oracle.judge(&request(key)).await.is_ok());
        let call = &oracle.calls()[0];
        assert!(call.finished - call.started >= Duration::from_millis(20));
    }
}
