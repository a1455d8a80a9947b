//! Arguments of the `evaluate` command and their mapping onto engine and
//! oracle settings.
//!
//! Connection settings fall back to environment variables:
//! - `TRIAD_ENDPOINT`: base URL of the chat completions server
//! - `TRIAD_MODEL`: model name
//! - `TRIAD_API_KEY`: bearer token
//! - `TRIAD_CALL_TIMEOUT_SECS`: per-call deadline
//! - `TRIAD_MAX_CONCURRENCY`: bound on in-flight oracle calls

use clap::{Args, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use triad_core::{EvaluationState, TranslationTriple};
use triad_oracle::{HttpOracleConfig, OpenAiCompatibleOracle, Oracle, ScriptedOracle};
use triad_runtime::{EngineConfig, PartialPolicy, RetryPolicy, SiblingFailurePolicy};

/// Which oracle judges the triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OracleKind {
    /// OpenAI-compatible chat completions endpoint
    Openai,
    /// Replay the judgments of a saved state document
    Fixture,
}

/// Arguments of `triad evaluate`
#[derive(Debug, Clone, Args)]
pub struct EvaluateArgs {
    /// JSON file holding `source`, `machineTranslation` and `reference`
    #[arg(short, long, conflicts_with_all = ["source", "mt", "reference"])]
    pub input: Option<PathBuf>,

    /// Source sentence
    #[arg(long, requires_all = ["mt", "reference"])]
    pub source: Option<String>,

    /// Machine translation to evaluate
    #[arg(long, requires = "source")]
    pub mt: Option<String>,

    /// Reference translation
    #[arg(long, requires = "source")]
    pub reference: Option<String>,

    /// Oracle implementation
    #[arg(long, value_enum, default_value_t = OracleKind::Openai)]
    pub oracle: OracleKind,

    /// State document replayed by the fixture oracle
    #[arg(long, required_if_eq("oracle", "fixture"))]
    pub fixture: Option<PathBuf>,

    /// Chat completions base URL
    #[arg(long, env = "TRIAD_ENDPOINT", default_value = "http://localhost:8000")]
    pub endpoint: String,

    /// Model name
    #[arg(long, env = "TRIAD_MODEL", default_value = "gpt-4.1-mini")]
    pub model: String,

    /// API key
    #[arg(long, env = "TRIAD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Deadline for one oracle call, in seconds
    #[arg(
        long,
        env = "TRIAD_CALL_TIMEOUT_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub call_timeout_secs: u64,

    /// Completion token cap per oracle call
    #[arg(long, env = "TRIAD_MAX_TOKENS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tokens: Option<u32>,

    /// Maximum oracle calls in flight
    #[arg(long, env = "TRIAD_MAX_CONCURRENCY", default_value_t = 8)]
    pub max_concurrency: usize,

    /// Extra attempts after a timeout or transient failure
    #[arg(long, default_value_t = 2)]
    pub transient_retries: u32,

    /// Extra attempts after a reply that fails validation
    #[arg(long, default_value_t = 1)]
    pub invalid_output_retries: u32,

    /// Report file
    #[arg(short, long, default_value = "result.json")]
    pub output: PathBuf,

    /// Include every recorded judgment in the report
    #[arg(long)]
    pub include_state: bool,

    /// Aggregate even if some groups did not verify
    #[arg(long)]
    pub allow_partial: bool,

    /// Cancel a group's verification when one of its sub-categories fails
    #[arg(long)]
    pub cancel_group_on_sibling_failure: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl EvaluateArgs {
    /// Engine settings from the flags
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let retry = RetryPolicy::default()
            .with_call_timeout(Duration::from_secs(self.call_timeout_secs))
            .with_transient_retries(self.transient_retries)
            .with_invalid_output_retries(self.invalid_output_retries);
        EngineConfig::default()
            .with_max_concurrency(self.max_concurrency)
            .with_retry(retry)
            .with_partial(if self.allow_partial {
                PartialPolicy::Tolerate
            } else {
                PartialPolicy::Fail
            })
            .with_sibling_failure(if self.cancel_group_on_sibling_failure {
                SiblingFailurePolicy::CancelGroup
            } else {
                SiblingFailurePolicy::Skip
            })
    }

    /// Load the fixture state, if the fixture oracle is selected
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_fixture(&self) -> Result<Option<EvaluationState>> {
        match (self.oracle, &self.fixture) {
            (OracleKind::Fixture, Some(path)) => Ok(Some(read_state(path)?)),
            (OracleKind::Fixture, None) => bail!("--oracle fixture requires --fixture"),
            (OracleKind::Openai, _) => Ok(None),
        }
    }

    /// The triple to evaluate
    ///
    /// Falls back to the fixture's triple when neither `--input` nor
    /// `--source` is given.
    ///
    /// # Errors
    ///
    /// Returns error if no triple is given or the input file is unreadable
    pub fn load_triple(&self, fixture: Option<&EvaluationState>) -> Result<TranslationTriple> {
        if let Some(path) = &self.input {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&text)
                .wrap_err_with(|| format!("Invalid triple in {}", path.display()));
        }
        if let (Some(source), Some(mt), Some(reference)) = (&self.source, &self.mt, &self.reference)
        {
            return Ok(TranslationTriple::new(
                source.as_str(),
                mt.as_str(),
                reference.as_str(),
            ));
        }
        match fixture {
            Some(state) => Ok(state.triple().clone()),
            None => bail!("Provide --input FILE or --source, --mt and --reference"),
        }
    }

    /// Build the selected oracle
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn build_oracle(&self, fixture: Option<&EvaluationState>) -> Result<Arc<dyn Oracle>> {
        if let Some(state) = fixture {
            return Ok(Arc::new(ScriptedOracle::from_state(state)));
        }
        Ok(Arc::new(OpenAiCompatibleOracle::new(self.http_config())?))
    }

    fn http_config(&self) -> HttpOracleConfig {
        let mut config = HttpOracleConfig::new(self.endpoint.as_str(), self.model.as_str())
            .with_timeout(Duration::from_secs(self.call_timeout_secs));
        if let Some(key) = &self.api_key {
            config = config.with_api_key(SecretString::from(key.clone()));
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }
}

/// Read a state document
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a state document
pub fn read_state(path: &Path) -> Result<EvaluationState> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("Invalid state document {}", path.display()))
}
