//! Configuration data model.
//!
//! Every section has serde defaults so a partial file (or no file at all)
//! yields a complete, valid configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use reelforge_utils::types::Severity;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub refine: RefineConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub stagger: StaggerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Worker pool bounds. Pool size caps concurrent external calls regardless of
/// stage fan-out.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_size")]
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
        }
    }
}

fn default_pool_size() -> usize {
    4
}

/// Stage wall-clock budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagesConfig {
    /// Default timeout applied to every stage.
    #[serde(default = "default_stage_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-stage overrides keyed by stage name.
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_stage_timeout_secs(),
            timeouts: HashMap::new(),
        }
    }
}

fn default_stage_timeout_secs() -> u64 {
    300
}

/// Refinement loop budget and exit policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefineConfig {
    /// Maximum number of generation passes (initial generation included).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Minimum finding severity that forces another pass. Findings below it
    /// are tolerated and reported, not iterated on.
    #[serde(default = "default_blocking_severity")]
    pub blocking_severity: Severity,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            blocking_severity: default_blocking_severity(),
        }
    }
}

fn default_max_iterations() -> u32 {
    5
}

fn default_blocking_severity() -> Severity {
    Severity::Error
}

/// Model tier ladder, most capable first.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

fn default_tiers() -> Vec<String> {
    vec![
        "gemini-3-flash-preview".to_string(),
        "gemini-2.5-flash".to_string(),
        "gemini-2.0-flash".to_string(),
    ]
}

/// Inter-start spacing for parallel siblings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaggerConfig {
    #[serde(default = "default_stagger_base_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on the deterministic per-caller jitter added to the base.
    #[serde(default = "default_stagger_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for StaggerConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_stagger_base_ms(),
            jitter_ms: default_stagger_jitter_ms(),
        }
    }
}

fn default_stagger_base_ms() -> u64 {
    500
}

fn default_stagger_jitter_ms() -> u64 {
    250
}

/// Generative model backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Backend provider: `gemini` (HTTP) or `scripted` (offline replay, used
    /// by `--dry-run`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Override the provider endpoint; defaults to the public API.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Pause before retrying after a quota error, honoring provider
    /// cool-down advice.
    #[serde(default = "default_quota_cooldown_ms")]
    pub quota_cooldown_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            quota_cooldown_ms: default_quota_cooldown_ms(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.2
}

fn default_quota_cooldown_ms() -> u64 {
    250
}

/// Browser validation harness endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    /// HTTP endpoint of the harness; when unset, only offline validators are
    /// available (dry-run and tests).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_validator_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: default_validator_timeout_secs(),
        }
    }
}

fn default_validator_timeout_secs() -> u64 {
    120
}

/// Artifact output location.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output/site")
}

/// CLI-sourced overrides, applied on top of the discovered file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub pool_size: Option<usize>,
    pub max_iterations: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub tiers: Option<Vec<String>>,
}
