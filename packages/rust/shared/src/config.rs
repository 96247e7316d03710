//! Application configuration for Dossier.
//!
//! User config lives at `~/.dossier/dossier.toml`.
//! CLI flags override config file values, which override defaults.
//! The pipeline reads one immutable snapshot per run and never reloads it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DossierError, Result};
use crate::types::Mode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dossier.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dossier";

// ---------------------------------------------------------------------------
// Config structs (matching dossier.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Probe budgets and HTTP behaviour.
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Token-bucket settings per rate class.
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    /// Platform catalog selection.
    #[serde(default)]
    pub platforms: PlatformsConfig,

    /// AI reasoning collaborator.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// External username-enumeration collaborator.
    #[serde(default)]
    pub enumerator: EnumeratorConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Investigation mode when none is given on the command line.
    #[serde(default)]
    pub mode: Mode,

    /// Maximum number of generated email candidates.
    #[serde(default = "default_email_cap")]
    pub email_cap: usize,

    /// Whether the adaptive planner runs at all.
    #[serde(default = "default_true")]
    pub planner: bool,

    /// Completion fractions at which the planner is consulted.
    #[serde(default = "default_checkpoints")]
    pub checkpoints: Vec<f64>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Basic,
            email_cap: default_email_cap(),
            planner: true,
            checkpoints: default_checkpoints(),
        }
    }
}

fn default_email_cap() -> usize {
    48
}
fn default_true() -> bool {
    true
}
fn default_checkpoints() -> Vec<f64> {
    vec![0.25]
}

/// `[probe]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_basic_concurrency")]
    pub basic_concurrency: usize,
    #[serde(default = "default_advanced_concurrency")]
    pub advanced_concurrency: usize,
    #[serde(default = "default_basic_deadline")]
    pub basic_deadline_secs: u64,
    #[serde(default = "default_advanced_deadline")]
    pub advanced_deadline_secs: u64,
    /// Default per-probe timeout; platforms may declare their own.
    #[serde(default = "default_task_timeout")]
    pub per_task_timeout_ms: u64,
    /// How long in-flight probes may continue after the global deadline.
    #[serde(default = "default_grace")]
    pub grace_ms: u64,
    /// Maximum wait for a rate-limiter token before the attempt times out.
    #[serde(default = "default_limiter_wait")]
    pub limiter_wait_ms: u64,
    /// Cooldown applied to a rate class on HTTP 429 without `Retry-After`.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Largest response body read for predicates and evidence.
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
    /// Usernames probed per platform in basic mode.
    #[serde(default = "default_basic_usernames")]
    pub basic_username_limit: usize,
    /// Usernames probed per platform in advanced mode.
    #[serde(default = "default_advanced_usernames")]
    pub advanced_username_limit: usize,
    /// Check guessed personal-website domains (advanced mode only).
    #[serde(default = "default_true")]
    pub website_sweep: bool,
    /// URL checked for each guessed domain, `{}` standing for the domain.
    #[serde(default = "default_website_template")]
    pub website_template: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            basic_concurrency: default_basic_concurrency(),
            advanced_concurrency: default_advanced_concurrency(),
            basic_deadline_secs: default_basic_deadline(),
            advanced_deadline_secs: default_advanced_deadline(),
            per_task_timeout_ms: default_task_timeout(),
            grace_ms: default_grace(),
            limiter_wait_ms: default_limiter_wait(),
            cooldown_secs: default_cooldown(),
            max_body_bytes: default_max_body(),
            basic_username_limit: default_basic_usernames(),
            advanced_username_limit: default_advanced_usernames(),
            website_sweep: true,
            website_template: default_website_template(),
        }
    }
}

fn default_basic_concurrency() -> usize {
    10
}
fn default_advanced_concurrency() -> usize {
    15
}
fn default_basic_deadline() -> u64 {
    30
}
fn default_advanced_deadline() -> u64 {
    60
}
fn default_task_timeout() -> u64 {
    8_000
}
fn default_grace() -> u64 {
    1_500
}
fn default_limiter_wait() -> u64 {
    3_000
}
fn default_cooldown() -> u64 {
    30
}
fn default_max_body() -> usize {
    2 * 1024 * 1024
}
fn default_basic_usernames() -> usize {
    5
}
fn default_advanced_usernames() -> usize {
    12
}
fn default_website_template() -> String {
    "http://{}/".into()
}

/// `[rate_limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Bucket size for classes without an explicit entry.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Tokens per second for classes without an explicit entry.
    #[serde(default = "default_refill")]
    pub refill_per_sec: f64,
    /// Per-class overrides, keyed by rate class name.
    #[serde(default)]
    pub classes: BTreeMap<String, RateClassLimit>,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_sec: default_refill(),
            classes: BTreeMap::new(),
        }
    }
}

impl RateLimitsConfig {
    /// Effective limit for a rate class.
    pub fn limit_for(&self, class: &str) -> RateClassLimit {
        self.classes.get(class).cloned().unwrap_or(RateClassLimit {
            capacity: self.capacity,
            refill_per_sec: self.refill_per_sec,
        })
    }
}

fn default_capacity() -> u32 {
    4
}
fn default_refill() -> f64 {
    2.0
}

/// Token-bucket parameters for one rate class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateClassLimit {
    pub capacity: u32,
    pub refill_per_sec: f64,
}

/// `[platforms]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    /// Replace the built-in catalog with this TOML file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
    /// If non-empty, only platforms in these rate classes are probed.
    #[serde(default)]
    pub enabled_classes: Vec<String>,
    /// Platform ids that are never probed.
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// `[reasoning]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Time box for each planner or narration request.
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_reasoning_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".into()
}
fn default_endpoint() -> String {
    "https://api.deepseek.com/v1/chat/completions".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_reasoning_timeout() -> u64 {
    5
}

/// `[enumerator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumeratorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Executable to run (looked up on `PATH`).
    #[serde(default = "default_enumerator_command")]
    pub command: String,
    /// Per-username subprocess timeout.
    #[serde(default = "default_enumerator_timeout")]
    pub timeout_secs: u64,
    /// How many of the top usernames are handed to the enumerator.
    #[serde(default = "default_enumerator_usernames")]
    pub max_usernames: usize,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_enumerator_command(),
            timeout_secs: default_enumerator_timeout(),
            max_usernames: default_enumerator_usernames(),
        }
    }
}

fn default_enumerator_command() -> String {
    "sherlock".into()
}
fn default_enumerator_timeout() -> u64 {
    120
}
fn default_enumerator_usernames() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Probe config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime probing configuration for one mode, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Worker pool size.
    pub concurrency: usize,
    /// Absolute wall-clock budget for the whole probe phase.
    pub global_deadline: Duration,
    /// Default timeout for a single probe.
    pub per_task_timeout: Duration,
    /// Extra time granted to in-flight probes after the deadline.
    pub grace: Duration,
    /// Bounded wait for a rate-limiter token.
    pub limiter_wait: Duration,
    /// Default 429 cooldown.
    pub cooldown: Duration,
    /// Largest body read per probe.
    pub max_body_bytes: usize,
    /// Usernames probed per platform.
    pub username_limit: usize,
    /// Whether guessed website domains are checked this run.
    pub website_sweep: bool,
    pub website_template: String,
}

impl ProbeConfig {
    /// Resolve the runtime config for `mode` from the loaded application config.
    pub fn resolve(config: &AppConfig, mode: Mode) -> Self {
        let p = &config.probe;
        let (concurrency, deadline_secs, username_limit) = match mode {
            Mode::Basic => (
                p.basic_concurrency,
                p.basic_deadline_secs,
                p.basic_username_limit,
            ),
            Mode::Advanced => (
                p.advanced_concurrency,
                p.advanced_deadline_secs,
                p.advanced_username_limit,
            ),
        };

        Self {
            concurrency: concurrency.max(1),
            global_deadline: Duration::from_secs(deadline_secs),
            per_task_timeout: Duration::from_millis(p.per_task_timeout_ms),
            grace: Duration::from_millis(p.grace_ms),
            limiter_wait: Duration::from_millis(p.limiter_wait_ms),
            cooldown: Duration::from_secs(p.cooldown_secs),
            max_body_bytes: p.max_body_bytes,
            username_limit: username_limit.max(1),
            website_sweep: mode == Mode::Advanced && p.website_sweep,
            website_template: p.website_template.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dossier/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DossierError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dossier/dossier.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DossierError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DossierError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DossierError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DossierError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DossierError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the reasoning API key from the configured env var.
pub fn reasoning_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.reasoning.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(DossierError::unavailable(
            "reasoning",
            format!("API key not found. Set the {var_name} environment variable."),
        )),
    }
}
