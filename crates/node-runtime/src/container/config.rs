//! # Node Configuration
//!
//! Defaults for every knob, overridable from `LC_*` environment variables.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `LC_PARTITIONS` | `partitions` | 8 |
//! | `LC_MAX_STEPS` | `dispatch.limits.max_steps` | 100 000 |
//! | `LC_MAX_CALL_DEPTH` | `dispatch.limits.max_call_depth` | 64 |
//! | `LC_MAX_EVAL_DEPTH` | `dispatch.limits.max_eval_depth` | 256 (at most 1024) |
//! | `LC_RESULT_POLICY` | `dispatch.result_policy` | `strict` |
//! | `LC_MAX_CONFLICT_RETRIES` | `max_conflict_retries` | 3 |
//! | `LC_SIGNATURE_INTERVAL` | `signing.signature_interval` | 100 |
//! | `LC_NODE_SEED` | `signing.node_seed` | random key |
//! | `LC_LOG_LEVEL` / `RUST_LOG` | `logging.level` | `info` |
//! | `LC_JSON_LOGS` | `logging.json` | false |
//!
//! The partition count is fixed here at startup; no request can change it.

use lc_03_script_dispatch::{DispatchConfig, ResultPolicy};
use shared_crypto::Ed25519KeyPair;
use shared_types::View;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default number of partition pairs.
pub const DEFAULT_PARTITIONS: usize = 8;
/// Default committed transactions between signatures.
pub const DEFAULT_SIGNATURE_INTERVAL: u64 = 100;
/// Default retries of a conflicting request.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Largest accepted `LC_MAX_EVAL_DEPTH`.
pub const MAX_EVAL_DEPTH: usize = 1024;
/// Native stack of the binary's request workers, sized for [`MAX_EVAL_DEPTH`].
pub const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// A setting is above what the node can run safely.
    #[error("{key} must be at most {max}")]
    TooLarge {
        /// Environment variable name.
        key: &'static str,
        /// Largest accepted value.
        max: usize,
    },

    /// A setting that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The node seed is not 32 hex-encoded bytes.
    #[error("invalid node seed: {0}")]
    InvalidSeed(String),

    /// The log subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Signing cadence and identity.
#[derive(Clone)]
pub struct SigningConfig {
    /// Committed transactions between automatic signatures.
    pub signature_interval: u64,
    /// Hex Ed25519 seed. A fresh key is generated when absent.
    pub node_seed: Option<String>,
    /// View reported by the single-node consensus stand-in.
    pub view: View,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            signature_interval: DEFAULT_SIGNATURE_INTERVAL,
            node_seed: None,
            view: 1,
        }
    }
}

impl SigningConfig {
    /// Key pair named by `node_seed`, or a fresh one.
    pub fn key_pair(&self) -> Result<Ed25519KeyPair, ConfigError> {
        match &self.node_seed {
            Some(seed) => Ed25519KeyPair::from_seed_hex(seed)
                .map_err(|e| ConfigError::InvalidSeed(e.to_string())),
            None => Ok(Ed25519KeyPair::generate()),
        }
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("signature_interval", &self.signature_interval)
            .field("node_seed", &self.node_seed.as_ref().map(|_| "<redacted>"))
            .field("view", &self.view)
            .finish()
    }
}

/// Log output settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Number of `priv`/`pub` partition pairs.
    pub partitions: usize,
    /// Dispatcher settings, including script limits.
    pub dispatch: DispatchConfig,
    /// Retries of a request that lost an optimistic-concurrency race.
    pub max_conflict_retries: u32,
    /// Signing settings.
    pub signing: SigningConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            partitions: DEFAULT_PARTITIONS,
            dispatch: DispatchConfig::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            signing: SigningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

impl NodeConfig {
    /// Defaults overridden by the process environment, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, then validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("LC_PARTITIONS") {
            config.partitions = parse("LC_PARTITIONS", &v)?;
        }
        if let Some(v) = lookup("LC_MAX_STEPS") {
            config.dispatch.limits.max_steps = parse("LC_MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("LC_MAX_CALL_DEPTH") {
            config.dispatch.limits.max_call_depth = parse("LC_MAX_CALL_DEPTH", &v)?;
        }
        if let Some(v) = lookup("LC_MAX_EVAL_DEPTH") {
            config.dispatch.limits.max_eval_depth = parse("LC_MAX_EVAL_DEPTH", &v)?;
        }
        if let Some(v) = lookup("LC_RESULT_POLICY") {
            config.dispatch.result_policy =
                v.parse::<ResultPolicy>()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: "LC_RESULT_POLICY",
                        value: v.clone(),
                        reason,
                    })?;
        }
        if let Some(v) = lookup("LC_MAX_CONFLICT_RETRIES") {
            config.max_conflict_retries = parse("LC_MAX_CONFLICT_RETRIES", &v)?;
        }
        if let Some(v) = lookup("LC_SIGNATURE_INTERVAL") {
            config.signing.signature_interval = parse("LC_SIGNATURE_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("LC_NODE_SEED") {
            config.signing.node_seed = Some(v);
        }
        if let Some(v) = lookup("LC_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            config.logging.level = v;
        }
        if let Some(v) = lookup("LC_JSON_LOGS") {
            config.logging.json = parse_flag("LC_JSON_LOGS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions == 0 {
            return Err(ConfigError::Zero("LC_PARTITIONS"));
        }
        if self.dispatch.limits.max_steps == 0 {
            return Err(ConfigError::Zero("LC_MAX_STEPS"));
        }
        if self.dispatch.limits.max_call_depth == 0 {
            return Err(ConfigError::Zero("LC_MAX_CALL_DEPTH"));
        }
        let eval_depth = self.dispatch.limits.max_eval_depth;
        if eval_depth == 0 {
            return Err(ConfigError::Zero("LC_MAX_EVAL_DEPTH"));
        }
        if eval_depth > MAX_EVAL_DEPTH {
            return Err(ConfigError::TooLarge {
                key: "LC_MAX_EVAL_DEPTH",
                max: MAX_EVAL_DEPTH,
            });
        }
        if self.signing.signature_interval == 0 {
            return Err(ConfigError::Zero("LC_SIGNATURE_INTERVAL"));
        }
        if self.signing.node_seed.is_some() {
            self.signing.key_pair()?;
        }
        Ok(())
    }
}
