//! Worker configuration
//!
//! The worker is configured by its single command-line argument (the bundle
//! path) and two environment variables:
//!
//! - `NODE_ENV=production` selects [`CachePolicy::Production`]; any other
//!   value, or none, selects [`CachePolicy::Development`].
//! - `DEBUG_SSR=1` logs stack traces for failed renders.

use std::path::PathBuf;

/// Environment variable selecting the cache policy.
pub const NODE_ENV_VAR: &str = "NODE_ENV";

/// Environment variable enabling detailed error logging.
pub const DEBUG_VAR: &str = "DEBUG_SSR";

/// Whether the bundle is reloaded for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Evict the bundle and its dependencies before every render.
    #[default]
    Development,
    /// Load the bundle once and keep it.
    Production,
}

impl CachePolicy {
    pub fn from_node_env(value: Option<&str>) -> Self {
        match value {
            Some("production") => CachePolicy::Production,
            _ => CachePolicy::Development,
        }
    }

    /// The `NODE_ENV` value matching this policy.
    pub fn node_env(self) -> &'static str {
        match self {
            CachePolicy::Development => "development",
            CachePolicy::Production => "production",
        }
    }

    pub fn reloads_per_request(self) -> bool {
        self == CachePolicy::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Path to the rendering bundle, as given on the command line.
    pub bundle_path: PathBuf,
    pub policy: CachePolicy,
    /// Log stack traces of failed renders.
    pub debug: bool,
}

impl WorkerConfig {
    pub fn new(bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            policy: CachePolicy::default(),
            debug: false,
        }
    }

    /// Build a configuration from `NODE_ENV` and `DEBUG_SSR`.
    pub fn from_env(bundle_path: impl Into<PathBuf>) -> Self {
        let node_env = std::env::var(NODE_ENV_VAR).ok();
        let debug = std::env::var(DEBUG_VAR).ok();
        Self::from_values(bundle_path, node_env.as_deref(), debug.as_deref())
    }

    fn from_values(
        bundle_path: impl Into<PathBuf>,
        node_env: Option<&str>,
        debug: Option<&str>,
    ) -> Self {
        Self::new(bundle_path)
            .with_policy(CachePolicy::from_node_env(node_env))
            .with_debug(debug == Some("1"))
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
