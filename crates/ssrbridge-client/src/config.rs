//! Client configuration for spawning a render worker.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use ssrbridge_common::{BridgeError, Result};

/// How to start a render worker and how long to wait for it.
///
/// # Fields
///
/// - `worker_program` - executable to run (the `ssr-worker` binary)
/// - `worker_args` - arguments placed before the bundle path
/// - `bundle_path` - bundle handed to the worker as its last argument
/// - `production` - sets `NODE_ENV=production` on the worker
/// - `debug` - sets `DEBUG_SSR=1` on the worker
/// - `request_timeout` - per-request deadline (default: 30 seconds, `None` waits forever)
///
/// # Example
///
/// ```
/// use ssrbridge_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("ssr-worker", "dist/ssr.js")
///     .production(true)
///     .with_request_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub worker_program: PathBuf,
    pub worker_args: Vec<OsString>,
    pub bundle_path: PathBuf,
    pub production: bool,
    pub debug: bool,
    pub request_timeout: Option<Duration>,
}

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl ClientConfig {
    pub fn new(worker_program: impl Into<PathBuf>, bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            worker_program: worker_program.into(),
            worker_args: Vec::new(),
            bundle_path: bundle_path.into(),
            production: false,
            debug: false,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Add an argument passed to the worker before the bundle path.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.worker_args.push(arg.into());
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Wait for responses indefinitely.
    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` if:
    /// - the bundle path or worker program is empty
    /// - the request timeout is zero or longer than 1 hour
    pub fn validate(&self) -> Result<()> {
        if self.bundle_path.as_os_str().is_empty() {
            return Err(BridgeError::InvalidConfig("bundle path must not be empty".into()));
        }

        if self.worker_program.as_os_str().is_empty() {
            return Err(BridgeError::InvalidConfig("worker program must not be empty".into()));
        }

        if let Some(timeout) = self.request_timeout {
            if timeout.is_zero() {
                return Err(BridgeError::InvalidConfig(
                    "request timeout must be greater than zero".into(),
                ));
            }
            if timeout.as_secs() > 3600 {
                return Err(BridgeError::InvalidConfig(format!(
                    "request timeout must be <= 1 hour (got {} seconds)",
                    timeout.as_secs()
                )));
            }
        }

        Ok(())
    }
}
