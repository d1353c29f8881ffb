//! # ssr-worker
//!
//! Render worker process. Reads framed render requests from stdin, renders
//! each one with the bundle named on the command line, and writes one framed
//! response per request to stdout. Logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Development: the bundle is reloaded for every request
//! ssr-worker dist/ssr.js
//!
//! # Production: the bundle is loaded once, before the first request
//! NODE_ENV=production ssr-worker dist/ssr.js
//!
//! # Log stack traces of failed renders
//! DEBUG_SSR=1 RUST_LOG=debug ssr-worker dist/ssr.js
//! ```

use anyhow::{Context, Result};
use argh::FromArgs;
use ssrbridge_worker::{serve, BundleRuntime, CachePolicy, RenderSession, WorkerConfig};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Server-side render worker speaking the ISSR line protocol on stdin/stdout
struct Args {
    /// path to the bundle (CommonJS or ES module) exporting `render`
    #[argh(positional)]
    bundle: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    // stdout carries protocol frames only
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = WorkerConfig::from_env(args.bundle);
    tracing::info!(
        bundle = %config.bundle_path.display(),
        node_env = config.policy.node_env(),
        debug = config.debug,
        "Starting render worker"
    );

    let runtime = BundleRuntime::for_config(&config).context("Failed to create JavaScript runtime")?;
    let mut session = RenderSession::new(runtime, &config.bundle_path, config.policy);

    if config.policy == CachePolicy::Production {
        session.preload().with_context(|| {
            format!("Failed to preload bundle {}", config.bundle_path.display())
        })?;
    }

    let responses = serve(&mut session, tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("Failed to write response")?;
    tracing::debug!(responses, "Render worker exiting");

    Ok(())
}
