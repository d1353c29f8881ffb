use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use ssrbridge_common::transport::{Frame, FrameReader, JsonCodec, MAX_FRAME_BYTES};
use ssrbridge_common::{BridgeError, RenderRequest, RenderedPage, Result};
use ssrbridge_worker::config::{CachePolicy, DEBUG_VAR, NODE_ENV_VAR};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::config::ClientConfig;

/// A running worker process and its protocol pipes.
struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    frames: FrameReader<BufReader<ChildStdout>>,
    /// Set while a request is written but its response not yet read. Still
    /// set on the next call means the caller was cancelled mid-exchange and
    /// an unread response may be on its way.
    in_flight: bool,
}

impl WorkerProcess {
    fn spawn(config: &ClientConfig) -> Result<Self> {
        let policy = if config.production {
            CachePolicy::Production
        } else {
            CachePolicy::Development
        };

        let mut command = Command::new(&config.worker_program);
        command
            .args(&config.worker_args)
            .arg(&config.bundle_path)
            .env(NODE_ENV_VAR, policy.node_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if config.debug {
            command.env(DEBUG_VAR, "1");
        }

        let mut child = command.spawn().map_err(BridgeError::Spawn)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Spawn(std::io::Error::other("worker stdin is not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn(std::io::Error::other("worker stdout is not piped")))?;

        tracing::info!(pid = ?child.id(), "Started render worker");
        Ok(Self {
            child,
            stdin,
            frames: FrameReader::new(BufReader::new(stdout)),
            in_flight: false,
        })
    }

    /// Write one request line and read the one response paired with it.
    async fn exchange(&mut self, line: &[u8]) -> Result<RenderedPage> {
        self.stdin.write_all(line).await?;
        self.stdin.flush().await?;

        match self.frames.next_frame().await? {
            Some(Frame::Message(payload)) => {
                let response = JsonCodec::decode_response(&payload)
                    .map_err(|e| BridgeError::InvalidResponse(e.to_string()))?;
                Ok(response.into_result()?)
            }
            Some(Frame::Oversized { len }) => Err(BridgeError::FrameTooLarge {
                len,
                max: MAX_FRAME_BYTES,
            }),
            None => Err(BridgeError::WorkerExited),
        }
    }

    async fn terminate(mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Render worker already gone: {}", e);
        }
        match self.child.wait().await {
            Ok(status) => tracing::info!(%status, "Render worker stopped"),
            Err(e) => tracing::warn!("Failed to reap render worker: {}", e),
        }
    }
}

/// Whether the worker can no longer be trusted to pair the next response
/// with the next request.
fn worker_is_unusable(error: &BridgeError) -> bool {
    matches!(
        error,
        BridgeError::Io(_) | BridgeError::WorkerExited | BridgeError::Timeout(_)
    )
}

/// Client driving one render worker process over its stdin and stdout.
///
/// Requests are serialized by an async mutex, so at most one request is in
/// flight and responses pair with requests in order. The worker is started
/// on the first [`send`](Self::send) (or eagerly by [`spawn`](Self::spawn)).
/// After a timeout or an unexpected exit it is discarded and a fresh worker
/// is started by the next call. The same happens when a `send` future is
/// dropped before its response arrived, since that response would otherwise
/// be paired with the next request.
///
/// # Example
///
/// ```no_run
/// use ssrbridge_client::{BridgeClient, ClientConfig};
/// use serde_json::json;
///
/// # async fn example() -> ssrbridge_common::Result<()> {
/// let client = BridgeClient::new(ClientConfig::new("ssr-worker", "dist/ssr.js"))?;
/// let page = client.send(json!({"component": "Home", "props": {"name": "Ada"}})).await?;
/// println!("{}", page.body);
/// client.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct BridgeClient {
    config: ClientConfig,
    worker: Mutex<Option<WorkerProcess>>,
    spawns: AtomicU64,
}

impl BridgeClient {
    /// Create a client; the worker starts on the first request.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            worker: Mutex::new(None),
            spawns: AtomicU64::new(0),
        })
    }

    /// Create a client and start its worker immediately.
    pub async fn spawn(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        {
            let mut worker = client.worker.lock().await;
            *worker = Some(client.start_worker()?);
        }
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of times a worker was started after the first.
    pub fn restart_count(&self) -> u64 {
        self.spawns.load(Ordering::Relaxed).saturating_sub(1)
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    fn start_worker(&self) -> Result<WorkerProcess> {
        let worker = WorkerProcess::spawn(&self.config)?;
        self.spawns.fetch_add(1, Ordering::Relaxed);
        Ok(worker)
    }

    /// Render `page` and return the worker's answer.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Render` - the worker answered with a render failure
    /// - `BridgeError::FrameTooLarge` - the request is too large to send
    /// - `BridgeError::Timeout` - no answer within the request timeout; the
    ///   worker has been killed
    /// - `BridgeError::WorkerExited` / `BridgeError::Io` - the worker died
    pub async fn send(&self, page: Value) -> Result<RenderedPage> {
        let line = JsonCodec::encode_request(&RenderRequest::new(page))?;

        let mut guard = self.worker.lock().await;
        if guard.as_ref().is_some_and(|worker| worker.in_flight) {
            tracing::warn!("Discarding render worker: an earlier request was cancelled mid-exchange");
            if let Some(worker) = guard.take() {
                worker.terminate().await;
            }
        }
        if guard.is_none() {
            *guard = Some(self.start_worker()?);
        }
        let worker = guard.as_mut().ok_or(BridgeError::WorkerExited)?;

        worker.in_flight = true;
        let result = match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, worker.exchange(&line)).await {
                Ok(result) => result,
                Err(_) => Err(BridgeError::Timeout(limit.as_millis() as u64)),
            },
            None => worker.exchange(&line).await,
        };
        worker.in_flight = false;

        if let Err(e) = &result {
            if worker_is_unusable(e) {
                tracing::warn!("Discarding render worker: {}", e);
                if let Some(worker) = guard.take() {
                    worker.terminate().await;
                }
            }
        }

        result
    }

    /// Close the worker's stdin and wait for it to exit.
    ///
    /// Returns `None` when no worker was running.
    pub async fn shutdown(&self) -> Result<Option<ExitStatus>> {
        let Some(worker) = self.worker.lock().await.take() else {
            return Ok(None);
        };
        let WorkerProcess {
            mut child, stdin, ..
        } = worker;
        drop(stdin);

        let status = child.wait().await?;
        tracing::info!(%status, "Render worker exited");
        Ok(Some(status))
    }

    /// Kill the worker immediately. The next request starts a new one.
    pub async fn kill(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.terminate().await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use ssrbridge_common::RenderError;
    use std::time::Duration;

    /// A client whose "worker" is a shell script; the bundle path arrives as `$1`.
    fn shell_client(script: &str, bundle: &str) -> ClientConfig {
        ClientConfig::new("sh", bundle)
            .with_arg("-c")
            .with_arg(script)
            .with_arg("sh")
    }

    const ECHO_BUNDLE: &str = r#"while IFS= read -r line; do
        echo "[LOG] ignored noise"
        printf 'ISSR{"ok":true,"head":["%s"],"body":"%s"}\n' "$NODE_ENV" "$1"
    done"#;

    #[tokio::test]
    async fn test_send_skips_noise_and_pairs_responses() {
        let client = BridgeClient::new(shell_client(ECHO_BUNDLE, "bundle.js")).unwrap();
        assert!(!client.is_running().await);

        for _ in 0..3 {
            let page = client.send(json!({"component": "Home"})).await.unwrap();
            assert_eq!(page.head, vec!["development".to_string()]);
            assert_eq!(page.body, "bundle.js");
        }

        assert!(client.is_running().await);
        assert_eq!(client.restart_count(), 0);
        assert!(client.shutdown().await.unwrap().unwrap().success());
        assert!(client.shutdown().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worker_environment_follows_config() {
        let script = r#"read -r line; printf 'ISSR{"ok":true,"body":"%s:%s"}\n' "$NODE_ENV" "$DEBUG_SSR""#;
        let config = shell_client(script, "bundle.js").production(true).debug(true);
        let client = BridgeClient::spawn(config).await.unwrap();

        let page = client.send(json!({})).await.unwrap();
        assert_eq!(page.body, "production:1");
    }

    #[tokio::test]
    async fn test_render_failure_keeps_worker() {
        let script = r#"while read -r line; do
            printf 'ISSR{"ok":false,"error":"Cannot find module '"'"'x.js'"'"'","kind":"module_not_found","path":"x.js"}\n'
        done"#;
        let client = BridgeClient::new(shell_client(script, "x.js")).unwrap();

        for _ in 0..2 {
            let err = client.send(json!({})).await.unwrap_err();
            assert_eq!(
                err.as_render_error(),
                Some(&RenderError::ModuleNotFound("x.js".into()))
            );
        }
        assert_eq!(client.restart_count(), 0);
    }

    #[tokio::test]
    async fn test_worker_exit_is_reported_and_worker_respawned() {
        let client = BridgeClient::new(shell_client("read -r line; exit 3", "bundle.js")).unwrap();

        assert!(matches!(client.send(json!({})).await, Err(BridgeError::WorkerExited)));
        assert!(!client.is_running().await);

        assert!(matches!(client.send(json!({})).await, Err(BridgeError::WorkerExited)));
        assert_eq!(client.restart_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_kills_worker() {
        let config = shell_client("while read -r line; do sleep 30; done", "bundle.js")
            .with_request_timeout(Duration::from_millis(200));
        let client = BridgeClient::new(config).unwrap();

        assert!(matches!(client.send(json!({})).await, Err(BridgeError::Timeout(200))));
        assert!(!client.is_running().await);
    }

    #[tokio::test]
    async fn test_cancelled_send_does_not_shift_responses() {
        let script = r#"while IFS= read -r line; do
            n=$(printf '%s' "$line" | sed 's/.*"req":\([0-9]*\).*/\1/')
            sleep 0.3
            printf 'ISSR{"ok":true,"body":"response-%s"}\n' "$n"
        done"#;
        let client = BridgeClient::new(shell_client(script, "bundle.js")).unwrap();

        let cancelled = tokio::time::timeout(Duration::from_millis(50), client.send(json!({"req": 1}))).await;
        assert!(cancelled.is_err());

        let page = client.send(json!({"req": 2})).await.unwrap();
        assert_eq!(page.body, "response-2");
        assert_eq!(client.restart_count(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_response_is_invalid() {
        let script = r#"while read -r line; do echo 'ISSR{not json'; done"#;
        let client = BridgeClient::new(shell_client(script, "bundle.js")).unwrap();

        assert!(matches!(
            client.send(json!({})).await,
            Err(BridgeError::InvalidResponse(_))
        ));
        assert!(client.is_running().await);
        client.kill().await;
        assert!(!client.is_running().await);
    }

    #[tokio::test]
    async fn test_oversized_request_is_refused_locally() {
        let client = BridgeClient::new(shell_client(ECHO_BUNDLE, "bundle.js")).unwrap();
        let huge = "x".repeat(MAX_FRAME_BYTES);

        assert!(matches!(
            client.send(json!({"body": huge})).await,
            Err(BridgeError::FrameTooLarge { .. })
        ));
        assert!(!client.is_running().await);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let config = ClientConfig::new("/nonexistent/ssr-worker", "bundle.js");
        assert!(matches!(
            BridgeClient::spawn(config).await,
            Err(BridgeError::Spawn(_))
        ));
    }
}
