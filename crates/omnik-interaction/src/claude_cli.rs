//! ClaudeCliClient - drives the `claude` CLI as a subprocess per turn.
//!
//! The process is started with `--print --output-format stream-json` and its
//! stdout is decoded line by line into [`StreamEvent`]s. Stderr is only logged.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use omnik_core::config::ClientConfig;
use omnik_core::{
    MalformedReason, OmnikError, QueryClient, QueryError, QueryRequest, QueryStream, Result,
    StreamEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::stream_json::parse_line;

/// Events buffered between the reader task and the turn.
const EVENT_BUFFER: usize = 32;

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Query client backed by the `claude` executable.
#[derive(Debug, Clone)]
pub struct ClaudeCliClient {
    /// Executable name or path. Looked up in PATH when bare.
    binary: String,
    /// Model used when the request doesn't name one.
    model: Option<String>,
    health_timeout: Duration,
}

impl ClaudeCliClient {
    /// Creates a client that runs `claude` from PATH with the CLI's own default model.
    pub fn new() -> Self {
        Self {
            binary: "claude".to_string(),
            model: None,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            health_timeout: config.health_timeout(),
        }
    }

    /// Sets the executable to run.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Argument list for one run. The prompt is always the last argument.
    pub fn build_args(&self, request: &QueryRequest) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--permission-mode".to_string(),
            request.permission_mode.to_string(),
        ];

        if !request.allowed_tools.is_empty() {
            // One comma-joined value; the flag is variadic and would swallow the prompt.
            args.push("--allowed-tools".to_string());
            args.push(request.allowed_tools.join(","));
        }

        if let Some(model) = request.model.as_ref().or(self.model.as_ref()) {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        if let Some(resume_id) = request.resume_id.as_ref().filter(|id| !id.is_empty()) {
            args.push("--resume".to_string());
            args.push(resume_id.clone());
        }

        args.push(request.prompt.clone());
        args
    }
}

impl Default for ClaudeCliClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryClient for ClaudeCliClient {
    fn run(&self, request: QueryRequest, cancel: CancellationToken) -> QueryStream {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(1);

        let run = Run {
            binary: self.binary.clone(),
            args: self.build_args(&request),
            working_dir: request.working_dir,
            cancel,
        };

        tokio::spawn(async move {
            if let Err(err) = run.drive(&event_tx).await {
                tracing::warn!(binary = %run.binary, error = %err, "assistant run failed");
                let _ = error_tx.send(err).await;
            }
            // The error is queued before the event channel closes.
            drop(event_tx);
        });

        QueryStream {
            events: event_rx,
            errors: error_rx,
        }
    }

    async fn health(&self) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.health_timeout, command.output())
            .await
            .map_err(|_| {
                OmnikError::Subprocess(format!(
                    "`{} --version` did not answer within {:?}",
                    self.binary, self.health_timeout
                ))
            })?
            .map_err(|e| OmnikError::Subprocess(format!("failed to run `{}`: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(OmnikError::Subprocess(format!(
                "`{} --version` exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// One subprocess run.
struct Run {
    binary: String,
    args: Vec<String>,
    working_dir: PathBuf,
    cancel: CancellationToken,
}

impl Run {
    /// Spawns the process and forwards events until it exits or is cancelled.
    ///
    /// Sends [`StreamEvent::Terminal`] only after a successful exit that was
    /// not cancelled.
    async fn drive(&self, events: &mpsc::Sender<StreamEvent>) -> std::result::Result<(), QueryError> {
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| QueryError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        tracing::info!(
            binary = %self.binary,
            pid = ?child.id(),
            working_dir = %self.working_dir.display(),
            "assistant started"
        );

        let stdout = child.stdout.take().ok_or_else(|| {
            QueryError::Read(std::io::Error::other("assistant stdout was not captured"))
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        let mut lines = BufReader::new(stdout).lines();
        let mut forwarded = 0usize;

        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    terminate(&mut child).await;
                    return Ok(());
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    terminate(&mut child).await;
                    return Err(QueryError::Read(e));
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event = match parse_line(line) {
                StreamEvent::Malformed(MalformedReason::UnhandledType(kind)) => {
                    tracing::debug!(message_type = %kind, "ignoring stream message");
                    continue;
                }
                StreamEvent::Malformed(reason) => {
                    tracing::warn!(reason = ?reason, "skipping malformed stream line");
                    continue;
                }
                event => event,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    terminate(&mut child).await;
                    return Ok(());
                }
                sent = events.send(event) => {
                    if sent.is_err() {
                        tracing::debug!("event receiver dropped, stopping assistant");
                        terminate(&mut child).await;
                        return Ok(());
                    }
                    forwarded += 1;
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                terminate(&mut child).await;
                return Ok(());
            }
            status = child.wait() => status.map_err(QueryError::Wait)?,
        };

        tracing::info!(status = %status, events = forwarded, "assistant exited");

        if !status.success() {
            return Err(QueryError::Exited {
                code: status.code(),
            });
        }

        if !self.cancel.is_cancelled() {
            let _ = events.send(StreamEvent::Terminal).await;
        }
        Ok(())
    }
}

/// Kills the child and reaps it. Failures are logged only.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "assistant already gone");
    }
    match child.wait().await {
        Ok(status) => tracing::info!(status = %status, "assistant terminated"),
        Err(e) => tracing::warn!(error = %e, "failed to reap assistant"),
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(target: "omnik::claude::stderr", "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: "omnik::claude::stderr", error = %e, "stderr read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnik_core::PermissionMode;

    fn request() -> QueryRequest {
        QueryRequest {
            prompt: "what is 2+2?".to_string(),
            resume_id: None,
            working_dir: PathBuf::from("/workspace"),
            permission_mode: PermissionMode::BypassPermissions,
            allowed_tools: vec!["Bash".to_string(), "Read".to_string()],
            model: None,
        }
    }

    #[test]
    fn test_build_args_minimal() {
        let client = ClaudeCliClient::new();
        let args = client.build_args(&request());
        assert_eq!(
            args,
            vec![
                "--print",
                "--output-format",
                "stream-json",
                "--verbose",
                "--permission-mode",
                "bypassPermissions",
                "--allowed-tools",
                "Bash,Read",
                "what is 2+2?",
            ]
        );
    }

    #[test]
    fn test_request_model_overrides_default_and_resume_is_passed() {
        let client = ClaudeCliClient::new().with_model("sonnet");
        let mut req = request();
        req.model = Some("opus".to_string());
        req.resume_id = Some("3f1c".to_string());
        req.allowed_tools.clear();

        let args = client.build_args(&req);
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("--model") + 1], "opus");
        assert_eq!(args[pos("--resume") + 1], "3f1c");
        assert!(!args.contains(&"--allowed-tools".to_string()));
        assert_eq!(args.last().unwrap(), "what is 2+2?");
    }

    #[test]
    fn test_prompt_is_never_shell_interpreted() {
        let client = ClaudeCliClient::new();
        let mut req = request();
        req.prompt = "$(rm -rf /); echo 'hi'".to_string();
        let args = client.build_args(&req);
        assert_eq!(args.last().unwrap(), "$(rm -rf /); echo 'hi'");
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::default();
        let client = ClaudeCliClient::from_config(&config);
        assert_eq!(client.binary(), "claude");
        assert_eq!(client.model.as_deref(), Some("sonnet"));
        assert_eq!(client.health_timeout, Duration::from_secs(10));
    }
}
