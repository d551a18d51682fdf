//! Built-in units of work: shell commands, file deletion and writes, HTTP calls.
//!
//! Each wrapper only builds a label, a description and a closure, then goes
//! through `SecureExecutor::execute` like any other caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::error::ExecutorError;
use crate::executor::{ExecuteOptions, ExecutionOutcome, SecureExecutor};
use crate::safety::OperationCategory;

/// Maximum output size kept from a shell command, per stream.
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// Path fragments that always need confirmation before being written.
const IMPORTANT_PATHS: &[&str] = &[
    "/etc/",
    "/usr/",
    "/bin/",
    "/boot/",
    "c:\\windows",
    "cargo.toml",
    "cargo.lock",
    "package.json",
    "package-lock.json",
    ".env",
    ".ssh/",
    "id_rsa",
    "credentials",
    "secrets",
    "config.toml",
];

/// Captured result of a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Status and body of an HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Whether writing to `path` should always be confirmed.
pub fn is_important_path(path: &Path) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/").to_lowercase();
    IMPORTANT_PATHS.iter().any(|fragment| {
        let fragment = fragment.replace('\\', "/");
        normalized.contains(&fragment)
    })
}

impl SecureExecutor {
    /// Run a command with `sh -c`, bounded by the configured shell timeout.
    pub async fn execute_shell(
        &self,
        command: &str,
        options: ExecuteOptions,
    ) -> ExecutionOutcome<ShellOutput> {
        let timeout = self.config.shell_timeout;
        let options = with_default_description(options, || format!("Run shell command: {}", command));
        self.execute(command, || run_shell(command, timeout), options)
            .await
    }

    /// Delete a file.
    pub async fn delete_file(&self, path: &Path, options: ExecuteOptions) -> ExecutionOutcome<()> {
        let label = format!("delete file {}", path.display());
        let options = with_default_description(options, || format!("Delete {}", path.display()))
            .with_context("path", path.display().to_string());
        let target = path.to_path_buf();
        self.execute(
            &label,
            || async move {
                tokio::fs::remove_file(&target)
                    .await
                    .map_err(|source| ExecutorError::Io {
                        path: target.clone(),
                        source,
                    })
            },
            options,
        )
        .await
    }

    /// Write `content` to a file, creating parent directories as needed.
    ///
    /// Important locations (system directories, manifests, secrets) always
    /// ask for confirmation, whatever the classifier concludes.
    pub async fn write_file(
        &self,
        path: &Path,
        content: &str,
        options: ExecuteOptions,
    ) -> ExecutionOutcome<usize> {
        let label = format!("write file {}", path.display());
        let mut options = with_default_description(options, || {
            format!("Write {} bytes to {}", content.len(), path.display())
        })
        .with_context("path", path.display().to_string());
        if is_important_path(path) {
            options = options.force_confirm(OperationCategory::FileModify);
        }

        let target: PathBuf = path.to_path_buf();
        let bytes = content.as_bytes().to_vec();
        self.execute(
            &label,
            || async move {
                let io_err = |source: std::io::Error| ExecutorError::Io {
                    path: target.clone(),
                    source,
                };
                if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
                }
                tokio::fs::write(&target, &bytes).await.map_err(io_err)?;
                Ok::<_, ExecutorError>(bytes.len())
            },
            options,
        )
        .await
    }

    /// Make an HTTP request, sending `body` as JSON when present.
    pub async fn call_api(
        &self,
        method: &str,
        url: &str,
        body: Option<serde_json::Value>,
        options: ExecuteOptions,
    ) -> ExecutionOutcome<ApiResponse> {
        let label = format!("{} {}", method.to_uppercase(), url);
        let options = with_default_description(options, || format!("Call {}", label));

        let client = self.http.clone();
        self.execute(
            &label,
            || async move {
                let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
                    .map_err(|_| ExecutorError::InvalidMethod(method.to_string()))?;
                let mut request = client.request(method, url);
                if let Some(body) = body {
                    request = request.json(&body);
                }
                let response = request.send().await?;
                let status = response.status().as_u16();
                let body = response.text().await?;
                Ok::<_, ExecutorError>(ApiResponse { status, body })
            },
            options,
        )
        .await
    }
}

fn with_default_description(
    mut options: ExecuteOptions,
    describe: impl FnOnce() -> String,
) -> ExecuteOptions {
    if options.description.is_none() {
        options.description = Some(describe());
    }
    options
}

async fn run_shell(command: &str, timeout: Duration) -> Result<ShellOutput, ExecutorError> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };

    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ExecutorError::Spawn)?;

    // Dropping the future on timeout kills the child.
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ExecutorError::Timeout(timeout))?
        .map_err(ExecutorError::Spawn)?;

    Ok(ShellOutput {
        stdout: truncate_output(&output.stdout),
        stderr: truncate_output(&output.stderr),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

fn truncate_output(bytes: &[u8]) -> String {
    let kept = &bytes[..bytes.len().min(MAX_OUTPUT_SIZE)];
    let mut text = String::from_utf8_lossy(kept).into_owned();
    if bytes.len() > MAX_OUTPUT_SIZE {
        text.push_str("\n... (output truncated)");
    }
    text
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::approval::{ApprovalAction, ApprovalGate, ChannelDelivery, OutgoingMessage};
    use crate::config::{ApprovalConfig, ExecutorConfig};

    fn executor_with(config: ExecutorConfig) -> (Arc<SecureExecutor>, mpsc::Receiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let gate = ApprovalGate::new(ApprovalConfig::default(), Arc::new(ChannelDelivery::new(tx)));
        (Arc::new(SecureExecutor::new(gate, config)), rx)
    }

    fn ungated() -> ExecutorConfig {
        ExecutorConfig {
            confirmation_enabled: false,
            ..ExecutorConfig::default()
        }
    }

    #[test]
    fn test_important_paths() {
        assert!(is_important_path(Path::new("/etc/hosts")));
        assert!(is_important_path(Path::new("project/Cargo.toml")));
        assert!(is_important_path(Path::new("/home/me/.ssh/authorized_keys")));
        assert!(is_important_path(Path::new(r"C:\Windows\System32\drivers\etc\hosts")));
        assert!(is_important_path(Path::new("app/.env")));
        assert!(!is_important_path(Path::new("notes/today.md")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_captures_output() {
        let (executor, _rx) = executor_with(ExecutorConfig::default());

        let outcome = executor
            .execute_shell("echo hello", ExecuteOptions::new())
            .await;

        let output = outcome.into_value().unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_timeout_is_a_failure() {
        let config = ExecutorConfig {
            shell_timeout: Duration::from_millis(100),
            ..ExecutorConfig::default()
        };
        let (executor, _rx) = executor_with(config);

        let outcome = executor.execute_shell("sleep 5", ExecuteOptions::new()).await;

        match outcome {
            ExecutionOutcome::Failed { error } => assert!(error.contains("timed out")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_then_delete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.txt");
        let (executor, _rx) = executor_with(ungated());

        let written = executor
            .write_file(&path, "remember the milk", ExecuteOptions::new())
            .await;
        assert_eq!(written, ExecutionOutcome::Completed(17));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "remember the milk");

        let deleted = executor.delete_file(&path, ExecuteOptions::new()).await;
        assert!(deleted.is_success());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, _rx) = executor_with(ungated());

        let outcome = executor
            .delete_file(&dir.path().join("absent.txt"), ExecuteOptions::new())
            .await;

        assert!(matches!(outcome, ExecutionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_delete_waits_for_approval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.log");
        std::fs::write(&path, "stale").unwrap();
        let (executor, mut rx) = executor_with(ExecutorConfig::default());

        let task = {
            let executor = Arc::clone(&executor);
            let path = path.clone();
            tokio::spawn(async move { executor.delete_file(&path, ExecuteOptions::new()).await })
        };

        let message = rx.recv().await.unwrap();
        assert_eq!(message.metadata["category"], "file_delete");
        assert!(path.exists());

        let id = message.metadata["operation_id"].as_str().unwrap().to_string();
        executor.gate().resolve(&id, ApprovalAction::Approve).await;

        assert!(task.await.unwrap().is_success());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_important_write_is_confirmed_and_can_be_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cargo.toml");
        let (executor, mut rx) = executor_with(ExecutorConfig::default());

        let task = {
            let executor = Arc::clone(&executor);
            let path = path.clone();
            tokio::spawn(async move {
                executor
                    .write_file(&path, "[package]", ExecuteOptions::new())
                    .await
            })
        };

        let message = rx.recv().await.unwrap();
        let id = message.metadata["operation_id"].as_str().unwrap().to_string();
        executor.gate().resolve(&id, ApprovalAction::Reject).await;

        assert!(task.await.unwrap().is_skipped());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_invalid_http_method() {
        let (executor, _rx) = executor_with(ungated());

        let outcome = executor
            .call_api("NOT A METHOD", "http://127.0.0.1:9", None, ExecuteOptions::new())
            .await;

        match outcome {
            ExecutionOutcome::Failed { error } => assert!(error.contains("Invalid HTTP method")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_call_only_asks_when_forced() {
        let (executor, mut rx) = executor_with(ExecutorConfig::default());

        let benign = executor
            .call_api("GET", "http://127.0.0.1:9/status", None, ExecuteOptions::new())
            .await;
        assert!(matches!(benign, ExecutionOutcome::Failed { .. }));
        assert!(rx.try_recv().is_err());

        let task = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .call_api(
                        "POST",
                        "http://127.0.0.1:9/notify",
                        Some(serde_json::json!({"text": "hi"})),
                        ExecuteOptions::new().force_confirm(OperationCategory::SendMessage),
                    )
                    .await
            })
        };

        let message = rx.recv().await.unwrap();
        assert_eq!(message.metadata["category"], "send_message");
        let id = message.metadata["operation_id"].as_str().unwrap().to_string();
        executor.gate().resolve(&id, ApprovalAction::Reject).await;

        assert!(task.await.unwrap().is_skipped());
    }

    #[test]
    fn test_truncate_output() {
        let long = vec![b'a'; MAX_OUTPUT_SIZE + 10];
        let text = truncate_output(&long);
        assert!(text.ends_with("(output truncated)"));
        assert_eq!(truncate_output(b"short"), "short");
    }
}
