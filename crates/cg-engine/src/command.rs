//! Builder for executing external tool commands with timeout support.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How many trailing stderr lines are kept for error messages when
/// streaming.
const STDERR_TAIL_LINES: usize = 8;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8). Empty when streaming stderr.
    pub stdout: String,
    /// Captured standard error (lossy UTF-8). Only the tail when streaming.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use cg_engine::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> cg_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the process in the given working directory.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`cg_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`cg_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`cg_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> cg_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = self.command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| cg_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(cg_core::Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(cg_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The child future is dropped here and `kill_on_drop` reaps it.
            Err(_elapsed) => Err(cg_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Execute the command, handing every stderr line to `on_line` as it
    /// arrives.
    ///
    /// stdout is discarded. The callback is never invoked after this future
    /// resolves. When `cancel` fires or the timeout expires the child is
    /// killed and a [`cg_core::Error::Tool`] is returned whose message
    /// contains `cancelled` or `timed out` respectively.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
        cancel: Option<CancellationToken>,
    ) -> cg_core::Result<ToolOutput> {
        let program_name = self.program_name();
        let cancel = cancel.unwrap_or_default();

        let mut cmd = self.command();
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| cg_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| cg_core::Error::tool(&program_name, "stderr was not captured"))?;
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        on_line(&line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        return Err(cg_core::Error::tool(
                            program_name,
                            format!("failed to read stderr: {e}"),
                        ));
                    }
                },
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(cg_core::Error::tool(program_name, "cancelled"));
                }
                _ = &mut deadline => {
                    let _ = child.kill().await;
                    return Err(cg_core::Error::tool(
                        program_name,
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
            }
        }

        let status = child.wait().await.map_err(|e| {
            cg_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;
        let stderr = Vec::from(tail).join("\n");

        if !status.success() {
            return Err(cg_core::Error::tool(
                program_name,
                format!("exited with status {status}: {}", stderr.trim()),
            ));
        }

        Ok(ToolOutput {
            status,
            stdout: String::new(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_stdin_is_closed() {
        // `cat` would block forever on an inherited terminal.
        let out = ToolCommand::new(PathBuf::from("cat"))
            .timeout(Duration::from_secs(5))
            .execute()
            .await
            .unwrap();
        assert!(out.stdout.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_lines_are_streamed() {
        let mut seen = Vec::new();
        let out = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo one 1>&2; echo two 1>&2"])
            .execute_with_stderr_callback(|line| seen.push(line.to_string()), None)
            .await
            .unwrap();

        assert_eq!(seen, vec!["one", "two"]);
        assert!(out.stderr.contains("two"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streaming_failure_carries_stderr_tail() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo 'Invalid filter' 1>&2; exit 3"])
            .execute_with_stderr_callback(|_| {}, None)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("Invalid filter"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streaming_honours_cancellation() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .execute_with_stderr_callback(|_| {}, Some(token))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("cancelled"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streaming_runs_in_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), b"x").unwrap();

        let mut seen = Vec::new();
        ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "ls 1>&2"])
            .current_dir(dir.path())
            .execute_with_stderr_callback(|line| seen.push(line.to_string()), None)
            .await
            .unwrap();
        assert!(seen.iter().any(|l| l == "marker.txt"));
    }
}
