//! Supervised execution of the external analyzer.
//!
//! The analyzer is a black box: it reads a prepared repository tree and
//! writes markdown into an output directory. Arguments are passed as an
//! explicit list — nothing is ever interpolated into a shell. The process
//! runs under a hard wall-clock timeout; on elapse it is asked to terminate
//! and then killed.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use docsmith_core::DocsmithError;

/// Lines of stderr kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Grace period between the termination signal and the hard kill.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// One analyzer invocation.
#[derive(Debug, Clone)]
pub struct AnalyzerRequest {
    /// The materialized repository tree to read.
    pub repo_dir: PathBuf,
    /// Where the markdown must land.
    pub output_dir: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub max_file_size: u64,
    /// Extra flags appended verbatim after the structured arguments.
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOutput {
    pub output_dir: PathBuf,
}

pub struct AnalyzerRunner {
    command: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl AnalyzerRunner {
    pub fn new(command: impl Into<String>, base_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            base_args,
            timeout,
        }
    }

    /// Run the analyzer to completion.
    ///
    /// Fails with `analyzer_timeout` when the wall clock elapses, and with
    /// `analyzer_failed` on a non-zero exit or when the run produces no
    /// markdown at all. Nothing is committed for a failed run.
    pub async fn run(&self, request: &AnalyzerRequest) -> Result<AnalyzerOutput, DocsmithError> {
        if !request.repo_dir.is_dir() {
            return Err(DocsmithError::Internal(format!(
                "analyzer input directory missing: {}",
                request.repo_dir.display()
            )));
        }
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| {
                DocsmithError::Internal(format!(
                    "cannot create analyzer output directory {}: {e}",
                    request.output_dir.display()
                ))
            })?;

        let mut command = Command::new(&self.command);
        command
            .args(&self.base_args)
            .arg("--repo")
            .arg(&request.repo_dir)
            .arg("--output")
            .arg(&request.output_dir)
            .arg("--max-file-size")
            .arg(request.max_file_size.to_string());
        for glob in &request.include_globs {
            command.arg("--include").arg(glob);
        }
        for glob in &request.exclude_globs {
            command.arg("--exclude").arg(glob);
        }
        command.args(&request.flags);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(command = %self.command, repo = %request.repo_dir.display(), "starting analyzer");

        let mut child = command.spawn().map_err(|e| {
            DocsmithError::AnalyzerFailed {
                exit_code: None,
                stderr_tail: format!("failed to spawn {}: {e}", self.command),
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Stream subprocess output to the log, keeping a stderr tail for
        // error messages. None of this reaches the progress bus.
        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "analyzer", "{line}");
                }
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "analyzer", "{line}");
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited.map_err(|e| DocsmithError::Internal(format!(
                "failed to wait for analyzer: {e}"
            )))?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "analyzer timed out; terminating");
                terminate_then_kill(&mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(DocsmithError::AnalyzerTimeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let _ = stdout_task.await;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(DocsmithError::AnalyzerFailed {
                exit_code: status.code(),
                stderr_tail,
            });
        }

        if collect_markdown_files(&request.output_dir).is_empty() {
            return Err(DocsmithError::AnalyzerFailed {
                exit_code: status.code(),
                stderr_tail: "analyzer exited cleanly but produced no markdown".to_string(),
            });
        }

        Ok(AnalyzerOutput {
            output_dir: request.output_dir.clone(),
        })
    }
}

/// Ask politely first, then kill.
async fn terminate_then_kill(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.kill().await;
}

/// Every `.md` file under `output_dir` as `(relative POSIX path, absolute
/// path)`, sorted by relative path.
pub fn collect_markdown_files(output_dir: &Path) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(output_dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(output_dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, entry.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}
