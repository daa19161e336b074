/// Shell command jobs
///
/// Runs a configured job command as `<shell> -c <command>` from the project
/// root, exposing the job context through environment variables.
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::job::JobContext;

/// How many trailing stderr lines to carry into a failure message
const STDERR_TAIL_LINES: usize = 20;

/// Runs job commands through a shell
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: PathBuf,
    root: PathBuf,
}

impl CommandExecutor {
    pub fn new(shell: &str, root: &Path) -> Self {
        // Resolve shell from PATH, falling back to the name as given
        let shell = which::which(shell).unwrap_or_else(|e| {
            warn!(shell, error = %e, "could not find shell in PATH, trying as-is");
            PathBuf::from(shell)
        });

        Self {
            shell,
            root: root.to_path_buf(),
        }
    }

    /// Run `command` for a job, failing on non-zero exit or timeout
    pub async fn execute(
        &self,
        command: &str,
        ctx: &JobContext,
        env: &BTreeMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .envs(env)
            .env("REGEN_LABEL", &ctx.label)
            .env("REGEN_SCRATCH_DIR", &ctx.scratch_dir)
            .env("REGEN_INPUTS", join_paths(&ctx.inputs))
            .env("REGEN_OUTPUTS", join_paths(&ctx.outputs))
            .env("REGEN_OUTPUT", ctx.output())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(job = %ctx.label, shell = %self.shell.display(), command, "spawning command");

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn shell: {}", self.shell.display()))?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    anyhow::anyhow!("Command timed out after {}s: {}", limit.as_secs(), command)
                })?,
            None => child.wait_with_output().await,
        }
        .context("Failed to wait for command")?;

        forward_output(&output).await?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let tail = stderr_tail(&output.stderr);
            if tail.is_empty() {
                anyhow::bail!("Command exited with {}: {}", code, command);
            }
            anyhow::bail!("Command exited with {}: {}\n{}", code, command, tail);
        }

        Ok(())
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n")
}

async fn forward_output(output: &Output) -> Result<()> {
    if !output.stdout.is_empty() {
        tokio::io::stdout()
            .write_all(&output.stdout)
            .await
            .context("Failed to write stdout")?;
    }
    if !output.stderr.is_empty() {
        tokio::io::stderr()
            .write_all(&output.stderr)
            .await
            .context("Failed to write stderr")?;
    }
    Ok(())
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context(root: &Path) -> JobContext {
        let scratch_dir = root.join("scratch");
        fs::create_dir_all(&scratch_dir).unwrap();
        JobContext {
            label: "version".to_string(),
            inputs: vec![root.join("package.json")],
            outputs: vec![root.join("version.ts"), root.join("versions.js")],
            scratch_dir,
        }
    }

    #[tokio::test]
    async fn test_execute_exposes_context() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let executor = CommandExecutor::new("sh", temp.path());

        executor
            .execute(
                "printf '%s|%s|%s' \"$REGEN_LABEL\" \"$GREETING\" \"$REGEN_INPUTS\" > \"$REGEN_OUTPUT\"",
                &ctx,
                &BTreeMap::from([("GREETING".to_string(), "hi".to_string())]),
                None,
            )
            .await
            .unwrap();

        let written = fs::read_to_string(temp.path().join("version.ts")).unwrap();
        assert_eq!(
            written,
            format!("version|hi|{}", temp.path().join("package.json").display())
        );
    }

    #[tokio::test]
    async fn test_execute_runs_in_root() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let executor = CommandExecutor::new("sh", temp.path());

        executor
            .execute("echo ok > relative.txt", &ctx, &BTreeMap::new(), None)
            .await
            .unwrap();

        assert!(temp.path().join("relative.txt").exists());
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit_fails_with_stderr() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let executor = CommandExecutor::new("sh", temp.path());

        let err = executor
            .execute(
                "echo 'esbuild: entry not found' >&2; exit 3",
                &ctx,
                &BTreeMap::new(),
                None,
            )
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("exited with 3"));
        assert!(message.contains("entry not found"));
    }

    #[tokio::test]
    async fn test_execute_with_timeout() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let executor = CommandExecutor::new("sh", temp.path());

        let err = executor
            .execute(
                "sleep 10",
                &ctx,
                &BTreeMap::new(),
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(stderr.as_bytes());

        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }
}
