use crate::types::{Invocation, RawRun};
use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Launches the tool under test. Implementations must be shareable across
/// tasks: every invocation runs on its own tokio task.
pub trait Tool: Send + Sync + 'static {
    fn run(&self, invocation: Invocation) -> impl Future<Output = Result<RawRun>> + Send;
}

/// Runs the real tool as a child process, optionally through an
/// interpreter (`node dircompare.js ...`).
#[derive(Debug, Clone)]
pub struct ExternalTool {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
    pub timeout: Duration,
}

impl ExternalTool {
    /// `runtime` is looked up on PATH; `tool` is made absolute because each
    /// child gets the fixture root as its working directory.
    pub fn new(tool: &Path, runtime: Option<&str>, timeout: Duration) -> Result<Self> {
        let tool = std::path::absolute(tool)
            .with_context(|| format!("cannot resolve tool path {}", tool.display()))?;
        if !tool.exists() {
            return Err(anyhow!("tool {} does not exist", tool.display()));
        }
        match runtime {
            Some(runtime) => {
                let program = which::which(runtime)
                    .with_context(|| format!("runtime '{runtime}' not found in PATH"))?;
                Ok(Self {
                    program,
                    leading_args: vec![tool.to_string_lossy().into_owned()],
                    timeout,
                })
            }
            None => Ok(Self {
                program: tool,
                leading_args: Vec::new(),
                timeout,
            }),
        }
    }

    pub fn command_line(&self, invocation: &Invocation) -> String {
        let mut words = vec![self.program.to_string_lossy().into_owned()];
        words.extend(self.leading_args.iter().cloned());
        words.extend(invocation.args.iter().cloned());
        shell_words::join(words)
    }
}

impl Tool for ExternalTool {
    async fn run(&self, invocation: Invocation) -> Result<RawRun> {
        debug!(
            test = %invocation.case_name,
            variant = %invocation.variant,
            "running {}",
            self.command_line(&invocation)
        );
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.program.display()))?;

        let out = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(out) => out.context("failed to collect tool output")?,
            Err(_) => {
                return Err(anyhow!("tool timed out after {} s", self.timeout.as_secs()));
            }
        };

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(RawRun {
            output,
            exit_code: out.status.code(),
        })
    }
}
