//! Subprocess runner used by the stage handlers.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{classify, exit_message, spawn_message, Outcome, ProcessInvoker, TIMEOUT_MESSAGE};
use crate::error::InvokerError;

/// Runs tools as child processes under an optional deadline.
///
/// Workers are plain threads, so the invoker owns a small runtime and
/// blocks the calling worker on it for the full invocation.
pub struct CommandInvoker {
    runtime: Runtime,
    timeout: Option<Duration>,
}

impl CommandInvoker {
    pub fn new(timeout: Option<Duration>) -> Result<Self, InvokerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("seen-invoker")
            .enable_all()
            .build()
            .map_err(InvokerError::Runtime)?;

        Ok(Self { runtime, timeout })
    }

    async fn run(&self, tool: &str, args: &[String]) -> Outcome {
        debug!("Running {} {}", tool, args.join(" "));
        let started = Instant::now();

        let mut child = match Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Error starting {}: {}", tool, e);
                return Outcome::failure(spawn_message(&e));
            }
        };

        // Lines are forwarded as they arrive so a drain cut short by the
        // deadline still yields whatever was written.
        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let stderr = child.stderr.take();
        let mut reader = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            }
        });

        let status = match self.wait_for_completion(&mut child).await {
            Some(status) => status,
            None => {
                reader.abort();
                return Outcome::failure(TIMEOUT_MESSAGE);
            }
        };

        // A grandchild may inherit stderr and keep it open after the tool
        // exits. The drain gets whatever is left of the deadline.
        match self.timeout {
            None => {
                let _ = (&mut reader).await;
            }
            Some(limit) => {
                let left = limit.saturating_sub(started.elapsed());
                if tokio::time::timeout(left, &mut reader).await.is_err() {
                    warn!("{} exited but its stderr stayed open, not waiting further", tool);
                    reader.abort();
                }
            }
        }

        let mut diagnostics = Vec::new();
        while let Ok(line) = line_rx.try_recv() {
            diagnostics.push(line);
        }
        if !diagnostics.is_empty() {
            debug!("{} stderr: {:?}", tool, diagnostics);
        }

        match status {
            Ok(status) => {
                let outcome = classify(status, &diagnostics);
                if !outcome.is_success() && diagnostics.is_empty() {
                    debug!("{} failed silently ({})", tool, exit_message(status));
                }
                outcome
            }
            Err(e) => Outcome::failure(e.to_string()),
        }
    }

    /// Waits for the child. Returns `None` when the deadline passed and
    /// the child was killed.
    async fn wait_for_completion(
        &self,
        child: &mut Child,
    ) -> Option<std::io::Result<std::process::ExitStatus>> {
        let Some(timeout) = self.timeout else {
            return Some(child.wait().await);
        };

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        match waited {
            Ok(result) => Some(result),
            Err(_) => {
                warn!(
                    "Process timed out after {:?}, killing (pid {:?})",
                    timeout,
                    child.id()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out process: {}", e);
                }
                None
            }
        }
    }
}

impl ProcessInvoker for CommandInvoker {
    fn invoke(&self, tool: &str, args: &[String]) -> Outcome {
        self.runtime.block_on(self.run(tool, args))
    }
}
