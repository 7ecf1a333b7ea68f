//! Spawning and supervising one backend process.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Weak};
use std::time::Duration;

use conduit_config::BackendConfig;
use conduit_core::BackendEvent;
use conduit_observability::BackendMetrics;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::spawn_reader;
use crate::error::{BackendError, Result};

/// How long the supervisor waits for stdout to drain after the child exits.
/// A grandchild holding the pipe open must not stall exit handling.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Callbacks from the per-process tasks back into the manager.
///
/// Every call carries the generation of the process it came from so late
/// output from a replaced process can be recognised and ignored.
pub(crate) trait ProcessObserver: Send + Sync + 'static {
    fn on_event(self: Arc<Self>, generation: u64, event: BackendEvent);
    fn on_write_error(self: Arc<Self>, generation: u64, error: std::io::Error);
    fn on_exit(self: Arc<Self>, generation: u64, status: std::io::Result<ExitStatus>);
}

/// Handle the manager keeps for the live process.
///
/// Dropping it closes stdin and asks the supervisor to kill the child.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    pub generation: u64,
    pub pid: Option<u32>,
    stdin: mpsc::UnboundedSender<String>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Queue one line for the child's stdin. Fails once the writer has stopped.
    pub fn write_line(&self, line: String) -> Result<()> {
        self.stdin
            .send(line)
            .map_err(|_| BackendError::Io("backend stdin is closed".to_string()))
    }

    pub fn kill(mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Start the backend described by `config` and wire its stdio tasks.
pub(crate) fn spawn_process(
    config: &BackendConfig,
    generation: u64,
    observer: Weak<dyn ProcessObserver>,
) -> Result<ProcessHandle> {
    let spawn_failure = |message: String| BackendError::SpawnFailure {
        program: config.program.clone(),
        message,
    };

    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &config.working_dir {
        let dir = conduit_config::expand_tilde(dir)
            .ok_or_else(|| spawn_failure(format!("invalid working directory: {}", dir)))?;
        command.current_dir(dir);
    }

    for (key, value) in &config.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| spawn_failure(e.to_string()))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| spawn_failure("failed to capture stdin".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_failure("failed to capture stdout".to_string()))?;
    let pid = child.id();

    info!(
        program = %config.program,
        pid = ?pid,
        generation,
        "Backend process spawned"
    );
    BackendMetrics::record_spawn();

    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
    spawn_writer(stdin, stdin_rx, generation, observer.clone());

    if let Some(stderr) = child.stderr.take() {
        spawn_stderr_logger(stderr, generation);
    }

    let reader = spawn_reader(stdout, config.max_line_bytes, generation, observer.clone());

    let (kill_tx, kill_rx) = oneshot::channel();
    spawn_supervisor(child, kill_rx, reader, generation, observer);

    Ok(ProcessHandle {
        generation,
        pid,
        stdin: stdin_tx,
        kill: Some(kill_tx),
    })
}

fn spawn_writer(
    mut stdin: ChildStdin,
    mut lines: mpsc::UnboundedReceiver<String>,
    generation: u64,
    observer: Weak<dyn ProcessObserver>,
) {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            let written = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await;

            if let Err(e) = written {
                warn!(generation, error = %e, "Failed to write to backend stdin");
                if let Some(observer) = observer.upgrade() {
                    observer.on_write_error(generation, e);
                }
                break;
            }
        }
        let _ = stdin.shutdown().await;
    });
}

fn spawn_stderr_logger(stderr: ChildStderr, generation: u64) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => warn!(target: "conduit_backend::stderr", generation, "{}", line),
                Ok(None) => break,
                Err(e) => {
                    debug!(generation, error = %e, "Backend stderr read failed");
                    break;
                }
            }
        }
    });
}

fn spawn_supervisor(
    mut child: Child,
    kill: oneshot::Receiver<()>,
    mut reader: JoinHandle<()>,
    generation: u64,
    observer: Weak<dyn ProcessObserver>,
) {
    tokio::spawn(async move {
        // A dropped sender means the manager let go of this process.
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill => {
                debug!(generation, "Killing backend process");
                if let Err(e) = child.start_kill() {
                    debug!(generation, error = %e, "Backend process already gone");
                }
                child.wait().await
            }
        };

        // Deliver any trailing output, such as a final result line, before the exit.
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader)
            .await
            .is_err()
        {
            warn!(generation, "Backend stdout still open after exit; abandoning reader");
            reader.abort();
        }

        match &status {
            Ok(status) => {
                info!(generation, code = ?status.code(), "Backend process exited");
                BackendMetrics::record_exit(status.code());
            }
            Err(e) => warn!(generation, error = %e, "Failed to wait for backend process"),
        }

        if let Some(observer) = observer.upgrade() {
            observer.on_exit(generation, status);
        }
    });
}
