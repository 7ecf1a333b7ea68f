//! The persistent backend session.
//!
//! One long-lived child process serves every request, one at a time. A
//! request occupies the pending slot from the moment its prompt is written
//! until its `result` line arrives or the process goes away; everything
//! submitted meanwhile waits in a FIFO queue. The session lock is a plain
//! `parking_lot::Mutex` and is never held across an `.await`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use conduit_config::BackendConfig;
use conduit_core::{BackendEvent, UserEnvelope};
use conduit_observability::BackendMetrics;
use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{BackendError, Result};
use crate::process::{spawn_process, ProcessHandle, ProcessObserver};

/// What a request's caller receives, in order: any number of events, then
/// exactly one `Done` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(BackendEvent),
    Done { exit_code: i32 },
    Failed(BackendError),
}

impl Delivery {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Delivery::Event(_))
    }
}

/// Caller side of one request.
///
/// The stream ends after the terminal delivery. It can also end without one
/// if the manager is shut down while the request is queued or running.
#[derive(Debug)]
pub struct RequestHandle {
    id: u64,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Wait for the request to finish and return every event it produced.
    pub async fn completion(mut self) -> Result<Completed> {
        let mut events = Vec::new();
        while let Some(delivery) = self.rx.recv().await {
            match delivery {
                Delivery::Event(event) => events.push(event),
                Delivery::Done { exit_code } => return Ok(Completed { events, exit_code }),
                Delivery::Failed(err) => return Err(err),
            }
        }
        Err(BackendError::ShutDown)
    }
}

impl Stream for RequestHandle {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Delivery>> {
        self.rx.poll_recv(cx)
    }
}

/// Events of a successfully completed request
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub events: Vec<BackendEvent>,
    pub exit_code: i32,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerStatus {
    pub alive: bool,
    pub executing: bool,
    pub request_count: u64,
    pub queue_length: usize,
    pub last_activity: Option<DateTime<Utc>>,
    pub pid: Option<u32>,
    pub spawn_count: u64,
}

struct QueuedRequest {
    id: u64,
    prompt: String,
    tx: mpsc::UnboundedSender<Delivery>,
    enqueued_at: Instant,
}

impl QueuedRequest {
    fn fail(self, error: BackendError) {
        warn!(request_id = self.id, error = %error, "Backend request failed before execution");
        BackendMetrics::record_duration("failed", self.enqueued_at.elapsed().as_secs_f64());
        let _ = self.tx.send(Delivery::Failed(error));
    }
}

struct ActiveRequest {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
    enqueued_at: Instant,
    last_event_at: Instant,
}

impl ActiveRequest {
    fn forward(&mut self, event: BackendEvent) {
        self.last_event_at = Instant::now();
        if self.tx.send(Delivery::Event(event)).is_err() {
            trace!(request_id = self.id, "Caller went away; still draining backend output");
        }
    }

    fn finish(self, delivery: Delivery) {
        let outcome = match &delivery {
            Delivery::Failed(err) => {
                warn!(request_id = self.id, error = %err, "Backend request failed");
                "failed"
            }
            _ => {
                debug!(request_id = self.id, "Backend request completed");
                "ok"
            }
        };
        BackendMetrics::record_duration(outcome, self.enqueued_at.elapsed().as_secs_f64());
        let _ = self.tx.send(delivery);
    }
}

#[derive(Default)]
struct Session {
    process: Option<ProcessHandle>,
    pending: Option<ActiveRequest>,
    queue: VecDeque<QueuedRequest>,
    next_generation: u64,
    next_request_id: u64,
    request_count: u64,
    spawn_count: u64,
    last_activity: Option<DateTime<Utc>>,
    shut_down: bool,
}

impl Session {
    fn is_current(&self, generation: u64) -> bool {
        self.process.as_ref().map(|p| p.generation) == Some(generation)
    }
}

struct Inner {
    config: BackendConfig,
    state: Mutex<Session>,
}

/// Owner of the backend session. Cheap to clone; clones share the session.
///
/// Must be used from within a tokio runtime: spawning the backend and its
/// I/O tasks happens inside [`ProcessManager::send_message`].
#[derive(Clone)]
pub struct ProcessManager {
    inner: Arc<Inner>,
}

impl ProcessManager {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// Submit a prompt.
    ///
    /// With the slot free the request starts executing before this returns;
    /// otherwise it joins the tail of the queue.
    pub fn send_message(&self, prompt: impl Into<String>) -> RequestHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.state.lock();

        let id = state.next_request_id;
        state.next_request_id += 1;
        let handle = RequestHandle { id, rx };

        let request = QueuedRequest {
            id,
            prompt: prompt.into(),
            tx,
            enqueued_at: Instant::now(),
        };

        if state.shut_down {
            request.fail(BackendError::ShutDown);
            return handle;
        }

        if state.pending.is_some() {
            debug!(
                request_id = id,
                position = state.queue.len() + 1,
                "Backend busy; request queued"
            );
        }
        state.queue.push_back(request);
        self.inner.advance(&mut state);

        handle
    }

    /// Spawn the backend now if it is not running.
    pub fn ensure_process(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.shut_down {
            return Err(BackendError::ShutDown);
        }
        self.inner.ensure_process(&mut state)
    }

    /// Kill the backend and stop accepting requests.
    ///
    /// Queued and in-flight requests are dropped: their handles end without a
    /// terminal delivery.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;

        let dropped = state.queue.len() + usize::from(state.pending.is_some());
        state.queue.clear();
        state.pending = None;
        if let Some(process) = state.process.take() {
            process.kill();
        }
        BackendMetrics::set_queue_length(0);

        info!(dropped_requests = dropped, "Process manager shut down");
    }

    pub fn status(&self) -> ManagerStatus {
        let state = self.inner.state.lock();
        ManagerStatus {
            alive: state.process.is_some(),
            executing: state.pending.is_some(),
            request_count: state.request_count,
            queue_length: state.queue.len(),
            last_activity: state.last_activity,
            pid: state.process.as_ref().and_then(|p| p.pid),
            spawn_count: state.spawn_count,
        }
    }
}

impl Inner {
    fn ensure_process(self: &Arc<Self>, state: &mut Session) -> Result<()> {
        if state.process.is_some() {
            return Ok(());
        }

        if self.config.require_credential && self.config.credential_source().is_none() {
            return Err(BackendError::AuthenticationMissing {
                searched: self.config.credential_env.clone(),
            });
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let weak: Weak<Self> = Arc::downgrade(self);
        let observer: Weak<dyn ProcessObserver> = weak;
        let process = spawn_process(&self.config, generation, observer)?;

        state.spawn_count += 1;
        state.process = Some(process);
        Ok(())
    }

    /// Start queued requests until one occupies the slot or the queue is empty.
    fn advance(self: &Arc<Self>, state: &mut Session) {
        while state.pending.is_none() {
            let Some(request) = state.queue.pop_front() else {
                break;
            };
            self.execute(state, request);
        }
        BackendMetrics::set_queue_length(state.queue.len());
    }

    fn execute(self: &Arc<Self>, state: &mut Session, request: QueuedRequest) {
        if let Err(err) = self.ensure_process(state) {
            request.fail(err);
            return;
        }

        let line = match UserEnvelope::new(&request.prompt).to_line() {
            Ok(line) => line,
            Err(e) => {
                request.fail(BackendError::Io(e.to_string()));
                return;
            }
        };

        let Some(process) = state.process.as_ref() else {
            request.fail(BackendError::Io("backend process is not running".to_string()));
            return;
        };
        let generation = process.generation;
        if let Err(err) = process.write_line(line) {
            request.fail(err);
            return;
        }

        state.request_count += 1;
        state.last_activity = Some(Utc::now());

        info!(
            request_id = request.id,
            generation,
            waited_ms = request.enqueued_at.elapsed().as_millis() as u64,
            "Executing backend request"
        );

        let id = request.id;
        state.pending = Some(ActiveRequest {
            id,
            tx: request.tx,
            enqueued_at: request.enqueued_at,
            last_event_at: Instant::now(),
        });
        self.start_watchdog(id);
    }

    fn start_watchdog(self: &Arc<Self>, request_id: u64) {
        let Some(seconds) = self.config.request_timeout_secs else {
            return;
        };
        let timeout = Duration::from_secs(seconds);
        let inner = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut wait = timeout;
            loop {
                tokio::time::sleep(wait).await;
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                match inner.check_idle(request_id, timeout) {
                    Some(remaining) => wait = remaining,
                    None => return,
                }
            }
        });
    }

    /// Time left before `request_id` times out, or `None` once the watchdog
    /// has nothing more to do.
    fn check_idle(self: &Arc<Self>, request_id: u64, timeout: Duration) -> Option<Duration> {
        let mut state = self.state.lock();
        let idle = match state.pending.as_ref() {
            Some(active) if active.id == request_id => active.last_event_at.elapsed(),
            _ => return None,
        };
        if idle < timeout {
            return Some(timeout - idle);
        }

        if let Some(active) = state.pending.take() {
            active.finish(Delivery::Failed(BackendError::Timeout {
                seconds: timeout.as_secs(),
            }));
        }
        // The hung process may still answer later; replace it.
        if let Some(process) = state.process.take() {
            warn!(generation = process.generation, "Killing unresponsive backend process");
            process.kill();
        }
        self.advance(&mut state);
        None
    }
}

impl ProcessObserver for Inner {
    fn on_event(self: Arc<Self>, generation: u64, event: BackendEvent) {
        let mut state = self.state.lock();
        if !state.is_current(generation) {
            trace!(generation, "Ignoring output from a replaced backend process");
            return;
        }
        state.last_activity = Some(Utc::now());

        let Some(active) = state.pending.as_mut() else {
            debug!(kind = event.kind(), "Backend event with no active request");
            return;
        };

        if let BackendEvent::Result(result) = &event {
            if let Some(usage) = result.usage {
                BackendMetrics::record_tokens(usage.input_tokens, usage.output_tokens);
            }
        }

        let terminal = event.is_terminal();
        active.forward(event);

        // The next request goes to the same process right away. If that process
        // exits after its result, the request fails with it; the one after respawns.
        if terminal {
            if let Some(active) = state.pending.take() {
                active.finish(Delivery::Done { exit_code: 0 });
            }
            self.advance(&mut state);
        }
    }

    fn on_write_error(self: Arc<Self>, generation: u64, error: std::io::Error) {
        let mut state = self.state.lock();
        if !state.is_current(generation) {
            return;
        }

        if let Some(active) = state.pending.take() {
            active.finish(Delivery::Failed(error.into()));
        }
        if let Some(process) = state.process.take() {
            process.kill();
        }
        self.advance(&mut state);
    }

    fn on_exit(self: Arc<Self>, generation: u64, status: std::io::Result<ExitStatus>) {
        let mut state = self.state.lock();
        if !state.is_current(generation) {
            debug!(generation, "Replaced backend process exited");
            return;
        }
        state.process = None;

        if let Some(active) = state.pending.take() {
            let delivery = match status {
                Ok(status) if status.success() => Delivery::Done { exit_code: 0 },
                Ok(status) => Delivery::Failed(BackendError::ExitFailure {
                    code: status.code(),
                }),
                Err(e) => Delivery::Failed(e.into()),
            };
            active.finish(delivery);
        }

        self.advance(&mut state);
    }
}
