//! Single-consumer classify-and-dispatch worker.

use super::{EventListener, GameEvent, classify};
use crate::error::PipelineError;
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Handle returned by [`LogEventPipeline::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An open capture window.
#[derive(Debug)]
#[must_use = "a capture window is read with end_capture"]
pub struct CaptureTicket {
    generation: u64,
    deadline: Instant,
}

impl CaptureTicket {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

struct Submitted {
    seq: u64,
    line: String,
    at: Instant,
}

tokio::task_local! {
    static ON_WORKER: ();
}

/// Resolves once `shutdown` reads true or its sender is gone.
pub async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

#[derive(Default)]
struct CaptureState {
    generation: u64,
    /// Open window as (start, deadline).
    window: Option<(Instant, Instant)>,
    lines: Vec<String>,
}

/// Turns console lines into [`GameEvent`]s and delivers them to listeners.
///
/// Lines are classified and delivered by one worker task in submission
/// order. Every listener sees every event, in registration order.
pub struct LogEventPipeline {
    tx: mpsc::UnboundedSender<Submitted>,
    /// Last sequence number handed out; the lock keeps queue order and
    /// sequence order identical.
    submitted: Mutex<u64>,
    /// Highest sequence number the worker has finished with.
    processed: watch::Sender<u64>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Submitted>>>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn EventListener>)>>,
    next_listener: AtomicU64,
    capture: Mutex<CaptureState>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LogEventPipeline {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let (processed, _) = watch::channel(0);
        Arc::new(Self {
            tx,
            submitted: Mutex::new(0),
            processed,
            rx: Mutex::new(Some(rx)),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            capture: Mutex::new(CaptureState::default()),
            shutdown,
            worker: Mutex::new(None),
        })
    }

    /// Enqueue one raw console line.
    pub fn submit(&self, line: impl Into<String>) {
        let mut seq = self.submitted.lock();
        *seq += 1;
        let submitted = Submitted {
            seq: *seq,
            line: line.into(),
            at: Instant::now(),
        };
        if self.tx.send(submitted).is_err() {
            debug!("Pipeline worker gone, dropping console line");
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Receiver that turns true once [`stop`](Self::stop) is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Spawn the classify-and-dispatch worker.
    pub fn start(self: &Arc<Self>) -> Result<(), PipelineError> {
        let rx = self.rx.lock().take().ok_or(PipelineError::AlreadyStarted)?;
        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(ON_WORKER.scope((), async move { pipeline.run(rx).await }));
        *self.worker.lock() = Some(handle);
        info!("Log event pipeline started");
        Ok(())
    }

    /// Stop the worker after it has handled every line already queued.
    ///
    /// Also wakes every task waiting in [`end_capture`](Self::end_capture).
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "Pipeline worker ended abnormally");
        }
        info!("Log event pipeline stopped");
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Submitted>) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Some(submitted) => self.process(submitted).await,
                    None => break,
                },
                _ = stopped(&mut shutdown) => {
                    while let Ok(submitted) = rx.try_recv() {
                        self.process(submitted).await;
                    }
                    break;
                }
            }
        }
        // Nothing more will be processed; release every catch-up waiter.
        self.processed.send_replace(u64::MAX);
        debug!("Pipeline worker exiting");
    }

    async fn process(&self, submitted: Submitted) {
        let seq = submitted.seq;
        self.deliver(submitted).await;
        self.processed.send_replace(seq);
    }

    async fn deliver(&self, submitted: Submitted) {
        let Some(event) = classify(&submitted.line) else {
            return;
        };
        crate::metrics::record_game_event(event.kind());

        if let GameEvent::RawLog { text } = &event {
            let mut capture = self.capture.lock();
            let inside = capture
                .window
                .is_some_and(|(start, deadline)| start <= submitted.at && submitted.at <= deadline);
            if inside {
                capture.lines.push(text.clone());
            }
        }

        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            let delivery = AssertUnwindSafe(listener.on_event(&event)).catch_unwind();
            if let Err(panic) = delivery.await {
                let info = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!(kind = event.kind(), panic = %info, "Event listener panicked");
            }
        }
    }

    /// Open a capture window of length `window`.
    ///
    /// Only one window is open at a time; a newer window supersedes an
    /// older one, whose ticket then reads back nothing.
    pub fn begin_capture(&self, window: Duration) -> CaptureTicket {
        let start = Instant::now();
        let deadline = start + window;
        let mut capture = self.capture.lock();
        if capture.window.is_some() {
            warn!("Capture window superseded by a newer one");
        }
        capture.generation += 1;
        capture.window = Some((start, deadline));
        capture.lines.clear();
        CaptureTicket {
            generation: capture.generation,
            deadline,
        }
    }

    /// Wait for the window to elapse (or shutdown) and return its log lines
    /// in submission order.
    ///
    /// Every line submitted before the window elapsed is classified before
    /// the window closes, however long the listeners ahead of it take.
    pub async fn end_capture(&self, ticket: CaptureTicket) -> Vec<String> {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            _ = tokio::time::sleep_until(ticket.deadline) => {}
            _ = stopped(&mut shutdown) => {}
        }
        self.catch_up().await;

        let mut capture = self.capture.lock();
        if capture.generation != ticket.generation {
            return Vec::new();
        }
        capture.window = None;
        std::mem::take(&mut capture.lines)
    }

    /// Wait until the worker has handled every line submitted so far.
    ///
    /// Returns at once on the worker itself, and before the worker starts.
    async fn catch_up(&self) {
        if ON_WORKER.try_with(|_| ()).is_ok() {
            debug!("Capture ended from the pipeline worker, not waiting for it");
            return;
        }
        if self.rx.lock().is_some() {
            return;
        }
        let target = *self.submitted.lock();
        let mut processed = self.processed.subscribe();
        let _ = processed.wait_for(|done| *done >= target).await;
    }

    pub async fn capture(&self, window: Duration) -> Vec<String> {
        let ticket = self.begin_capture(window);
        self.end_capture(ticket).await
    }

    /// Feed newline-delimited lines from `reader` into the pipeline until EOF
    /// or shutdown. With `echo`, each line is also written to stdout.
    pub fn spawn_reader<R>(self: &Arc<Self>, reader: R, echo: bool) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pipeline = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).split(b'\n');
            let mut stdout = tokio::io::stdout();
            loop {
                let next = tokio::select! {
                    next = lines.next_segment() => next,
                    _ = stopped(&mut shutdown) => break,
                };
                match next {
                    Ok(Some(bytes)) => {
                        let mut line = String::from_utf8_lossy(&bytes).into_owned();
                        if line.ends_with('\r') {
                            line.pop();
                        }
                        if echo && let Err(e) = echo_line(&mut stdout, &line).await {
                            warn!(error = %e, "Console echo failed");
                        }
                        pipeline.submit(line);
                    }
                    Ok(None) => {
                        info!("Console output closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Console read failed");
                        break;
                    }
                }
            }
        })
    }
}

async fn echo_line(out: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await
}

impl std::fmt::Debug for LogEventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEventPipeline")
            .field("listeners", &self.listener_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
