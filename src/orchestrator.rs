//! Owner of the single render worker and the pending event queue.
//!
//! The [`Orchestrator`] takes ownership of a [`PixelSink`] and moves it onto a
//! dedicated worker thread. Callers submit work and poll or wait for the
//! worker to go idle; the only state shared with a running loop is the
//! cancellation token and the run status.

use core::time::Duration;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use heapless::Deque;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clock::CancelToken;
use crate::command::RunCommand;
use crate::compositor::{Compositor, RunReport};
use crate::config::RailConfig;
use crate::event::Event;
use crate::sink::{PixelSink, SinkError};
use crate::time::{SystemTimeSource, TimeSource};
use crate::types::{ConfigError, EventError};

/// Maximum number of events waiting in the queue.
pub const QUEUE_CAPACITY: usize = 50;

/// Lifecycle of the render worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunnerState {
    /// No run active or pending.
    Idle,
    /// A run is active or pending.
    Running,
    /// Cancellation requested; the loop will exit within one frame.
    Stopping,
}

/// Errors reported synchronously by the orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// An event failed validation.
    #[error(transparent)]
    Event(#[from] EventError),

    /// The submission does not fit the rail configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The rail could not be initialized.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The pending queue is at capacity.
    #[error("event queue is full ({QUEUE_CAPACITY} events)")]
    QueueFull,

    /// No queued event at this position.
    #[error("no queued event at index {index} (queue holds {len})")]
    QueueIndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Current queue length.
        len: usize,
    },

    /// The render worker has exited.
    #[error("render worker is no longer running")]
    WorkerGone,
}

enum Job {
    Run(Compositor, CancelToken),
    Drain(CancelToken),
    Shutdown,
}

#[derive(Debug)]
struct Status {
    state: RunnerState,
    pending: usize,
    last_report: Option<RunReport>,
    /// Token handed to every job dispatched since the last cancel.
    epoch: CancelToken,
}

#[derive(Debug)]
struct Shared {
    status: Mutex<Status>,
    idle: Condvar,
}

impl Shared {
    fn begin_job(&self) -> CancelToken {
        let mut status = self.status.lock();
        status.pending += 1;
        status.state = RunnerState::Running;
        status.epoch.clone()
    }

    fn finish_job(&self, report: Option<RunReport>) {
        let mut status = self.status.lock();
        status.pending = status.pending.saturating_sub(1);
        if report.is_some() {
            status.last_report = report;
        }
        if status.pending == 0 {
            status.state = RunnerState::Idle;
            self.idle.notify_all();
        }
    }

    /// Stops every job dispatched so far. Later jobs get a fresh token.
    fn request_cancel(&self) -> bool {
        let mut status = self.status.lock();
        if status.pending == 0 {
            return false;
        }
        status.state = RunnerState::Stopping;
        status.epoch.cancel();
        status.epoch = CancelToken::new();
        true
    }
}

type EventQueue = Arc<Mutex<Deque<Event, QUEUE_CAPACITY>>>;

/// Runs paced events on a rail, one render loop at a time.
///
/// Submissions are validated synchronously; nothing is drawn for a rejected
/// submission. Overlapping submissions are not refused: they queue behind the
/// active run, so callers that want exclusive runs should check
/// [`is_busy`](Self::is_busy) first.
pub struct Orchestrator {
    config: RailConfig,
    queue: EventQueue,
    shared: Arc<Shared>,
    jobs: Sender<Job>,
    worker: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("queued", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Initializes `sink` and starts the render worker on wall-clock time.
    ///
    /// # Errors
    /// * `Config` - the configuration is invalid
    /// * `Sink` - the rail could not be initialized
    pub fn new<S>(sink: S, config: RailConfig) -> Result<Self, OrchestratorError>
    where
        S: PixelSink + Send + 'static,
    {
        Self::with_time_source(sink, config, SystemTimeSource::new())
    }

    /// Like [`new`](Self::new) but with a custom time source.
    pub fn with_time_source<S, T>(
        mut sink: S,
        config: RailConfig,
        time: T,
    ) -> Result<Self, OrchestratorError>
    where
        S: PixelSink + Send + 'static,
        T: TimeSource + Send + 'static,
    {
        config.validate()?;
        sink.begin()?;
        if sink.pixel_count() != config.led_count() {
            return Err(ConfigError::SinkSizeMismatch {
                configured: config.led_count(),
                sink: sink.pixel_count(),
            }
            .into());
        }

        let queue: EventQueue = Arc::new(Mutex::new(Deque::new()));
        let shared = Arc::new(Shared {
            status: Mutex::new(Status {
                state: RunnerState::Idle,
                pending: 0,
                last_report: None,
                epoch: CancelToken::new(),
            }),
            idle: Condvar::new(),
        });
        let (jobs, inbox) = crossbeam_channel::unbounded();

        let worker = Worker {
            sink,
            time,
            interval: config.frame_interval(),
            queue: Arc::clone(&queue),
            shared: Arc::clone(&shared),
        };
        let handle = thread::Builder::new()
            .name(String::from("pace-render"))
            .spawn(move || worker.run(inbox))
            .map_err(|e| SinkError::Init(e.to_string()))?;

        info!(leds = config.led_count(), fps = config.max_fps(), "pace rail ready");

        Ok(Self {
            config,
            queue,
            shared,
            jobs,
            worker: Some(handle),
        })
    }

    /// Rail configuration in use.
    pub fn config(&self) -> &RailConfig {
        &self.config
    }

    /// Dispatches a [`RunCommand`].
    pub fn handle(&self, command: RunCommand) -> Result<(), OrchestratorError> {
        match command {
            RunCommand::Enqueue(event) => self.enqueue(event),
            RunCommand::Single(event) => self.submit(event),
            RunCommand::Parallel(first, second) => self.submit_parallel(first, second),
            RunCommand::RunQueue => self.run_queue().map(|_| ()),
            RunCommand::Cancel => {
                self.cancel();
                Ok(())
            }
        }
    }

    /// Starts a single-event run.
    pub fn submit(&self, event: Event) -> Result<(), OrchestratorError> {
        let compositor = Compositor::single(event);
        compositor.check_rail(self.config.led_count())?;
        info!(event = %compositor.events()[0], "submitting single run");
        self.dispatch(|cancel| Job::Run(compositor, cancel))
    }

    /// Starts a parallel run of two events on the shared rail.
    ///
    /// # Errors
    /// * `Config` - the events differ in rail size or lap length, or do not
    ///   match the configured rail
    pub fn submit_parallel(&self, first: Event, second: Event) -> Result<(), OrchestratorError> {
        let compositor = Compositor::parallel([first, second])?;
        compositor.check_rail(self.config.led_count())?;
        info!(
            first = %compositor.events()[0],
            second = %compositor.events()[1],
            "submitting parallel run"
        );
        self.dispatch(|cancel| Job::Run(compositor, cancel))
    }

    /// Appends an event to the pending queue.
    pub fn enqueue(&self, event: Event) -> Result<(), OrchestratorError> {
        Compositor::single(event.clone()).check_rail(self.config.led_count())?;
        self.queue
            .lock()
            .push_back(event)
            .map_err(|_| OrchestratorError::QueueFull)
    }

    /// Snapshot of the pending queue, oldest first.
    pub fn queued(&self) -> Vec<Event> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Removes and returns the queued event at `index`.
    pub fn remove_queued(&self, index: usize) -> Result<Event, OrchestratorError> {
        let mut queue = self.queue.lock();
        let len = queue.len();
        if index >= len {
            return Err(OrchestratorError::QueueIndexOutOfRange { index, len });
        }

        let mut kept = Deque::new();
        let mut removed = None;
        for (position, event) in core::iter::from_fn(|| queue.pop_front()).enumerate() {
            if position == index {
                removed = Some(event);
            } else {
                // Same capacity as the source queue
                let _ = kept.push_back(event);
            }
        }
        *queue = kept;
        removed.ok_or(OrchestratorError::QueueIndexOutOfRange { index, len })
    }

    /// Drops every queued event.
    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    /// Runs the queued events in order as single-event runs.
    ///
    /// Returns how many events were queued at the time of the call. Cancelling
    /// stops the active event and abandons the rest of the drain; unrun events
    /// stay in the queue.
    pub fn run_queue(&self) -> Result<usize, OrchestratorError> {
        let count = self.queue.lock().len();
        self.dispatch(Job::Drain)?;
        Ok(count)
    }

    /// Requests the active run and any pending work to stop. No-op when idle.
    ///
    /// Work submitted after this call is not affected.
    pub fn cancel(&self) {
        if self.shared.request_cancel() {
            warn!("run cancelled by caller");
        }
    }

    /// Current worker state.
    pub fn state(&self) -> RunnerState {
        self.shared.status.lock().state
    }

    /// True while a run is active or pending.
    pub fn is_busy(&self) -> bool {
        self.state() != RunnerState::Idle
    }

    /// Blocks until the worker is idle or `timeout` elapses.
    ///
    /// Returns true if the worker is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        while status.pending > 0 {
            if self.shared.idle.wait_until(&mut status, deadline).timed_out() {
                break;
            }
        }
        status.pending == 0
    }

    /// Report of the most recently finished run.
    pub fn last_report(&self) -> Option<RunReport> {
        self.shared.status.lock().last_report.clone()
    }

    fn dispatch(&self, job: impl FnOnce(CancelToken) -> Job) -> Result<(), OrchestratorError> {
        let cancel = self.shared.begin_job();
        self.jobs.send(job(cancel)).map_err(|_| {
            self.shared.finish_job(None);
            OrchestratorError::WorkerGone
        })
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shared.request_cancel();
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("render worker panicked during shutdown");
            }
        }
    }
}

struct Worker<S, T> {
    sink: S,
    time: T,
    interval: Duration,
    queue: EventQueue,
    shared: Arc<Shared>,
}

impl<S: PixelSink, T: TimeSource> Worker<S, T> {
    fn run(mut self, inbox: Receiver<Job>) {
        while let Ok(job) = inbox.recv() {
            match job {
                Job::Shutdown => break,
                Job::Run(compositor, cancel) => {
                    let report = self.execute(&compositor, &cancel);
                    self.shared.finish_job(report);
                }
                Job::Drain(cancel) => {
                    let mut report = None;
                    while !cancel.is_cancelled() {
                        let next = self.queue.lock().pop_front();
                        let Some(event) = next else {
                            break;
                        };
                        report = self.execute(&Compositor::single(event), &cancel).or(report);
                    }
                    self.shared.finish_job(report);
                }
            }
        }
    }

    fn execute(&mut self, compositor: &Compositor, cancel: &CancelToken) -> Option<RunReport> {
        let Self {
            sink,
            time,
            interval,
            ..
        } = self;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            compositor.run(sink, &*time, *interval, cancel)
        }));
        match result {
            Ok(Ok(report)) => Some(report),
            Ok(Err(err)) => {
                error!(error = %err, "run rejected by render loop");
                None
            }
            Err(_) => {
                error!("render loop panicked; rail cleared");
                None
            }
        }
    }
}
