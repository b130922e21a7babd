//! crates/engine/src/worker.rs
//!
//! Event-driven sync scheduler: one action in flight at a time, a timer
//! thread that only posts events, and a shutdown path that drains cleanly.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{error, info};

use crate::action::SyncAction;
use crate::executor::{ActionExecutor, ActionOutcome};
use crate::produce::SyncActionProducer;
use crate::session::Session;
use crate::SyncResult;

/// Events carried by the worker's queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SyncEvent {
    /// Start a new sync pass.
    ScheduledSync,
    /// Execute the next queued action.
    SyncAction,
    /// Stop the loop after the in-flight action finishes.
    Shutdown,
}

/// Posts a shutdown request into a running worker from another thread.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: Sender<SyncEvent>,
}

impl WorkerHandle {
    /// Requests a clean shutdown: the timer stops, queued work is dropped,
    /// and the loop exits once the current action completes.
    pub fn shutdown(&self) {
        let _ = self.sender.send(SyncEvent::Shutdown);
    }
}

/// The single-threaded sync loop.
///
/// On `ScheduledSync` the pending timer is cancelled, a pass is produced,
/// and action execution is kicked off; each `SyncAction` event executes one
/// action and re-posts itself until the batch drains, at which point the
/// timer is re-armed. Exactly one action is ever in flight.
pub struct SyncWorker {
    session: Session,
    sender: Sender<SyncEvent>,
    receiver: Receiver<SyncEvent>,
    timer: SyncTimer,
    actions: VecDeque<SyncAction>,
}

impl SyncWorker {
    /// Creates a worker around a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        let (sender, receiver) = unbounded();
        let timer = SyncTimer::new(session.sync_interval, sender.clone());
        Self {
            session,
            sender,
            receiver,
            timer,
            actions: VecDeque::new(),
        }
    }

    /// Handle for requesting shutdown from outside the loop.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            sender: self.sender.clone(),
        }
    }

    /// Runs sync passes until [`WorkerHandle::shutdown`] is called.
    ///
    /// Recoverable failures are logged and the loop carries on to the next
    /// pass; invariant violations terminate it with the error.
    pub fn run(&mut self) -> SyncResult<()> {
        let _ = self.sender.send(SyncEvent::ScheduledSync);

        loop {
            let Ok(event) = self.receiver.recv() else {
                break;
            };
            match event {
                SyncEvent::ScheduledSync => self.do_sync()?,
                SyncEvent::SyncAction => self.do_sync_action()?,
                SyncEvent::Shutdown => {
                    info!("shutdown requested; stopping sync worker");
                    self.timer.stop();
                    while self.receiver.try_recv().is_ok() {}
                    self.actions.clear();
                    break;
                }
            }
        }
        Ok(())
    }

    /// Produces one pass and executes every action sequentially, bypassing
    /// the event loop.
    pub fn run_once(&mut self) -> SyncResult<()> {
        info!("running sync");
        let actions = SyncActionProducer::new(&self.session).produce()?;
        for action in actions {
            self.execute(action)?;
        }
        Ok(())
    }

    fn do_sync(&mut self) -> SyncResult<()> {
        self.timer.stop();
        info!("running scheduled sync");
        match SyncActionProducer::new(&self.session).produce() {
            Ok(actions) => {
                self.actions = actions.into();
                let _ = self.sender.send(SyncEvent::SyncAction);
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                error!(error = %err, "sync pass failed; will retry on the next interval");
                self.timer.start();
            }
        }
        Ok(())
    }

    fn do_sync_action(&mut self) -> SyncResult<()> {
        if let Some(action) = self.actions.pop_front() {
            self.execute(action)?;
            let _ = self.sender.send(SyncEvent::SyncAction);
        } else {
            self.timer.start();
        }
        Ok(())
    }

    /// Executes one action under the worker's error policy: conflicts are
    /// reported, recoverable failures are logged, invariant violations
    /// propagate.
    fn execute(&self, action: SyncAction) -> SyncResult<()> {
        if action.is_nop() {
            return Ok(());
        }
        info!(action = %action, "executing sync action");
        let kind = action.kind();
        let key = action.file_key().map(ToOwned::to_owned);

        match ActionExecutor::new(&self.session).do_action(action) {
            Ok(ActionOutcome::Done) => Ok(()),
            Ok(ActionOutcome::Conflict(_report)) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                error!(
                    action = kind,
                    key = key.as_deref().unwrap_or("?"),
                    error = %err,
                    "sync action failed"
                );
                Ok(())
            }
        }
    }

    /// The session, for callers that own the worker and need the handles.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// One-shot interval timer. The thread exists only to post
/// `ScheduledSync`; cancelling just flips the flag the thread checks
/// before sending.
struct SyncTimer {
    interval: Duration,
    sender: Sender<SyncEvent>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl SyncTimer {
    fn new(interval: Duration, sender: Sender<SyncEvent>) -> Self {
        Self {
            interval,
            sender,
            cancelled: None,
        }
    }

    fn start(&mut self) {
        self.stop();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let sender = self.sender.clone();
        let interval = self.interval;
        thread::spawn(move || {
            thread::sleep(interval);
            if !flag.load(Ordering::SeqCst) {
                let _ = sender.send(SyncEvent::ScheduledSync);
            }
        });
        self.cancelled = Some(cancelled);
    }

    fn stop(&mut self) {
        if let Some(flag) = self.cancelled.take() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}
