use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::models::error::CaptureError;
use crate::traits::pipeline_delegate::ErrorCallback;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Serial callback context decoupled from both the realtime capture thread and
/// the encode worker.
///
/// Jobs run one at a time in posting order on the `aac-callbacks` thread.
/// Posting never blocks. Dropping the dispatcher runs every job already
/// posted, then joins the thread.
pub struct CallbackDispatcher {
    sender: Sender<Message>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CallbackDispatcher {
    pub fn spawn() -> Result<Self, CaptureError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("aac-callbacks".into())
            .spawn(move || run_jobs(receiver))
            .map_err(|e| {
                CaptureError::Allocation(format!("failed to spawn callback thread: {}", e))
            })?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            sender: self.sender.clone(),
        }
    }
}

impl Drop for CallbackDispatcher {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("callback thread panicked");
            }
        }
    }
}

fn run_jobs(receiver: Receiver<Message>) {
    for message in receiver.iter() {
        match message {
            Message::Run(job) => job(),
            Message::Shutdown => break,
        }
    }
    log::debug!("callback dispatcher stopped");
}

/// Cloneable posting end of a [`CallbackDispatcher`].
#[derive(Clone)]
pub struct DispatchHandle {
    sender: Sender<Message>,
}

impl DispatchHandle {
    /// Queue `job` for the callback thread. Returns `false` if the dispatcher
    /// has shut down.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Block until every job posted before this call has run.
    pub fn flush(&self) -> bool {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        if !self.post(move || {
            let _ = done_tx.send(());
        }) {
            return false;
        }
        done_rx.recv().is_ok()
    }
}

/// Routes failures to an [`ErrorCallback`] through the dispatcher.
///
/// Safe to call from the realtime thread: reporting only enqueues.
#[derive(Clone)]
pub struct ErrorReporter {
    callback: Option<ErrorCallback>,
    dispatch: DispatchHandle,
}

impl ErrorReporter {
    pub fn new(callback: Option<ErrorCallback>, dispatch: DispatchHandle) -> Self {
        Self { callback, dispatch }
    }

    pub fn report(&self, error: CaptureError) {
        let callback = self.callback.clone();
        self.dispatch.post(move || {
            log::error!("{}", error);
            if let Some(callback) = callback {
                callback(error);
            }
        });
    }

    pub fn dispatch(&self) -> &DispatchHandle {
        &self.dispatch
    }
}
