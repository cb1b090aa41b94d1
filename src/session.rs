//! Read sessions: the worker that turns queued scans into deliveries to the host.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::{
    Result, ScanPayload, ScanResult, ScannerError, ScannerState, config::ScannerConfig,
    listener::ScanEventListener,
};

/// scanner state shared between the controller and its read worker
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<ScannerState>,
}

impl StateCell {
    pub(crate) fn new(state: ScannerState) -> Self {
        StateCell {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn get(&self) -> ScannerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set(&self, state: ScannerState) {
        let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *current != state {
            trace!("state {} -> {}", *current, state);
        }
        *current = state;
    }

    /// move `from` -> `to`, on mismatch the current state is returned and nothing changes
    pub(crate) fn transition(
        &self,
        from: ScannerState,
        to: ScannerState,
    ) -> std::result::Result<(), ScannerState> {
        let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *current != from {
            return Err(*current);
        }
        trace!("state {} -> {}", from, to);
        *current = to;
        Ok(())
    }
}

/// cancellation signal for a read worker
///
/// Waiting on the token wakes up as soon as it is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (cancelled, signal) = &*self.inner;
        *cancelled.lock().unwrap_or_else(|e| e.into_inner()) = true;
        signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// sleep for `timeout` or until cancelled, returns whether the token is cancelled
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (cancelled, signal) = &*self.inner;
        let guard = cancelled.lock().unwrap_or_else(|e| e.into_inner());
        if timeout.is_zero() {
            return *guard;
        }
        let (guard, _) = signal
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// scans delivered to the host for one `read` command
///
/// Yields one item per scan. The stream ends after `destroy`, or after a single
/// `Err` when the session fails. Scans are handed over, not buffered: the session
/// stays in READ until the host receives the scan.
pub struct ScanStream {
    deliveries: Receiver<Result<ScanPayload>>,
}

impl ScanStream {
    /// wait for the next delivery, `None` once the session has ended
    pub fn recv(&self) -> Option<Result<ScanPayload>> {
        self.deliveries.recv().ok()
    }

    /// like `recv` but gives up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Result<ScanPayload>> {
        self.deliveries.recv_timeout(timeout).ok()
    }
}

impl Iterator for ScanStream {
    type Item = Result<ScanPayload>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// handle of a running read worker
pub(crate) struct ReadSession {
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl ReadSession {
    /// attach a fresh channel to `listener` and start the worker draining it
    pub(crate) fn start(
        state: Arc<StateCell>,
        listener: &ScanEventListener,
        config: &ScannerConfig,
    ) -> Result<(ReadSession, ScanStream)> {
        let (scan_tx, scan_rx) = mpsc::channel::<ScanResult>();
        let (delivery_tx, delivery_rx) = mpsc::sync_channel::<Result<ScanPayload>>(0);
        let cancel = CancelToken::new();

        let worker = Reader {
            state,
            scans: scan_rx,
            deliveries: delivery_tx,
            cancel: cancel.clone(),
            poll_interval: config.poll_interval(),
            debounce: config.debounce(),
        };
        listener.attach(scan_tx);
        let handle = thread::Builder::new()
            .name(String::from("scan-reader"))
            .spawn(move || worker.run())
            .map_err(|err| {
                listener.detach();
                ScannerError::SuspendedOperation(format!("unable to start read worker: {}", err))
            })?;
        debug!("read session started");

        Ok((
            ReadSession {
                cancel,
                handle: Some(handle),
            },
            ScanStream {
                deliveries: delivery_rx,
            },
        ))
    }

    /// cancel the worker and wait for it to exit
    pub(crate) fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("read worker panicked");
            }
        }
        debug!("read session stopped");
    }
}

impl Drop for ReadSession {
    fn drop(&mut self) {
        // a session dropped without stop() must not leave its worker waiting forever
        self.cancel.cancel();
    }
}

struct Reader {
    state: Arc<StateCell>,
    scans: Receiver<ScanResult>,
    deliveries: SyncSender<Result<ScanPayload>>,
    cancel: CancelToken,
    poll_interval: Duration,
    debounce: Duration,
}

/// result of handing an item to the host
#[derive(Debug, PartialEq, Eq)]
enum Handover {
    Delivered,
    Cancelled,
    /// the host dropped the stream
    Closed,
}

impl Reader {
    fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.state.get() {
                ScannerState::Destroyed => break,
                ScannerState::Error => {
                    self.hand_over(Err(ScannerError::SuspendedOperation(String::from(
                        "Not Read",
                    ))));
                    break;
                }
                _ => {}
            }
            let result = match self.scans.recv_timeout(self.poll_interval) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    if !self.cancel.is_cancelled() {
                        self.fail("scan listener disconnected");
                    }
                    break;
                }
            };
            if let Err(state) = self
                .state
                .transition(ScannerState::Reading, ScannerState::Read)
            {
                debug!("scan discarded in state {}", state);
                continue;
            }
            if let Some(captured_at) = result.captured_at() {
                trace!("scan captured at {}", captured_at);
            }
            match self.hand_over(Ok(result.payload())) {
                Handover::Delivered => debug!("delivered {}", result),
                Handover::Cancelled => break,
                Handover::Closed => {
                    warn!("read stream dropped by host, ending read session");
                    let _ = self
                        .state
                        .transition(ScannerState::Read, ScannerState::Error);
                    break;
                }
            }
            if self
                .state
                .transition(ScannerState::Read, ScannerState::Reading)
                .is_err()
            {
                continue;
            }
            if self.cancel.wait_timeout(self.debounce) {
                break;
            }
        }
        trace!("read worker exiting");
    }

    /// block until the host takes `item`, checking for cancellation every poll interval
    fn hand_over(&self, mut item: Result<ScanPayload>) -> Handover {
        loop {
            match self.deliveries.try_send(item) {
                Ok(()) => return Handover::Delivered,
                Err(TrySendError::Full(pending)) => {
                    item = pending;
                    if self.cancel.wait_timeout(self.poll_interval) {
                        return Handover::Cancelled;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return Handover::Closed,
            }
        }
    }

    fn fail(&self, reason: &str) {
        if self
            .state
            .transition(ScannerState::Reading, ScannerState::Error)
            .is_ok()
        {
            error!("read session failed: {}", reason);
            self.hand_over(Err(ScannerError::SuspendedOperation(reason.to_owned())));
        }
    }
}
