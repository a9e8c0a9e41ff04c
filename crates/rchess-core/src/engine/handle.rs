//! Handle of an asynchronous search request

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::warn;

use super::SearchCoordinator;
use crate::error::SearchError;
use crate::search::SearchResult;

/// Result of a request running on the `rchess-search` thread.
///
/// Dropping the handle does not stop the search; call [`cancel`](Self::cancel)
/// first if the result is no longer wanted.
pub struct SearchHandle {
    rx: Receiver<SearchResult>,
    thread: Option<JoinHandle<()>>,
    coordinator: SearchCoordinator,
    /// This request's own cancel flag
    cancel: Arc<AtomicBool>,
    result: Option<SearchResult>,
}

impl SearchHandle {
    pub(crate) fn new(
        rx: Receiver<SearchResult>,
        thread: JoinHandle<()>,
        coordinator: SearchCoordinator,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rx,
            thread: Some(thread),
            coordinator,
            cancel,
            result: None,
        }
    }

    /// Block until the search finishes
    pub fn wait(mut self) -> Result<SearchResult, SearchError> {
        if let Some(result) = self.result.take() {
            self.join();
            return Ok(result);
        }
        let result = self.rx.recv().map_err(|_| SearchError::Disconnected);
        self.join();
        result
    }

    /// Block for at most `timeout`.
    ///
    /// On timeout the search keeps running and the handle stays usable; a
    /// caller enforcing a hard deadline cancels and then waits.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<SearchResult, SearchError> {
        if let Some(result) = self.result.take() {
            self.join();
            return Ok(result);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(result) => {
                self.join();
                Ok(result)
            }
            Err(RecvTimeoutError::Timeout) => Err(SearchError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SearchError::Disconnected),
        }
    }

    /// Result if the search has finished, without blocking
    pub fn try_result(&mut self) -> Option<SearchResult> {
        if self.result.is_none() {
            self.poll();
        }
        let result = self.result.take();
        if result.is_some() {
            self.join();
        }
        result
    }

    pub fn is_finished(&mut self) -> bool {
        self.poll();
        self.result.is_some()
    }

    /// Cancel the request this handle belongs to, whether it is running or
    /// still queued. Other requests keep going.
    pub fn cancel(&self) {
        self.coordinator.cancel_request(&self.cancel);
    }

    fn poll(&mut self) {
        match self.rx.try_recv() {
            Ok(result) => self.result = Some(result),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {}
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("search thread exited by panic");
            }
        }
    }
}
