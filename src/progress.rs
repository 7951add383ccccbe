// rma6: Seekable, self-indexing archive format for reads and alignments.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Progress reporting and cancellation for long running operations.
//!
//! Listeners are polled between records, never while a record is being
//! written or read.
//!

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

pub trait ProgressListener {
    fn set_maximum(&mut self, _maximum: u64) {}

    fn set_progress(&mut self, _progress: u64) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl ProgressListener for Silent {}

/// Cancels a [CancelFlag] from another thread or from code that does not
/// own the listener.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancels once [cancel](CancelHandle::cancel) has been called on one of
/// its handles or `cancel_after` progress updates have been received.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: CancelHandle,
    cancel_after: Option<u64>,
    updates: u64,
    pub maximum: u64,
    pub progress: u64,
}

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn after_updates(
        n: u64,
    ) -> Self {
        CancelFlag{ cancel_after: Some(n), ..Default::default() }
    }

    /// A handle that cancels this flag, usable while the flag is borrowed
    /// by a running operation.
    pub fn handle(&self) -> CancelHandle {
        self.cancelled.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.cancel();
    }
}

impl ProgressListener for CancelFlag {
    fn set_maximum(&mut self, maximum: u64) {
        self.maximum = maximum;
    }

    fn set_progress(&mut self, progress: u64) {
        self.progress = progress;
        self.updates += 1;
        if self.cancel_after.is_some_and(|n| self.updates >= n) {
            self.cancelled.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }
}

#[cfg(test)]
mod tests {

    #[test]
    fn cancel_after_updates() {
        use super::{CancelFlag, ProgressListener};

        let mut flag = CancelFlag::after_updates(2);
        flag.set_progress(1);
        assert!(!flag.is_cancelled());
        flag.set_progress(2);
        assert!(flag.is_cancelled());
        assert_eq!(flag.progress, 2);
    }

    #[test]
    fn cancel_explicitly() {
        use super::{CancelFlag, ProgressListener, Silent};

        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        assert!(!Silent.is_cancelled());
    }

    #[test]
    fn cancel_from_another_thread() {
        use super::{CancelFlag, ProgressListener};

        let flag = CancelFlag::new();
        let handle = flag.handle();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(flag.is_cancelled());
    }
}
