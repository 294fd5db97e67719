//! Background compaction worker.
//!
//! A single supervised thread with an explicit lifecycle: the write path
//! signals it after winning the compaction slot, the thread runs one pass
//! and releases the slot, and `stop` joins it on shutdown. A periodic
//! self-check also claims the slot if the store sits above the high-water
//! mark without a signal having arrived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::store::StoreCore;

use super::{CompactionStats, Compactor};

/// Interval between unsolicited high-water-mark checks.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Background compaction scheduler and executor.
pub(crate) struct CompactionWorker {
    /// Shared store state.
    core: Arc<StoreCore>,
    /// Work-available flag, owned by the condvar below.
    work: Mutex<bool>,
    /// Signals the background thread.
    cond: Condvar,
    /// Whether the background thread should shut down.
    shutdown: AtomicBool,
    /// Background thread handle.
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    /// Statistics from the most recent pass.
    last_stats: RwLock<Option<CompactionStats>>,
}

impl CompactionWorker {
    /// Create a worker for a store. Call `start` to spawn the thread.
    pub(crate) fn new(core: Arc<StoreCore>) -> Arc<Self> {
        Arc::new(Self {
            core,
            work: Mutex::new(false),
            cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            thread_handle: Mutex::new(None),
            last_stats: RwLock::new(None),
        })
    }

    /// Start the background thread.
    pub(crate) fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("valuelog-compaction".to_string())
            .spawn(move || {
                this.background_loop();
            })
            .expect("Failed to spawn compaction thread");

        *self.thread_handle.lock() = Some(handle);
    }

    /// Wake the background thread to run a pass.
    ///
    /// The caller must already hold the compaction slot (a successful
    /// `begin_compaction`); the worker releases it when the pass ends.
    pub(crate) fn signal(&self) {
        let mut work = self.work.lock();
        *work = true;
        self.cond.notify_one();
    }

    /// Stop the background thread and wait for it to finish.
    pub(crate) fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        {
            let _work = self.work.lock();
            self.cond.notify_all();
        }

        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Statistics from the most recent completed pass.
    pub(crate) fn last_stats(&self) -> Option<CompactionStats> {
        *self.last_stats.read()
    }

    /// Background loop: wait for work, run a pass, release the slot.
    fn background_loop(&self) {
        loop {
            let should_run = {
                let mut work = self.work.lock();

                while !*work && !self.shutdown.load(Ordering::SeqCst) {
                    self.cond.wait_for(&mut work, IDLE_CHECK_INTERVAL);

                    // A put may have crossed the high-water mark without
                    // winning the slot while a previous pass was finishing.
                    if !*work
                        && self.core.size() > self.core.options.high_water_mark()
                        && self.core.begin_compaction()
                    {
                        *work = true;
                    }
                }

                std::mem::take(&mut *work)
            };

            if self.shutdown.load(Ordering::SeqCst) {
                // Release the slot if a signal arrived after shutdown began.
                if should_run {
                    self.core.end_compaction();
                }
                break;
            }

            if should_run {
                let stats = Compactor::new(Arc::clone(&self.core)).run_pass();
                self.core.end_compaction();
                *self.last_stats.write() = Some(stats);
            }
        }
    }
}

impl Drop for CompactionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
