/*!
 * Cancellation controller: the single answer to "should the pipeline stop"
 *
 * Two shutdown paths exist:
 *
 * - Drain: end of input or a first interrupt. Only `terminated` is set. The
 *   reader notices it at its next loop head, closes the transport and
 *   passes the token on; the close then travels the permit chain like any
 *   other row, so every stage finishes what it already holds.
 * - Abort: a fatal error or a panicking stage. The first failure is kept,
 *   `aborted` is set and every permit is released so that blocked stages
 *   wake up, see the flag and unwind.
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::semaphore::PermitChain;
use crate::error::HeadcutError;

/// Why the pipeline stopped accepting new rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    Interrupted,
    Failed,
}

/// What the caller should do after delivering an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Shutdown requested; stages will drain and exit
    Graceful,
    /// Shutdown was already under way, exit the process now
    Escalate,
}

pub struct CancellationController {
    permits: Arc<PermitChain>,
    terminated: AtomicBool,
    aborted: AtomicBool,
    interrupts: AtomicUsize,
    reason: Mutex<Option<StopReason>>,
    failure: Mutex<Option<HeadcutError>>,
}

impl CancellationController {
    pub fn new(permits: Arc<PermitChain>) -> Self {
        Self {
            permits,
            terminated: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            interrupts: AtomicUsize::new(0),
            reason: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// First recorded reason wins
    pub fn reason(&self) -> Option<StopReason> {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn terminate(&self, reason: StopReason) {
        let mut current = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_none() {
            *current = Some(reason);
        }
        self.terminated.store(true, Ordering::Release);
    }

    /// Reader reached the end of its source
    pub fn finish(&self) {
        debug!("end of input, draining pipeline");
        self.terminate(StopReason::EndOfInput);
    }

    /// External interrupt. Only the first one is graceful.
    pub fn interrupt(&self) -> InterruptAction {
        let previous = self.interrupts.fetch_add(1, Ordering::AcqRel);
        if previous > 0 {
            warn!("second interrupt received, forcing exit");
            return InterruptAction::Escalate;
        }

        warn!("interrupt received, finishing in-flight rows");
        self.terminate(StopReason::Interrupted);
        InterruptAction::Graceful
    }

    /// Fatal stage error: keep the first one and wake every stage
    pub fn abort(&self, error: HeadcutError) {
        {
            let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if failure.is_none() {
                *failure = Some(error);
            } else {
                debug!(error = %error, "suppressing follow-on failure");
            }
        }

        self.terminate(StopReason::Failed);
        if !self.aborted.swap(true, Ordering::AcqRel) {
            self.permits.release_all();
        }
    }

    /// Remove and return the recorded failure
    pub fn take_failure(&self) -> Option<HeadcutError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
