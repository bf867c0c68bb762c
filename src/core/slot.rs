/*!
 * Single-row handoff between the classifier and the writer
 */

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::region::ClassifiedRow;
use crate::error::{HeadcutError, Result};

#[derive(Debug)]
enum SlotState {
    Empty,
    Occupied(ClassifiedRow),
    Closed,
}

/// What the writer found in the slot
#[derive(Debug, PartialEq, Eq)]
pub enum SlotRead {
    Row(ClassifiedRow),
    Empty,
    Closed,
}

/// Holds at most one classified row.
///
/// The permit chain already serializes access; the mutex only makes the
/// handoff visible across threads and lets a broken chain surface as an
/// error instead of a silently overwritten row.
#[derive(Debug)]
pub struct SharedSlot {
    state: Mutex<SlotState>,
}

impl SharedSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a row; the previous one must have been taken
    pub fn put(&self, row: ClassifiedRow) -> Result<()> {
        let mut state = self.lock();
        match *state {
            SlotState::Empty => {
                *state = SlotState::Occupied(row);
                Ok(())
            }
            SlotState::Occupied(_) => Err(HeadcutError::SlotViolation(
                "row overwritten before the writer consumed it".to_string(),
            )),
            SlotState::Closed => Err(HeadcutError::SlotViolation(
                "row stored after the slot was closed".to_string(),
            )),
        }
    }

    /// Take the stored row, leaving the slot empty
    pub fn take(&self) -> SlotRead {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, SlotState::Empty) {
            SlotState::Occupied(row) => SlotRead::Row(row),
            SlotState::Empty => SlotRead::Empty,
            SlotState::Closed => {
                *state = SlotState::Closed;
                SlotRead::Closed
            }
        }
    }

    /// No more rows will be stored
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if let SlotState::Occupied(_) = *state {
            return Err(HeadcutError::SlotViolation(
                "slot closed while still holding a row".to_string(),
            ));
        }
        *state = SlotState::Closed;
        Ok(())
    }
}

impl Default for SharedSlot {
    fn default() -> Self {
        Self::new()
    }
}
