use std::{
    cell::RefCell,
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{EngineResult, Fault};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SLOTS: RefCell<HashMap<u64, String>> = RefCell::new(HashMap::new());
}

#[derive(Debug)]
/// A last-error channel: one message slot per thread, emptied on read.
///
/// # Remarks
/// Each engine subsystem owns its own channel, so a failure in the binary-gate
/// subsystem can never be read back through the lattice subsystem (or the other
/// way around). Slots are thread-local: a failing call on one thread cannot
/// overwrite or consume the message of a failing call on another. Reading
/// ([`ErrorChannel::take`]) clears the slot, so a message is observed at most
/// once and never attributed to a later, unrelated call.
pub struct ErrorChannel {
    id: u64,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorChannel {
    /// Creates a channel with its own slots.
    pub fn new() -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Stores `message` in the calling thread's slot, replacing any unread one.
    pub fn set(&self, message: impl Into<String>) {
        let message = message.into();

        SLOTS.with(|slots| {
            slots.borrow_mut().insert(self.id, message);
        });
    }

    /// Removes and returns the calling thread's message.
    pub fn take(&self) -> Option<String> {
        SLOTS.with(|slots| slots.borrow_mut().remove(&self.id))
    }

    /// Records `message` and returns the generic failure status.
    pub fn fail<T>(&self, message: impl Into<String>) -> EngineResult<T> {
        self.set(message);

        Err(Fault::ERR)
    }
}

impl Drop for ErrorChannel {
    fn drop(&mut self) {
        // Slots on other threads are left to die with their threads.
        let _ = SLOTS.try_with(|slots| slots.borrow_mut().remove(&self.id));
    }
}
