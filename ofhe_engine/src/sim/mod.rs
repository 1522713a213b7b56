//! A pure-Rust engine that honours the handle-level contract of the native
//! engine.
//!
//! # Remarks
//! The reference engine keeps every object in a handle table and models what a
//! caller of the native engine can observe: which handles are valid, which calls
//! fail and with what message, how levels and keys gate operations, and the
//! decoded values within the documented tolerances. Ciphertexts carry their
//! slot values in the clear. **It provides no security whatsoever** and exists
//! for tests and for hosts without the native library.
//!
//! Both subsystems share one table, so handles flow between them exactly as
//! native pointers do (an LWE ciphertext produced by a CKKS to FHEW switch is
//! released through the binary-gate subsystem), while each keeps its own
//! last-error channel.
use std::sync::Arc;

use log::debug;

use crate::{Alloc, EngineResult, ErrorChannel};

mod binfhe;
mod objects;
mod pke;
mod safe_bincode;
mod serial;
mod switching;
mod store;

pub use store::Stats;

use objects::Object;
use store::{Store, Table};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
/// An engine-side failure, before it is recorded in a last-error channel.
pub(crate) struct SimError(String);

impl SimError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub(crate) fn invalid_handle(kind: &str) -> Self {
        Self(format!("{kind} handle is invalid or has been released"))
    }

    pub(crate) fn not_enabled(op: &str) -> Self {
        Self(format!("{op} operation has not been enabled"))
    }
}

impl From<bincode::Error> for SimError {
    fn from(value: bincode::Error) -> Self {
        Self(format!("binary deserialization failed: {value}"))
    }
}

impl From<serde_json::Error> for SimError {
    fn from(value: serde_json::Error) -> Self {
        Self(format!("JSON deserialization failed: {value}"))
    }
}

pub(crate) type SimResult<T> = std::result::Result<T, SimError>;

/// Runs `f` against the locked table and turns a failure into a status plus a
/// message in `errors`.
fn call<T>(
    store: &Store,
    errors: &ErrorChannel,
    op: &str,
    f: impl FnOnce(&mut Table) -> SimResult<T>,
) -> EngineResult<T> {
    let result = f(&mut store.lock());

    result.or_else(|e| {
        debug!("reference engine: {op} failed: {e}");
        errors.fail(e.0)
    })
}

/// Like [`call`], but stores the produced object and returns its handle.
fn alloc(
    store: &Store,
    errors: &ErrorChannel,
    op: &str,
    f: impl FnOnce(&mut Table) -> SimResult<Object>,
) -> Alloc {
    call(store, errors, op, |table| {
        let object = f(table)?;
        table.insert(object).map(Some)
    })
}

/// The lattice-scheme half of the reference engine.
pub struct SimPke {
    store: Arc<Store>,
    errors: ErrorChannel,
}

impl SimPke {
    fn call<T>(&self, op: &str, f: impl FnOnce(&mut Table) -> SimResult<T>) -> EngineResult<T> {
        call(&self.store, &self.errors, op, f)
    }

    fn alloc(&self, op: &str, f: impl FnOnce(&mut Table) -> SimResult<Object>) -> Alloc {
        alloc(&self.store, &self.errors, op, f)
    }
}

/// The binary-gate half of the reference engine.
pub struct SimBinFhe {
    store: Arc<Store>,
    errors: ErrorChannel,
}

impl SimBinFhe {
    fn call<T>(&self, op: &str, f: impl FnOnce(&mut Table) -> SimResult<T>) -> EngineResult<T> {
        call(&self.store, &self.errors, op, f)
    }

    fn alloc(&self, op: &str, f: impl FnOnce(&mut Table) -> SimResult<Object>) -> Alloc {
        alloc(&self.store, &self.errors, op, f)
    }
}

/// Both subsystems of one reference engine instance over a shared table.
pub struct SimBackend {
    store: Arc<Store>,
    pke: Arc<SimPke>,
    binfhe: Arc<SimBinFhe>,
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBackend {
    /// Creates an engine with an empty handle table.
    pub fn new() -> Self {
        let store = Arc::new(Store::new());

        Self {
            pke: Arc::new(SimPke {
                store: store.clone(),
                errors: ErrorChannel::new(),
            }),
            binfhe: Arc::new(SimBinFhe {
                store: store.clone(),
                errors: ErrorChannel::new(),
            }),
            store,
        }
    }

    /// The lattice-scheme subsystem.
    pub fn pke(&self) -> Arc<SimPke> {
        self.pke.clone()
    }

    /// The binary-gate subsystem.
    pub fn binfhe(&self) -> Arc<SimBinFhe> {
        self.binfhe.clone()
    }

    /// A snapshot of the handle counters.
    pub fn stats(&self) -> Stats {
        self.store.lock().stats
    }
}
