#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! The handle-level contract between the `ofhe` binding and an OpenFHE engine.
//!
//! An engine exposes two subsystems, [`PkeEngine`] for the lattice schemes (BFV,
//! BGV and CKKS) and [`BinFheEngine`] for binary gates (FHEW). Every entry point
//! takes [`RawHandle`]s, returns a [`Status`]-derived [`EngineResult`] and, on
//! failure, leaves a description in the subsystem's [`ErrorChannel`].
//!
//! Two engines implement the contract:
//! * `sim` (default feature): a pure-Rust reference engine that models the
//!   observable behaviour of the native one without any cryptography.
//! * `native`: an adapter over the `ofhe_bridge` C library, which links OpenFHE.
mod engine;
mod handle;
mod last_error;
mod status;
mod types;

#[cfg(feature = "native")]
/// The adapter over the native OpenFHE bridge.
pub mod native;

#[cfg(feature = "sim")]
pub mod sim;

pub use engine::*;
pub use handle::*;
pub use last_error::*;
pub use num::Complex;
pub use status::*;
pub use types::*;
