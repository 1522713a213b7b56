use std::sync::Arc;

use ofhe_engine::{BinFheEngine, PkeEngine};

use crate::bridge::{BinFheBridge, Bridge, PkeBridge};

#[derive(Clone)]
/// The engine every object in this crate is created by and released through.
///
/// # Remarks
/// Objects remember the backend they came from. Mixing objects from two
/// different backends in one call is rejected by the engine (the handles are
/// unknown to it) for the reference engine, and is undefined for the native
/// one.
///
/// A backend is cheap to clone; clones share the underlying engine.
pub struct Backend {
    pke: PkeBridge,
    binfhe: BinFheBridge,
}

impl Backend {
    /// Wraps a pair of engine subsystems.
    pub fn new(pke: Arc<dyn PkeEngine>, binfhe: Arc<dyn BinFheEngine>) -> Self {
        Self {
            pke: Bridge::new(pke),
            binfhe: Bridge::new(binfhe),
        }
    }

    #[cfg(feature = "sim")]
    /// A fresh reference engine with an empty handle table.
    pub fn simulated() -> Self {
        Self::from_sim(&ofhe_engine::sim::SimBackend::new())
    }

    #[cfg(feature = "sim")]
    /// Binds to an existing reference engine, e.g. to inspect its
    /// [`Stats`](ofhe_engine::sim::Stats) afterwards.
    pub fn from_sim(sim: &ofhe_engine::sim::SimBackend) -> Self {
        Self::new(sim.pke(), sim.binfhe())
    }

    #[cfg(feature = "native")]
    /// The native OpenFHE engine.
    pub fn native() -> Self {
        let native = ofhe_engine::native::NativeBackend::new();

        Self::new(native.pke(), native.binfhe())
    }

    /// The native integer width the engine was built with (64 or 128).
    pub fn native_int_width(&self) -> u32 {
        self.pke.engine().native_int_width()
    }

    pub(crate) fn pke(&self) -> &PkeBridge {
        &self.pke
    }

    pub(crate) fn binfhe(&self) -> &BinFheBridge {
        &self.binfhe
    }
}

#[cfg(feature = "native")]
impl Default for Backend {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(all(feature = "sim", not(feature = "native")))]
impl Default for Backend {
    fn default() -> Self {
        Self::simulated()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("native_int_width", &self.native_int_width())
            .finish_non_exhaustive()
    }
}
