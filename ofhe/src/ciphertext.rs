use ofhe_engine::RawHandle;

use crate::{
    Backend, Result,
    handle::{Owned, resource},
};

resource!(CiphertextRes, "Ciphertext", |backend, handle| backend
    .pke()
    .engine()
    .ciphertext_destroy(handle));

#[derive(Debug)]
/// An encrypted vector of slots under some [`KeyPair`](crate::KeyPair).
///
/// The same type serves every lattice scheme; the context a ciphertext is used
/// with must be the one (or a deserialized copy of the one) it was created in.
pub struct Ciphertext {
    inner: Owned<CiphertextRes>,
}

impl Ciphertext {
    pub(crate) fn from_handle(backend: &Backend, handle: RawHandle) -> Self {
        Self {
            inner: Owned::new(backend, handle),
        }
    }

    /// How many modulus primes the ciphertext has consumed.
    pub fn level(&self) -> Result<u32> {
        let ct = self.inner.handle()?;

        self.inner.backend().pke().call("GetLevel", |e| e.ciphertext_level(ct))
    }

    /// The backend this ciphertext lives in.
    pub fn backend(&self) -> &Backend {
        self.inner.backend()
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the ciphertext. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`Ciphertext::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
