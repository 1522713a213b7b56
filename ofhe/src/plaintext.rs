use num::Complex;
use ofhe_engine::RawHandle;

use crate::{
    Backend, Result,
    handle::{Owned, resource},
};

resource!(PlaintextRes, "Plaintext", |backend, handle| backend
    .pke()
    .engine()
    .plaintext_destroy(handle));

#[derive(Debug)]
/// An encoded (unencrypted) vector of slots.
///
/// # Remarks
/// Decryption yields a plaintext spanning every slot of the context. The
/// logical length set with [`Plaintext::set_length`] truncates what the
/// accessors return without touching the slots themselves.
pub struct Plaintext {
    inner: Owned<PlaintextRes>,
}

impl Plaintext {
    pub(crate) fn from_handle(backend: &Backend, handle: RawHandle) -> Self {
        Self {
            inner: Owned::new(backend, handle),
        }
    }

    /// The logical length.
    pub fn len(&self) -> Result<usize> {
        let pt = self.inner.handle()?;

        self.inner.backend().pke().call("GetLength", |e| e.plaintext_len(pt))
    }

    /// Whether the logical length is zero.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sets the logical length.
    pub fn set_length(&self, len: usize) -> Result<()> {
        let pt = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call("SetLength", |e| e.plaintext_set_length(pt, len))
    }

    /// Integer slots (BFV, BGV), centered around zero.
    pub fn packed_values(&self) -> Result<Vec<i64>> {
        let pt = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call("GetPackedValue", |e| e.plaintext_packed_values(pt))
    }

    /// Real parts of the CKKS slots.
    pub fn real_packed_values(&self) -> Result<Vec<f64>> {
        let pt = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call("GetRealPackedValue", |e| e.plaintext_real_values(pt))
    }

    /// CKKS slots.
    pub fn complex_packed_values(&self) -> Result<Vec<Complex<f64>>> {
        let pt = self.inner.handle()?;

        self.inner
            .backend()
            .pke()
            .call("GetCKKSPackedValue", |e| e.plaintext_complex_values(pt))
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the plaintext. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`Plaintext::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, test_utils::bgv_context};

    #[test]
    fn length_truncates_the_view() {
        let (_, cc) = bgv_context();
        let pt = cc.make_packed_plaintext(&[4, -5, 6]).unwrap();

        pt.set_length(2).unwrap();
        assert_eq!(pt.len().unwrap(), 2);
        assert_eq!(pt.packed_values().unwrap(), vec![4, -5]);
    }

    #[test]
    fn closed_plaintexts_reject_use() {
        let (_, cc) = bgv_context();
        let pt = cc.make_packed_plaintext(&[1, 2, 3]).unwrap();

        pt.close();
        pt.close();
        assert!(pt.is_closed());
        assert!(matches!(
            pt.packed_values(),
            Err(Error::Closed { kind: "Plaintext" })
        ));
        assert!(matches!(
            pt.set_length(1),
            Err(Error::Closed { kind: "Plaintext" })
        ));
    }
}
