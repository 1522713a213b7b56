//! Hoisted rotations: decompose a ciphertext once, then rotate it by many
//! indices at a fraction of the cost of [`CryptoContext::eval_rotate`].
use std::marker::PhantomData;

use ofhe_engine::RawHandle;

use crate::{
    Ciphertext, CryptoContext, Result, Scheme,
    handle::{Owned, resource},
};

resource!(PrecomputeRes, "FastRotationPrecompute", |backend, handle| backend
    .pke()
    .engine()
    .fast_rotation_precompute_destroy(handle));

#[derive(Debug)]
/// The decomposition of one ciphertext, reusable for any number of
/// [`CryptoContext::fast_rotation`]s of that same ciphertext.
pub struct RotationPrecompute<'ct> {
    inner: Owned<PrecomputeRes>,
    _source: PhantomData<&'ct Ciphertext>,
}

impl RotationPrecompute<'_> {
    /// Releases the precomputation. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`RotationPrecompute::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<S: Scheme> CryptoContext<S> {
    /// Decomposes `ciphertext` for fast rotations.
    pub fn fast_rotation_precompute<'ct>(
        &self,
        ciphertext: &'ct Ciphertext,
    ) -> Result<RotationPrecompute<'ct>> {
        let (cc, ct) = (self.handle()?, ciphertext.handle()?);
        let handle = self.pke().alloc("EvalFastRotationPrecompute", |e| {
            e.fast_rotation_precompute(cc, ct)
        })?;

        Ok(RotationPrecompute {
            inner: Owned::new(self.backend(), handle),
            _source: PhantomData,
        })
    }

    /// Rotates `ciphertext` by `index` using `precompute`, which must have been
    /// computed from the same ciphertext. `m` is the cyclotomic order, see
    /// [`CryptoContext::cyclotomic_order`]. Needs the same rotation keys as
    /// [`CryptoContext::eval_rotate`].
    pub fn fast_rotation(
        &self,
        ciphertext: &Ciphertext,
        index: i32,
        m: u32,
        precompute: &RotationPrecompute<'_>,
    ) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;
        let pre: RawHandle = precompute.inner.handle()?;

        self.ciphertext("EvalFastRotation", |e, cc| {
            e.fast_rotation(cc, ct, index, m, pre)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        test_utils::{CKKS_SLOTS, approx_eq, bgv_context, bgv_keys, ckks_context, ckks_keys},
    };

    #[test]
    fn matches_plain_rotation() {
        let (_, cc) = ckks_context();
        let keys = ckks_keys();
        cc.eval_rotate_keygen(&keys, &[1, 2, -1]).unwrap();

        let values = (0..CKKS_SLOTS).map(f64::from).collect::<Vec<_>>();
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
            .unwrap();
        let m = cc.cyclotomic_order().unwrap();
        let pre = cc.fast_rotation_precompute(&ct).unwrap();

        for index in [1, 2, -1] {
            let fast = cc.fast_rotation(&ct, index, m, &pre).unwrap();
            let plain = cc.eval_rotate(&ct, index).unwrap();

            let fast = cc.decrypt(&keys, &fast).unwrap().real_packed_values().unwrap();
            let plain = cc.decrypt(&keys, &plain).unwrap().real_packed_values().unwrap();

            assert!(approx_eq(&fast, &plain, 1e-6));
        }
    }

    #[test]
    fn precompute_is_tied_to_its_ciphertext() {
        let (_, cc) = bgv_context();
        let keys = bgv_keys();
        cc.eval_rotate_keygen(&keys, &[1]).unwrap();

        let a = cc
            .encrypt(&keys, &cc.make_packed_plaintext(&[1, 2, 3]).unwrap())
            .unwrap();
        let b = cc
            .encrypt(&keys, &cc.make_packed_plaintext(&[4, 5, 6]).unwrap())
            .unwrap();
        let m = cc.cyclotomic_order().unwrap();
        let pre = cc.fast_rotation_precompute(&a).unwrap();

        let rotated = cc.fast_rotation(&a, 1, m, &pre).unwrap();
        let pt = cc.decrypt(&keys, &rotated).unwrap();
        pt.set_length(2).unwrap();
        assert_eq!(pt.packed_values().unwrap(), vec![2, 3]);

        let err = cc.fast_rotation(&b, 1, m, &pre).unwrap_err();
        assert!(err.to_string().contains("different ciphertext"), "{err}");

        let err = cc.fast_rotation(&a, 1, m / 2, &pre).unwrap_err();
        assert!(err.to_string().contains("cyclotomic order"), "{err}");

        let err = cc.fast_rotation(&a, 3, m, &pre).unwrap_err();
        assert!(err.to_string().contains("EvalRotateKeyGen"), "{err}");

        pre.close();
        pre.close();
        assert!(pre.is_closed());
        assert!(matches!(
            cc.fast_rotation(&a, 1, m, &pre),
            Err(Error::Closed {
                kind: "FastRotationPrecompute"
            })
        ));
    }
}
