use ofhe_engine::{BinFheMethod, BinFheParamSet, BinGate, RawHandle};

use crate::{
    Backend, LwePrivateKey, Result,
    bridge::BinFheBridge,
    handle::{Borrowed, Owned, resource},
};

resource!(BinContextRes, "BinFHEContext", |backend, handle| backend
    .binfhe()
    .engine()
    .context_destroy(handle));

resource!(BinSecretKeyRes, "BinFHESecretKey", |backend, handle| backend
    .binfhe()
    .engine()
    .secret_key_destroy(handle));

resource!(LweCiphertextRes, "LWECiphertext", |backend, handle| backend
    .binfhe()
    .engine()
    .ciphertext_destroy(handle));

#[derive(Debug)]
/// A binary-gate (FHEW) context this binding allocated and owns.
///
/// # Remarks
/// A fresh context has no parameters; call [`BinFheContext::generate`] before
/// anything else. Gate evaluation additionally needs bootstrapping keys from
/// [`BinFheContext::bt_keygen`].
///
/// # Example
/// ```rust
/// use ofhe::{Backend, BinFheContext, BinFheMethod, BinFheParamSet, BinGate};
///
/// let backend = Backend::simulated();
/// let cc = BinFheContext::new(&backend).unwrap();
/// cc.generate(BinFheParamSet::Toy, BinFheMethod::Ginx).unwrap();
///
/// let sk = cc.keygen().unwrap();
/// cc.bt_keygen(&sk).unwrap();
///
/// let a = cc.encrypt(&sk, true).unwrap();
/// let b = cc.encrypt(&sk, false).unwrap();
/// let c = cc.eval_bin_gate(BinGate::Xor, &a, &b).unwrap();
///
/// assert!(cc.decrypt(&sk, &c).unwrap());
/// ```
pub struct BinFheContext {
    inner: Owned<BinContextRes>,
}

impl BinFheContext {
    /// Allocates an empty context.
    pub fn new(backend: &Backend) -> Result<Self> {
        let handle = backend
            .binfhe()
            .alloc("BinFHEContext", |e| e.context_new())?;

        Ok(Self {
            inner: Owned::new(backend, handle),
        })
    }

    /// Instantiates a parameter set with a bootstrapping method. Discards any
    /// bootstrapping keys generated before.
    pub fn generate(&self, param_set: BinFheParamSet, method: BinFheMethod) -> Result<()> {
        let cc = self.handle()?;

        self.bridge()
            .call("GenerateBinFHEContext", |e| e.generate(cc, param_set, method))
    }

    /// A borrowed view, for APIs that accept either kind of context.
    pub fn view(&self) -> Result<BinFheContextRef<'_>> {
        Ok(BinFheContextRef::new(self.backend(), self.handle()?))
    }

    /// The backend this context lives in.
    pub fn backend(&self) -> &Backend {
        self.inner.backend()
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the context. Idempotent. Takes `&mut self` so no
    /// [`BinFheContextRef`] from [`BinFheContext::view`] survives it.
    ///
    /// ```compile_fail
    /// use ofhe::{Backend, BinFheContext, BinFheMethod, BinFheParamSet};
    ///
    /// let backend = Backend::simulated();
    /// let mut cc = BinFheContext::new(&backend).unwrap();
    /// cc.generate(BinFheParamSet::Toy, BinFheMethod::Ginx).unwrap();
    ///
    /// let view = cc.view().unwrap();
    /// cc.close();
    /// view.n().unwrap();
    /// ```
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Whether [`BinFheContext::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[derive(Debug, Clone, Copy)]
/// The binary-gate context a CKKS context creates for scheme switching,
/// borrowed from that context.
///
/// Supports every operation [`BinFheContext`] does except
/// [`BinFheContext::generate`] and [`BinFheContext::close`]: its lifetime
/// belongs to the CKKS context.
pub struct BinFheContextRef<'cc> {
    inner: Borrowed<'cc>,
}

impl<'cc> BinFheContextRef<'cc> {
    pub(crate) fn new(backend: &'cc Backend, handle: RawHandle) -> Self {
        Self {
            inner: Borrowed::new("BinFHEContext", backend, handle),
        }
    }

    /// The backend this context lives in.
    pub fn backend(&self) -> &'cc Backend {
        self.inner.backend()
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        Ok(self.inner.handle())
    }
}

/// Operations shared by owned and borrowed binary-gate contexts.
macro_rules! impl_binfhe_ops {
    ($ty:ty) => {
        impl $ty {
            fn bridge(&self) -> &BinFheBridge {
                self.backend().binfhe()
            }

            fn lwe_ciphertext(
                &self,
                op: &'static str,
                f: impl FnOnce(&dyn ofhe_engine::BinFheEngine, RawHandle) -> ofhe_engine::Alloc,
            ) -> Result<LweCiphertext> {
                let cc = self.handle()?;
                let handle = self.bridge().alloc(op, |e| f(e, cc))?;

                Ok(LweCiphertext::from_handle(self.backend(), handle))
            }

            /// Generates a secret key.
            pub fn keygen(&self) -> Result<BinFheSecretKey> {
                let cc = self.handle()?;
                let handle = self.bridge().alloc("KeyGen", |e| e.keygen(cc))?;

                Ok(BinFheSecretKey {
                    inner: Owned::new(self.backend(), handle),
                })
            }

            /// Generates the bootstrapping keys gates and [`Self::bootstrap`]
            /// need.
            pub fn bt_keygen(&self, sk: &BinFheSecretKey) -> Result<()> {
                let (cc, sk) = (self.handle()?, sk.handle()?);

                self.bridge().call("BTKeyGen", |e| e.bt_keygen(cc, sk))
            }

            /// Encrypts one bit.
            pub fn encrypt(&self, sk: &BinFheSecretKey, bit: bool) -> Result<LweCiphertext> {
                let sk = sk.handle()?;

                self.lwe_ciphertext("Encrypt", |e, cc| e.encrypt(cc, sk, bit))
            }

            /// Evaluates a two-input gate, bootstrapping the result.
            pub fn eval_bin_gate(
                &self,
                gate: BinGate,
                a: &LweCiphertext,
                b: &LweCiphertext,
            ) -> Result<LweCiphertext> {
                let (a, b) = (a.handle()?, b.handle()?);

                self.lwe_ciphertext("EvalBinGate", |e, cc| e.eval_bin_gate(cc, gate, a, b))
            }

            /// Negation. Needs no bootstrapping key.
            pub fn eval_not(&self, ct: &LweCiphertext) -> Result<LweCiphertext> {
                let ct = ct.handle()?;

                self.lwe_ciphertext("EvalNOT", |e, cc| e.eval_not(cc, ct))
            }

            /// Refreshes a ciphertext's noise.
            pub fn bootstrap(&self, ct: &LweCiphertext) -> Result<LweCiphertext> {
                let ct = ct.handle()?;

                self.lwe_ciphertext("Bootstrap", |e, cc| e.bootstrap(cc, ct))
            }

            /// Decrypts a bit.
            pub fn decrypt(&self, sk: &BinFheSecretKey, ct: &LweCiphertext) -> Result<bool> {
                let (cc, sk, ct) = (self.handle()?, sk.handle()?, ct.handle()?);

                self.bridge().call("Decrypt", |e| e.decrypt(cc, sk, ct))
            }

            /// Decrypts a message modulo `p`.
            pub fn decrypt_modulus(
                &self,
                sk: &BinFheSecretKey,
                ct: &LweCiphertext,
                p: u64,
            ) -> Result<u64> {
                let (cc, sk, ct) = (self.handle()?, sk.handle()?, ct.handle()?);

                self.bridge()
                    .call("Decrypt", |e| e.decrypt_modulus(cc, sk, ct, p))
            }

            /// Decrypts a message modulo `p` with the LWE key a scheme-switching
            /// setup produced.
            pub fn decrypt_lwe(
                &self,
                key: &LwePrivateKey,
                ct: &LweCiphertext,
                p: u64,
            ) -> Result<u64> {
                let (cc, key, ct) = (self.handle()?, key.handle()?, ct.handle()?);

                self.bridge()
                    .call("Decrypt", |e| e.decrypt_modulus_lwe_key(cc, key, ct, p))
            }

            /// The largest plaintext modulus the parameters support.
            pub fn max_plaintext_space(&self) -> Result<u32> {
                let cc = self.handle()?;

                self.bridge()
                    .call("GetMaxPlaintextSpace", |e| e.max_plaintext_space(cc))
            }

            /// The LWE dimension.
            pub fn n(&self) -> Result<u32> {
                let cc = self.handle()?;

                self.bridge().call("Getn", |e| e.lwe_dimension(cc))
            }

            /// The LWE ciphertext modulus.
            pub fn q(&self) -> Result<u64> {
                let cc = self.handle()?;

                self.bridge().call("Getq", |e| e.lwe_modulus(cc))
            }

            /// The bootstrapping error bound.
            pub fn beta(&self) -> Result<u32> {
                let cc = self.handle()?;

                self.bridge().call("GetBeta", |e| e.beta(cc))
            }

            /// An encryption of the sign bit of a large-precision ciphertext.
            pub fn eval_sign(&self, ct: &LweCiphertext) -> Result<LweCiphertext> {
                let ct = ct.handle()?;

                self.lwe_ciphertext("EvalSign", |e, cc| e.eval_sign(cc, ct))
            }

            /// Clears the low `bits` bits of the encrypted message.
            pub fn eval_floor(&self, ct: &LweCiphertext, bits: u32) -> Result<LweCiphertext> {
                let ct = ct.handle()?;

                self.lwe_ciphertext("EvalFloor", |e, cc| e.eval_floor(cc, ct, bits))
            }
        }
    };
}

impl_binfhe_ops!(BinFheContext);
impl_binfhe_ops!(BinFheContextRef<'_>);

#[derive(Debug)]
/// A binary-gate secret key.
pub struct BinFheSecretKey {
    inner: Owned<BinSecretKeyRes>,
}

impl BinFheSecretKey {
    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the key. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`BinFheSecretKey::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[derive(Debug)]
/// An LWE ciphertext: one encrypted bit, or a small integer after scheme
/// switching.
pub struct LweCiphertext {
    inner: Owned<LweCiphertextRes>,
}

impl LweCiphertext {
    pub(crate) fn from_handle(backend: &Backend, handle: RawHandle) -> Self {
        Self {
            inner: Owned::new(backend, handle),
        }
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the ciphertext. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`LweCiphertext::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::sim::SimBackend;

    use super::*;
    use crate::Error;

    fn toy(backend: &Backend) -> (BinFheContext, BinFheSecretKey) {
        let cc = BinFheContext::new(backend).unwrap();
        cc.generate(BinFheParamSet::Toy, BinFheMethod::Ginx).unwrap();
        let sk = cc.keygen().unwrap();
        cc.bt_keygen(&sk).unwrap();

        (cc, sk)
    }

    #[test]
    fn two_input_gates() {
        let backend = Backend::simulated();
        let (cc, sk) = toy(&backend);

        for a in [false, true] {
            for b in [false, true] {
                let ca = cc.encrypt(&sk, a).unwrap();
                let cb = cc.encrypt(&sk, b).unwrap();

                for gate in [BinGate::And, BinGate::Nor, BinGate::Xnor, BinGate::XorFast] {
                    let out = cc.eval_bin_gate(gate, &ca, &cb).unwrap();

                    assert_eq!(cc.decrypt(&sk, &out).unwrap(), gate.eval(a, b).unwrap());
                }

                let refreshed = cc.bootstrap(&cc.eval_not(&ca).unwrap()).unwrap();
                assert_eq!(cc.decrypt(&sk, &refreshed).unwrap(), !a);
            }
        }
    }

    #[test]
    fn toy_parameters() {
        let backend = Backend::simulated();
        let (cc, _) = toy(&backend);

        assert_eq!(cc.n().unwrap(), 32);
        assert_eq!(cc.q().unwrap(), 1024);
        assert_eq!(cc.beta().unwrap(), 128);
        assert_eq!(cc.max_plaintext_space().unwrap(), 4);
    }

    #[test]
    fn errors_come_from_the_binfhe_channel() {
        let backend = Backend::simulated();
        let cc = BinFheContext::new(&backend).unwrap();
        cc.generate(BinFheParamSet::Toy, BinFheMethod::Ginx).unwrap();
        let sk = cc.keygen().unwrap();
        let ct = cc.encrypt(&sk, true).unwrap();

        let err = cc.eval_bin_gate(BinGate::And, &ct, &ct).unwrap_err();

        assert!(matches!(
            err,
            Error::Native {
                subsystem: crate::Subsystem::BinFhe,
                ..
            }
        ));
        assert!(err.to_string().contains("BTKeyGen"), "{err}");
    }

    #[test]
    fn closed_objects_reject_use() {
        let backend = Backend::simulated();
        let (mut cc, sk) = toy(&backend);
        let ct = cc.encrypt(&sk, true).unwrap();

        ct.close();
        ct.close();
        assert!(ct.is_closed());
        assert!(matches!(
            cc.eval_not(&ct),
            Err(Error::Closed {
                kind: "LWECiphertext"
            })
        ));

        sk.close();
        sk.close();
        assert!(sk.is_closed());
        assert!(matches!(
            cc.encrypt(&sk, false),
            Err(Error::Closed {
                kind: "BinFHESecretKey"
            })
        ));

        cc.close();
        cc.close();
        assert!(cc.is_closed());
        assert!(matches!(
            cc.n(),
            Err(Error::Closed {
                kind: "BinFHEContext"
            })
        ));
    }

    #[test]
    fn owned_objects_are_released_once() {
        let sim = SimBackend::new();
        let backend = Backend::from_sim(&sim);

        {
            let (mut cc, sk) = toy(&backend);
            let ct = cc.encrypt(&sk, false).unwrap();
            ct.close();
            cc.close();
        }

        let stats = sim.stats();
        assert_eq!(stats.live, 0);
        assert_eq!(stats.destroyed, 3);
        assert_eq!(stats.invalid_destroys, 0);
    }
}
