use std::{
    marker::PhantomData,
    sync::atomic::{AtomicU32, Ordering},
};

use log::debug;
use num::Complex;
use ofhe_engine::{Alloc, BinaryOp, Feature, FeatureSet, PkeEngine, RawHandle, SchemeId};

use crate::{
    Backend, Ciphertext, Ckks, Error, IntegerScheme, KeyPair, Params, Plaintext, Result, Scheme,
    handle::{Owned, resource},
};

resource!(ContextRes, "CryptoContext", |backend, handle| backend
    .pke()
    .engine()
    .context_destroy(handle));

#[derive(Debug)]
/// A crypto context: the parameters, keys and precomputations every operation
/// of one scheme instance runs against.
///
/// # Remarks
/// Operations are gated by [`Feature`]s, which must be enabled first (the
/// engine reports which one is missing otherwise). Enabling is monotonic;
/// [`CryptoContext::features`] mirrors what has been enabled through this
/// handle. A context obtained by deserialization starts with an empty mirror.
///
/// Keys, plaintexts and ciphertexts created through a context do not keep it
/// alive. Closing a context while they are still in use is a caller error.
///
/// # Example
/// ```rust
/// use ofhe::{Backend, Bfv, CryptoContext, Feature, Params};
///
/// let backend = Backend::simulated();
/// let params = Params::<Bfv>::new(&backend).unwrap();
/// params.set_plaintext_modulus(65537).unwrap();
/// params.set_multiplicative_depth(2).unwrap();
///
/// let cc = CryptoContext::new(&params).unwrap();
/// cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe]).unwrap();
///
/// let keys = cc.keygen().unwrap();
/// cc.eval_mult_keygen(&keys).unwrap();
///
/// let a = cc.encrypt(&keys, &cc.make_packed_plaintext(&[1, 2, 3, 4]).unwrap()).unwrap();
/// let b = cc.encrypt(&keys, &cc.make_packed_plaintext(&[5, 6, 7, 8]).unwrap()).unwrap();
///
/// let product = cc.decrypt(&keys, &cc.eval_mult(&a, &b).unwrap()).unwrap();
/// product.set_length(4).unwrap();
///
/// assert_eq!(product.packed_values().unwrap(), vec![5, 12, 21, 32]);
/// ```
pub struct CryptoContext<S: Scheme> {
    inner: Owned<ContextRes>,
    features: AtomicU32,
    _scheme: PhantomData<fn() -> S>,
}

impl<S: Scheme> CryptoContext<S> {
    /// Generates a context from `params`. The parameters are copied.
    pub fn new(params: &Params<S>) -> Result<Self> {
        let p = params.handle()?;
        let backend = params.backend();

        let handle = backend
            .pke()
            .alloc("GenCryptoContext", |e| e.context_new(S::ID, p))?;

        debug!("generated {} context {handle:?}", S::ID.name());

        Ok(Self::from_handle(backend, handle))
    }

    pub(crate) fn from_handle(backend: &Backend, handle: RawHandle) -> Self {
        Self {
            inner: Owned::new(backend, handle),
            features: AtomicU32::new(FeatureSet::EMPTY.bits()),
            _scheme: PhantomData,
        }
    }

    /// Enables a feature.
    pub fn enable(&self, feature: Feature) -> Result<()> {
        let cc = self.handle()?;

        self.pke().call("Enable", |e| e.enable(cc, feature))?;
        self.features.fetch_or(feature.to_u32(), Ordering::AcqRel);

        Ok(())
    }

    /// Enables each feature in turn, stopping at the first failure.
    pub fn enable_all(&self, features: impl IntoIterator<Item = Feature>) -> Result<()> {
        features.into_iter().try_for_each(|f| self.enable(f))
    }

    /// The features enabled through this handle.
    pub fn features(&self) -> FeatureSet {
        let bits = self.features.load(Ordering::Acquire);

        Feature::ALL
            .iter()
            .filter(|f| bits & f.to_u32() != 0)
            .fold(FeatureSet::EMPTY, |set, f| set | *f)
    }

    /// The scheme the engine reports for this context.
    pub fn scheme(&self) -> Result<SchemeId> {
        let cc = self.handle()?;

        self.pke().call("GetScheme", |e| e.context_scheme(cc))
    }

    /// The ring dimension `N`.
    pub fn ring_dimension(&self) -> Result<u64> {
        let cc = self.handle()?;

        self.pke().call("GetRingDimension", |e| e.ring_dimension(cc))
    }

    /// The cyclotomic order `M = 2N`, as fast rotations expect it.
    pub fn cyclotomic_order(&self) -> Result<u32> {
        let cc = self.handle()?;

        self.pke().call("GetCyclotomicOrder", |e| e.cyclotomic_order(cc))
    }

    /// A human-readable dump of the element parameters.
    pub fn parameter_element_string(&self) -> Result<String> {
        let cc = self.handle()?;

        self.pke()
            .call("GetElementParams", |e| e.parameter_element_string(cc))
    }

    /// The native integer width (64 or 128) of the engine.
    pub fn native_int_width(&self) -> u32 {
        self.backend().native_int_width()
    }

    /// Generates a key pair.
    pub fn keygen(&self) -> Result<KeyPair> {
        let cc = self.handle()?;
        let handle = self.pke().alloc("KeyGen", |e| e.keygen(cc))?;

        Ok(KeyPair::from_handle(self.backend(), handle))
    }

    /// Generates relinearization keys for `keys`, needed by
    /// ciphertext-ciphertext multiplication.
    pub fn eval_mult_keygen(&self, keys: &KeyPair) -> Result<()> {
        let (cc, kp) = (self.handle()?, keys.handle()?);

        self.pke()
            .call("EvalMultKeyGen", |e| e.eval_mult_keygen(cc, kp))
    }

    /// Generates rotation keys for exactly the listed indices. An empty list is
    /// a no-op.
    pub fn eval_rotate_keygen(&self, keys: &KeyPair, indices: &[i32]) -> Result<()> {
        let (cc, kp) = (self.handle()?, keys.handle()?);

        if indices.is_empty() {
            return Ok(());
        }

        self.pke()
            .call("EvalRotateKeyGen", |e| e.eval_rotate_keygen(cc, kp, indices))
    }

    /// Generates the rotation keys [`CryptoContext::eval_sum`] and
    /// [`CryptoContext::eval_inner_product`] need.
    pub fn eval_sum_keygen(&self, keys: &KeyPair) -> Result<()> {
        let (cc, kp) = (self.handle()?, keys.handle()?);

        self.pke().call("EvalSumKeyGen", |e| e.eval_sum_keygen(cc, kp))
    }

    /// Encrypts under the public half of `keys`.
    pub fn encrypt(&self, keys: &KeyPair, plaintext: &Plaintext) -> Result<Ciphertext> {
        let (kp, pt) = (keys.handle()?, plaintext.handle()?);

        self.ciphertext("Encrypt", |e, cc| e.encrypt(cc, kp, pt))
    }

    /// Decrypts with the private half of `keys`. The plaintext spans every slot;
    /// use [`Plaintext::set_length`] to trim it.
    pub fn decrypt(&self, keys: &KeyPair, ciphertext: &Ciphertext) -> Result<Plaintext> {
        let (kp, ct) = (keys.handle()?, ciphertext.handle()?);

        self.plaintext("Decrypt", |e, cc| e.decrypt(cc, kp, ct))
    }

    fn binary(&self, op: BinaryOp, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let (a, b) = (a.handle()?, b.handle()?);

        self.ciphertext(op.name(), |e, cc| e.eval_binary(cc, op, a, b))
    }

    fn binary_plain(&self, op: BinaryOp, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
        let (ct, pt) = (a.handle()?, b.handle()?);

        self.ciphertext(op.name(), |e, cc| e.eval_binary_plain(cc, op, ct, pt))
    }

    /// Slot-wise `a + b`.
    pub fn eval_add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary(BinaryOp::Add, a, b)
    }

    /// Slot-wise `a - b`.
    pub fn eval_sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary(BinaryOp::Sub, a, b)
    }

    /// Slot-wise `a * b`. Needs relinearization keys and consumes one level.
    pub fn eval_mult(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.binary(BinaryOp::Mult, a, b)
    }

    /// Slot-wise `a + b` with a plaintext operand.
    pub fn eval_add_plain(&self, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
        self.binary_plain(BinaryOp::Add, a, b)
    }

    /// Slot-wise `a - b` with a plaintext operand.
    pub fn eval_sub_plain(&self, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
        self.binary_plain(BinaryOp::Sub, a, b)
    }

    /// Slot-wise `a * b` with a plaintext operand.
    pub fn eval_mult_plain(&self, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
        self.binary_plain(BinaryOp::Mult, a, b)
    }

    /// Rotates slots left by `index`, right for negative indices. Needs a
    /// rotation key for `index` unless it is zero.
    pub fn eval_rotate(&self, ciphertext: &Ciphertext, index: i32) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;

        self.ciphertext("EvalRotate", |e, cc| e.eval_rotate(cc, ct, index))
    }

    /// Drops one level of the modulus chain.
    pub fn mod_reduce(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;

        self.ciphertext("ModReduce", |e, cc| e.mod_reduce(cc, ct))
    }

    /// Sums every window of `batch_size` slots into each slot of the window.
    pub fn eval_sum(&self, ciphertext: &Ciphertext, batch_size: u32) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;

        self.ciphertext("EvalSum", |e, cc| e.eval_sum(cc, ct, batch_size))
    }

    /// The inner product of the first `batch_size` slots of `a` and `b`.
    pub fn eval_inner_product(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        batch_size: u32,
    ) -> Result<Ciphertext> {
        let (a, b) = (a.handle()?, b.handle()?);

        self.ciphertext("EvalInnerProduct", |e, cc| {
            e.eval_inner_product(cc, a, b, batch_size)
        })
    }

    /// The backend this context lives in.
    pub fn backend(&self) -> &Backend {
        self.inner.backend()
    }

    pub(crate) fn pke(&self) -> &crate::bridge::PkeBridge {
        self.inner.backend().pke()
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Runs an allocating call against this context and wraps the result.
    pub(crate) fn ciphertext(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn PkeEngine, RawHandle) -> Alloc,
    ) -> Result<Ciphertext> {
        let cc = self.handle()?;
        let handle = self.pke().alloc(op, |e| f(e, cc))?;

        Ok(Ciphertext::from_handle(self.backend(), handle))
    }

    fn plaintext(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn PkeEngine, RawHandle) -> Alloc,
    ) -> Result<Plaintext> {
        let cc = self.handle()?;
        let handle = self.pke().alloc(op, |e| f(e, cc))?;

        Ok(Plaintext::from_handle(self.backend(), handle))
    }

    /// Releases the context. Idempotent.
    ///
    /// Takes `&mut self`: the scheme-switching
    /// [`BinFheContextRef`](crate::BinFheContextRef) and every
    /// typed builder borrow the context, so none of them can outlive this call.
    ///
    /// ```compile_fail
    /// use ofhe::{Backend, Ckks, CryptoContext, Feature, Params};
    ///
    /// let backend = Backend::simulated();
    /// let params = Params::<Ckks>::new(&backend).unwrap();
    /// let mut cc = CryptoContext::new(&params).unwrap();
    /// cc.enable(Feature::SchemeSwitch).unwrap();
    ///
    /// let bin_cc = cc.bin_cc_for_scheme_switch().unwrap();
    /// cc.close();
    /// bin_cc.n().unwrap();
    /// ```
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Whether [`CryptoContext::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<S: IntegerScheme> CryptoContext<S> {
    /// Encodes integers, one per slot. Each must lie within `±t/2`.
    pub fn make_packed_plaintext(&self, values: &[i64]) -> Result<Plaintext> {
        let op = "MakePackedPlaintext";

        if values.is_empty() {
            return Err(Error::EmptyInput { op });
        }

        self.plaintext(op, |e, cc| e.make_packed_plaintext(cc, values))
    }
}

impl CryptoContext<Ckks> {
    /// Encodes real numbers, one per slot.
    pub fn make_ckks_packed_plaintext(&self, values: &[f64]) -> Result<Plaintext> {
        let op = "MakeCKKSPackedPlaintext";

        if values.is_empty() {
            return Err(Error::EmptyInput { op });
        }

        self.plaintext(op, |e, cc| e.make_ckks_packed_plaintext(cc, values))
    }

    /// Encodes complex numbers, one per slot.
    pub fn make_ckks_complex_packed_plaintext(
        &self,
        values: &[Complex<f64>],
    ) -> Result<Plaintext> {
        let op = "MakeCKKSPackedPlaintext";

        if values.is_empty() {
            return Err(Error::EmptyInput { op });
        }

        self.plaintext(op, |e, cc| e.make_ckks_complex_packed_plaintext(cc, values))
    }

    /// Divides out a pending scaling factor, consuming one level. Only does
    /// anything under manual scaling techniques.
    pub fn rescale(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;

        self.ciphertext("Rescale", |e, cc| e.rescale(cc, ct))
    }

    /// Evaluates `sum(coefficients[i] * x^i)` in every slot.
    pub fn eval_poly(&self, ciphertext: &Ciphertext, coefficients: &[f64]) -> Result<Ciphertext> {
        let ct = ciphertext.handle()?;

        self.ciphertext("EvalPoly", |e, cc| e.eval_poly(cc, ct, coefficients))
    }
}
