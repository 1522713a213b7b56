//! Proxy re-encryption.
use log::debug;
use ofhe_engine::RawHandle;

use crate::{
    Backend, Ciphertext, CryptoContext, Error, PrivateKey, PublicKey, Result, Scheme,
    handle::{Owned, resource},
};

resource!(EvalKeyRes, "EvalKey", |backend, handle| backend
    .pke()
    .engine()
    .eval_key_destroy(handle));

#[derive(Debug)]
/// A re-encryption key: turns ciphertexts under one secret into ciphertexts
/// under another party's public key, without decrypting.
pub struct EvalKey {
    inner: Owned<EvalKeyRes>,
}

impl EvalKey {
    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// The backend this key lives in.
    pub fn backend(&self) -> &Backend {
        self.inner.backend()
    }

    /// Releases the key. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`EvalKey::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<S: Scheme> CryptoContext<S> {
    /// Derives a key re-encrypting from the holder of `from` to the holder of
    /// `to`. Needs [`Feature::Pre`](crate::Feature::Pre).
    pub fn rekey_gen(&self, from: &PrivateKey<'_>, to: &PublicKey<'_>) -> Result<EvalKey> {
        let cc = self.handle()?;
        let (from, to) = (from.handle(), to.handle());

        let handle = self
            .pke()
            .alloc("ReKeyGen", |e| e.rekey_gen(cc, from, to))?;

        Ok(EvalKey {
            inner: Owned::new(self.backend(), handle),
        })
    }

    /// Re-encrypts `ciphertext` with `key`. A key derived from a different
    /// secret than the ciphertext's yields garbage, not an error.
    pub fn re_encrypt(&self, ciphertext: &Ciphertext, key: &EvalKey) -> Result<Ciphertext> {
        let (ct, key) = (ciphertext.handle()?, key.handle()?);

        self.ciphertext("ReEncrypt", |e, cc| e.re_encrypt(cc, ct, key))
    }
}

#[derive(Debug, Default)]
/// An ordered sequence of re-encryption hops, e.g. Alice to Bob to Carol.
///
/// # Example
/// ```rust
/// use ofhe::{Backend, Bgv, CryptoContext, Feature, Params, pre::ReEncryptionChain};
///
/// let backend = Backend::simulated();
/// let params = Params::<Bgv>::new(&backend).unwrap();
/// params.set_plaintext_modulus(65537).unwrap();
///
/// let cc = CryptoContext::new(&params).unwrap();
/// cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe, Feature::Pre])
///     .unwrap();
///
/// let alice = cc.keygen().unwrap();
/// let bob = cc.keygen().unwrap();
///
/// let mut chain = ReEncryptionChain::new();
/// chain.push(cc.rekey_gen(&alice.private_key().unwrap(), &bob.public_key().unwrap()).unwrap());
///
/// let ct = cc.encrypt(&alice, &cc.make_packed_plaintext(&[7, 8, 9]).unwrap()).unwrap();
/// let pt = cc.decrypt(&bob, &chain.apply(&cc, &ct).unwrap()).unwrap();
/// pt.set_length(3).unwrap();
///
/// assert_eq!(pt.packed_values().unwrap(), vec![7, 8, 9]);
/// ```
pub struct ReEncryptionChain {
    hops: Vec<EvalKey>,
}

impl ReEncryptionChain {
    /// A chain with no hops yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hop.
    pub fn push(&mut self, key: EvalKey) {
        self.hops.push(key);
    }

    /// The number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Whether the chain has no hops.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Re-encrypts `ciphertext` through every hop in order. Intermediate
    /// ciphertexts are released as soon as the next hop is done. An empty
    /// chain is an error.
    pub fn apply<S: Scheme>(
        &self,
        cc: &CryptoContext<S>,
        ciphertext: &Ciphertext,
    ) -> Result<Ciphertext> {
        let Some((first, rest)) = self.hops.split_first() else {
            return Err(Error::InvalidArgument {
                op: "ReEncrypt",
                message: "re-encryption chain is empty".to_owned(),
            });
        };

        let mut current = cc.re_encrypt(ciphertext, first)?;

        for (hop, key) in rest.iter().enumerate() {
            current = cc.re_encrypt(&current, key)?;
            debug!("re-encryption hop {} of {} done", hop + 2, self.hops.len());
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::Feature;

    use super::*;
    use crate::{Bfv, KeyPair, Params};

    fn context(backend: &Backend) -> CryptoContext<Bfv> {
        let params = Params::<Bfv>::new(backend).unwrap();
        params.set_plaintext_modulus(65537).unwrap();
        params.set_multiplicative_depth(1).unwrap();

        let cc = CryptoContext::new(&params).unwrap();
        cc.enable_all([
            Feature::Pke,
            Feature::KeySwitch,
            Feature::LeveledShe,
            Feature::Pre,
        ])
        .unwrap();

        cc
    }

    fn decrypt(cc: &CryptoContext<Bfv>, keys: &KeyPair, ct: &Ciphertext, len: usize) -> Vec<i64> {
        let pt = cc.decrypt(keys, ct).unwrap();
        pt.set_length(len).unwrap();
        pt.packed_values().unwrap()
    }

    #[test]
    fn three_party_chain() {
        let backend = Backend::simulated();
        let cc = context(&backend);
        let [alice, bob, carol] = [(); 3].map(|_| cc.keygen().unwrap());

        let mut chain = ReEncryptionChain::new();
        for (from, to) in [(&alice, &bob), (&bob, &carol)] {
            chain.push(
                cc.rekey_gen(&from.private_key().unwrap(), &to.public_key().unwrap())
                    .unwrap(),
            );
        }
        assert_eq!(chain.len(), 2);

        let values = [1, -2, 3, 32768];
        let ct = cc
            .encrypt(&alice, &cc.make_packed_plaintext(&values).unwrap())
            .unwrap();
        let out = chain.apply(&cc, &ct).unwrap();

        assert_eq!(decrypt(&cc, &carol, &out, values.len()), values);
        assert_ne!(decrypt(&cc, &bob, &out, values.len()), values);
    }

    #[test]
    fn wrong_source_key_yields_garbage() {
        let backend = Backend::simulated();
        let cc = context(&backend);
        let [alice, bob, eve] = [(); 3].map(|_| cc.keygen().unwrap());

        let key = cc
            .rekey_gen(&eve.private_key().unwrap(), &bob.public_key().unwrap())
            .unwrap();
        let ct = cc
            .encrypt(&alice, &cc.make_packed_plaintext(&[5, 6, 7, 8]).unwrap())
            .unwrap();
        let out = cc.re_encrypt(&ct, &key).unwrap();

        assert_ne!(decrypt(&cc, &bob, &out, 4), vec![5, 6, 7, 8]);
    }

    #[test]
    fn closed_keys_cannot_re_encrypt() {
        let backend = Backend::simulated();
        let cc = context(&backend);
        let [alice, bob] = [(); 2].map(|_| cc.keygen().unwrap());

        let key = cc
            .rekey_gen(&alice.private_key().unwrap(), &bob.public_key().unwrap())
            .unwrap();
        let ct = cc
            .encrypt(&alice, &cc.make_packed_plaintext(&[1, 2]).unwrap())
            .unwrap();

        key.close();
        key.close();
        assert!(key.is_closed());
        assert!(matches!(
            cc.re_encrypt(&ct, &key),
            Err(Error::Closed { kind: "EvalKey" })
        ));
    }

    #[test]
    fn pre_must_be_enabled() {
        let backend = Backend::simulated();
        let params = Params::<Bfv>::new(&backend).unwrap();
        params.set_plaintext_modulus(65537).unwrap();
        let cc = CryptoContext::new(&params).unwrap();
        cc.enable(Feature::Pke).unwrap();
        let keys = cc.keygen().unwrap();

        let err = cc
            .rekey_gen(&keys.private_key().unwrap(), &keys.public_key().unwrap())
            .unwrap_err();

        assert!(matches!(err, Error::Native { op: "ReKeyGen", .. }));
        assert!(err.to_string().contains("has not been enabled"), "{err}");
    }

    #[test]
    fn empty_chain_is_rejected() {
        let backend = Backend::simulated();
        let cc = context(&backend);
        let keys = cc.keygen().unwrap();
        let ct = cc
            .encrypt(&keys, &cc.make_packed_plaintext(&[1]).unwrap())
            .unwrap();

        let err = ReEncryptionChain::new().apply(&cc, &ct).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { op: "ReEncrypt", .. }));
    }
}
