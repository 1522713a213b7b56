use ofhe_engine::RawHandle;

use crate::{
    Backend, Error, KeyHalf, Result,
    handle::{Borrowed, Owned, resource},
};

resource!(KeyPairRes, "KeyPair", |backend, handle| backend
    .pke()
    .engine()
    .keypair_destroy(handle));

#[derive(Debug)]
/// A public/private key pair. Either half may be absent.
///
/// # Remarks
/// [`CryptoContext::keygen`](crate::CryptoContext::keygen) produces a pair with
/// both halves. Deserializing a single key, or [`KeyPair::new_empty`] followed by
/// one setter, produces a pair with only one half; operations that need the
/// missing half fail with the engine's error (or [`Error::MissingKey`] when the
/// half is requested directly).
///
/// The halves are owned by the pair: [`PublicKey`] and [`PrivateKey`] borrow
/// from it and cannot outlive it. Closing needs `&mut self`, so a pair cannot
/// be released while a half is still borrowed:
///
/// ```compile_fail
/// use ofhe::{Backend, Bgv, CryptoContext, Feature, KeyPair, Params};
///
/// let backend = Backend::simulated();
/// let params = Params::<Bgv>::new(&backend).unwrap();
/// params.set_plaintext_modulus(65537).unwrap();
/// let cc = CryptoContext::new(&params).unwrap();
/// cc.enable(Feature::Pke).unwrap();
///
/// let mut keys = cc.keygen().unwrap();
/// let pk = keys.public_key().unwrap();
/// keys.close();
///
/// let copy = KeyPair::new_empty(&backend).unwrap();
/// copy.set_public_key(&pk).unwrap();
/// ```
pub struct KeyPair {
    inner: Owned<KeyPairRes>,
}

impl KeyPair {
    pub(crate) fn from_handle(backend: &Backend, handle: RawHandle) -> Self {
        Self {
            inner: Owned::new(backend, handle),
        }
    }

    /// A key pair with neither half present.
    pub fn new_empty(backend: &Backend) -> Result<Self> {
        let handle = backend.pke().alloc("NewKeyPair", |e| e.keypair_new())?;

        Ok(Self::from_handle(backend, handle))
    }

    /// Borrows the public half.
    pub fn public_key(&self) -> Result<PublicKey<'_>> {
        let kp = self.inner.handle()?;
        let backend = self.inner.backend();

        backend
            .pke()
            .call("GetPublicKey", |e| e.keypair_public(kp))?
            .map(|h| PublicKey {
                inner: Borrowed::new("PublicKey", backend, h),
            })
            .ok_or(Error::MissingKey {
                half: KeyHalf::Public,
            })
    }

    /// Borrows the private half.
    pub fn private_key(&self) -> Result<PrivateKey<'_>> {
        let kp = self.inner.handle()?;
        let backend = self.inner.backend();

        backend
            .pke()
            .call("GetPrivateKey", |e| e.keypair_private(kp))?
            .map(|h| PrivateKey {
                inner: Borrowed::new("PrivateKey", backend, h),
            })
            .ok_or(Error::MissingKey {
                half: KeyHalf::Private,
            })
    }

    /// Whether the public half is present.
    pub fn has_public_key(&self) -> Result<bool> {
        match self.public_key() {
            Ok(_) => Ok(true),
            Err(Error::MissingKey { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether the private half is present.
    pub fn has_private_key(&self) -> Result<bool> {
        match self.private_key() {
            Ok(_) => Ok(true),
            Err(Error::MissingKey { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Copies `key` (possibly from another pair) in as this pair's public half.
    pub fn set_public_key(&self, key: &PublicKey<'_>) -> Result<()> {
        let kp = self.inner.handle()?;
        let pk = key.handle();

        self.inner
            .backend()
            .pke()
            .call("SetPublicKey", |e| e.keypair_set_public(kp, pk))
    }

    /// Copies `key` (possibly from another pair) in as this pair's private half.
    pub fn set_private_key(&self, key: &PrivateKey<'_>) -> Result<()> {
        let kp = self.inner.handle()?;
        let sk = key.handle();

        self.inner
            .backend()
            .pke()
            .call("SetPrivateKey", |e| e.keypair_set_private(kp, sk))
    }

    /// The identifier evaluation keys derived from this pair's secret are filed
    /// under. Needed to serialize relinearization keys.
    pub fn key_tag(&self) -> Result<String> {
        let kp = self.inner.handle()?;

        self.inner.backend().pke().call("GetKeyTag", |e| e.key_tag(kp))
    }

    /// The backend this key pair lives in.
    pub fn backend(&self) -> &Backend {
        self.inner.backend()
    }

    pub(crate) fn handle(&self) -> Result<RawHandle> {
        self.inner.handle()
    }

    /// Releases the pair and both halves. Idempotent.
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Whether [`KeyPair::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[derive(Debug, Clone, Copy)]
/// The public half of a [`KeyPair`], borrowed from it.
pub struct PublicKey<'kp> {
    inner: Borrowed<'kp>,
}

impl PublicKey<'_> {
    pub(crate) fn handle(&self) -> RawHandle {
        self.inner.handle()
    }

    pub(crate) fn backend(&self) -> &Backend {
        self.inner.backend()
    }
}

#[derive(Debug, Clone, Copy)]
/// The private half of a [`KeyPair`], borrowed from it.
pub struct PrivateKey<'kp> {
    inner: Borrowed<'kp>,
}

impl PrivateKey<'_> {
    pub(crate) fn handle(&self) -> RawHandle {
        self.inner.handle()
    }

    pub(crate) fn backend(&self) -> &Backend {
        self.inner.backend()
    }
}
