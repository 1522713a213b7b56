//! Moving contexts, keys and ciphertexts in and out of the engine as blobs.
//!
//! Every object serializes to a [`Blob`] in either [`SerialFormat`]: JSON as a
//! string, binary as bytes. Blobs are only meaningful to the engine kind that
//! wrote them.
use log::debug;
use ofhe_engine::{SerialFormat, SerialKind, SerialObject};

use crate::{Backend, Ciphertext, CryptoContext, Error, KeyPair, Result, Scheme};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A serialized object.
pub enum Blob {
    /// The JSON form.
    Json(String),

    /// The binary form.
    Binary(Vec<u8>),
}

impl Blob {
    fn from_bytes(bytes: Vec<u8>, format: SerialFormat) -> Result<Self> {
        Ok(match format {
            SerialFormat::Json => Self::Json(String::from_utf8(bytes)?),
            SerialFormat::Binary => Self::Binary(bytes),
        })
    }

    /// The format of this blob.
    pub fn format(&self) -> SerialFormat {
        match self {
            Self::Json(_) => SerialFormat::Json,
            Self::Binary(_) => SerialFormat::Binary,
        }
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Json(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// The size of the blob in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the blob is empty. The engine never produces one.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn serialize(backend: &Backend, object: SerialObject<'_>, format: SerialFormat) -> Result<Blob> {
    let op = match object {
        SerialObject::Context(_) => "SerializeCryptoContext",
        SerialObject::PublicKey(_) => "SerializePublicKey",
        SerialObject::PrivateKey(_) => "SerializePrivateKey",
        SerialObject::EvalMultKey { .. } => "SerializeEvalMultKey",
        SerialObject::Ciphertext(_) => "SerializeCiphertext",
    };

    let bytes = backend.pke().call(op, |e| e.serialize(object, format))?;
    debug!("{op}: {} bytes as {format:?}", bytes.len());

    Blob::from_bytes(bytes, format)
}

fn deserialize(
    backend: &Backend,
    op: &'static str,
    kind: SerialKind,
    blob: &Blob,
) -> Result<ofhe_engine::RawHandle> {
    backend
        .pke()
        .alloc(op, |e| e.deserialize(kind, blob.as_bytes(), blob.format()))
}

impl<S: Scheme> CryptoContext<S> {
    /// Serializes the context parameters. Keys and feature flags are not part
    /// of the blob.
    pub fn serialize(&self, format: SerialFormat) -> Result<Blob> {
        serialize(self.backend(), SerialObject::Context(self.handle()?), format)
    }

    /// Restores a context. Keys and ciphertexts of the original work with the
    /// copy once the keys it needs are loaded.
    ///
    /// # Remarks
    /// The copy starts with no features enabled. Enable the same set as the
    /// original before using it, otherwise key generation and evaluation fail.
    pub fn deserialize(backend: &Backend, blob: &Blob) -> Result<Self> {
        let handle = deserialize(
            backend,
            "DeserializeCryptoContext",
            SerialKind::Context,
            blob,
        )?;
        let cc = Self::from_handle(backend, handle);

        let scheme = cc.scheme()?;
        if scheme != S::ID {
            return Err(Error::InvalidArgument {
                op: "DeserializeCryptoContext",
                message: format!(
                    "the blob holds a {} context, expected {}",
                    scheme.name(),
                    S::ID.name()
                ),
            });
        }

        Ok(cc)
    }

    /// Serializes the relinearization keys generated for `keys`.
    pub fn serialize_eval_mult_key(&self, keys: &KeyPair, format: SerialFormat) -> Result<Blob> {
        let key_tag = keys.key_tag()?;

        serialize(
            self.backend(),
            SerialObject::EvalMultKey {
                context: self.handle()?,
                key_tag: &key_tag,
            },
            format,
        )
    }

    /// Loads relinearization keys into this context.
    pub fn deserialize_eval_mult_key(&self, blob: &Blob) -> Result<()> {
        let cc = self.handle()?;

        self.pke().call("DeserializeEvalMultKey", |e| {
            e.deserialize_eval_mult_key(cc, blob.as_bytes(), blob.format())
        })
    }
}

impl KeyPair {
    /// Serializes the public half.
    pub fn serialize_public_key(&self, format: SerialFormat) -> Result<Blob> {
        serialize(self.backend(), SerialObject::PublicKey(self.handle()?), format)
    }

    /// Serializes the private half.
    pub fn serialize_private_key(&self, format: SerialFormat) -> Result<Blob> {
        serialize(self.backend(), SerialObject::PrivateKey(self.handle()?), format)
    }

    /// Restores a public key as a key pair holding only that half.
    pub fn deserialize_public_key(backend: &Backend, blob: &Blob) -> Result<Self> {
        let handle = deserialize(
            backend,
            "DeserializePublicKey",
            SerialKind::PublicKey,
            blob,
        )?;

        Ok(Self::from_handle(backend, handle))
    }

    /// Restores a private key as a key pair holding only that half.
    pub fn deserialize_private_key(backend: &Backend, blob: &Blob) -> Result<Self> {
        let handle = deserialize(
            backend,
            "DeserializePrivateKey",
            SerialKind::PrivateKey,
            blob,
        )?;

        Ok(Self::from_handle(backend, handle))
    }
}

impl Ciphertext {
    /// Serializes the ciphertext.
    pub fn serialize(&self, format: SerialFormat) -> Result<Blob> {
        serialize(self.backend(), SerialObject::Ciphertext(self.handle()?), format)
    }

    /// Restores a ciphertext.
    pub fn deserialize(backend: &Backend, blob: &Blob) -> Result<Self> {
        let handle = deserialize(
            backend,
            "DeserializeCiphertext",
            SerialKind::Ciphertext,
            blob,
        )?;

        Ok(Self::from_handle(backend, handle))
    }
}

#[cfg(test)]
mod tests {
    use ofhe_engine::{Feature, FeatureSet};

    use super::*;
    use crate::{
        Bfv, Bgv, Ckks, KeyHalf,
        test_utils::{approx_eq, bgv_context, bgv_keys, ckks_context, ckks_keys},
    };

    const FORMATS: [SerialFormat; 2] = [SerialFormat::Json, SerialFormat::Binary];

    #[test]
    fn blobs_have_the_requested_form() {
        let (_, cc) = bgv_context();

        let json = cc.serialize(SerialFormat::Json).unwrap();
        let binary = cc.serialize(SerialFormat::Binary).unwrap();

        assert!(matches!(json, Blob::Json(ref s) if s.starts_with('{')));
        assert!(matches!(binary, Blob::Binary(_)));
        assert!(!binary.is_empty());
    }

    #[test]
    fn context_keys_and_ciphertext_move_together() {
        for format in FORMATS {
            let (backend, cc) = bgv_context();
            let keys = bgv_keys();

            let ct = cc
                .encrypt(&keys, &cc.make_packed_plaintext(&[3, -4, 5]).unwrap())
                .unwrap();

            let cc_blob = cc.serialize(format).unwrap();
            let pk_blob = keys.serialize_public_key(format).unwrap();
            let sk_blob = keys.serialize_private_key(format).unwrap();
            let mult_blob = cc.serialize_eval_mult_key(&keys, format).unwrap();
            let ct_blob = ct.serialize(format).unwrap();

            let copy = CryptoContext::<Bgv>::deserialize(&backend, &cc_blob).unwrap();
            assert_eq!(copy.features(), FeatureSet::EMPTY);

            let pk = KeyPair::deserialize_public_key(&backend, &pk_blob).unwrap();
            let sk = KeyPair::deserialize_private_key(&backend, &sk_blob).unwrap();
            assert!(pk.has_public_key().unwrap() && !pk.has_private_key().unwrap());
            assert!(matches!(
                pk.private_key(),
                Err(Error::MissingKey {
                    half: KeyHalf::Private
                })
            ));

            let restored = Ciphertext::deserialize(&backend, &ct_blob).unwrap();
            copy.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
                .unwrap();
            copy.deserialize_eval_mult_key(&mult_blob).unwrap();

            let fresh = copy
                .encrypt(&pk, &copy.make_packed_plaintext(&[2, 2, 2]).unwrap())
                .unwrap();
            let product = copy.eval_mult(&restored, &fresh).unwrap();

            let pt = copy.decrypt(&sk, &product).unwrap();
            pt.set_length(3).unwrap();
            assert_eq!(pt.packed_values().unwrap(), vec![6, -8, 10]);
        }
    }

    #[test]
    fn restored_context_needs_its_features_again() {
        let (backend, cc) = bgv_context();
        let keys = bgv_keys();
        let ct = cc
            .encrypt(&keys, &cc.make_packed_plaintext(&[7, 8]).unwrap())
            .unwrap();
        let blob = cc.serialize(SerialFormat::Binary).unwrap();
        let mult_blob = cc
            .serialize_eval_mult_key(&keys, SerialFormat::Binary)
            .unwrap();

        let copy = CryptoContext::<Bgv>::deserialize(&backend, &blob).unwrap();

        let err = copy.keygen().unwrap_err();
        assert!(matches!(err, Error::Native { .. }), "{err}");
        assert!(err.to_string().contains("not been enabled"), "{err}");
        assert!(copy.eval_add(&ct, &ct).is_err());

        copy.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
            .unwrap();
        copy.deserialize_eval_mult_key(&mult_blob).unwrap();

        assert!(copy.keygen().is_ok());
        let pt = copy.decrypt(&keys, &copy.eval_mult(&ct, &ct).unwrap()).unwrap();
        pt.set_length(2).unwrap();
        assert_eq!(pt.packed_values().unwrap(), vec![49, 64]);
    }

    #[test]
    fn ckks_ciphertexts_keep_their_values() {
        let (backend, cc) = ckks_context();
        let keys = ckks_keys();
        let values = [0.5, -1.25, 3.0];

        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
            .unwrap();

        for format in FORMATS {
            let blob = ct.serialize(format).unwrap();
            let restored = Ciphertext::deserialize(&backend, &blob).unwrap();
            let pt = cc.decrypt(&keys, &restored).unwrap();
            pt.set_length(values.len()).unwrap();

            assert!(approx_eq(&pt.real_packed_values().unwrap(), &values, 1e-6));
        }
    }

    #[test]
    fn wrong_kind_scheme_and_garbage_are_rejected() {
        let (backend, cc) = bgv_context();
        let keys = bgv_keys();
        let blob = cc.serialize(SerialFormat::Binary).unwrap();

        let err = CryptoContext::<Ckks>::deserialize(&backend, &blob).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }), "{err}");
        assert!(CryptoContext::<Bfv>::deserialize(&backend, &blob).is_err());

        let err = Ciphertext::deserialize(&backend, &blob).unwrap_err();
        assert!(err.to_string().contains("expected Ciphertext"), "{err}");

        let pk_blob = keys.serialize_public_key(SerialFormat::Json).unwrap();
        assert!(KeyPair::deserialize_private_key(&backend, &pk_blob).is_err());

        let garbage = Blob::Binary(vec![0xff; 64]);
        assert!(matches!(
            Ciphertext::deserialize(&backend, &garbage),
            Err(Error::Native { .. })
        ));
        assert!(Ciphertext::deserialize(&backend, &Blob::Json(String::new())).is_err());
    }

    #[test]
    fn mult_keys_need_a_tag_the_context_knows() {
        let (_, cc) = bgv_context();
        let stranger = cc.keygen().unwrap();

        let err = cc
            .serialize_eval_mult_key(&stranger, SerialFormat::Json)
            .unwrap_err();
        assert!(err.to_string().contains("no EvalMultKey"), "{err}");

        assert!(cc.features().contains(Feature::LeveledShe));
    }
}
