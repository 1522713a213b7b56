use log::trace;
use serde::{Deserialize, Serialize};

use crate::{RawHandle, SchemeId, SerialFormat, SerialKind, SerialObject};

use super::{
    SimError, SimResult,
    objects::{
        CiphertextObj, ContextObj, KeyMaterial, KeyPairObj, MAX_RING_DIM, Object, ParamsObj, Slots,
    },
    pke::{private_half, public_half},
    safe_bincode::{self, GetSize},
    store::Table,
};

/// Bumped whenever the blob layout changes.
const BLOB_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct Blob {
    version: u32,
    body: Body,
}

#[derive(Debug, Serialize, Deserialize)]
enum Body {
    Context {
        context_id: u64,
        params: ParamsObj,
        ring_dim: u64,
    },
    PublicKey(KeyMaterial),
    PrivateKey(KeyMaterial),
    EvalMultKey {
        context_id: u64,
        key_id: u64,
    },
    Ciphertext(CiphertextObj),
}

impl Body {
    fn name(&self) -> &'static str {
        match self {
            Self::Context { .. } => "CryptoContext",
            Self::PublicKey(_) => "PublicKey",
            Self::PrivateKey(_) => "PrivateKey",
            Self::EvalMultKey { .. } => "EvalMultKey",
            Self::Ciphertext(_) => "Ciphertext",
        }
    }
}

impl GetSize for Blob {
    fn get_size() -> usize {
        // A full CKKS ciphertext dominates every other body.
        MAX_RING_DIM as usize * std::mem::size_of::<[f64; 2]>() + 256
    }

    fn check_is_valid(&self) -> SimResult<()> {
        if self.version != BLOB_VERSION {
            return Err(SimError::new(format!(
                "unsupported blob version {}",
                self.version
            )));
        }

        match &self.body {
            Body::Context {
                params, ring_dim, ..
            } => {
                if !ring_dim.is_power_of_two() || !(8..=MAX_RING_DIM).contains(ring_dim) {
                    return Err(SimError::new(format!("invalid ring dimension {ring_dim}")));
                }
                if params.scheme != SchemeId::Ckks && params.plaintext_modulus < 2 {
                    return Err(SimError::new("invalid plaintext modulus"));
                }
            }
            Body::PublicKey(key) | Body::PrivateKey(key) => {
                if key.key_id == 0 {
                    return Err(SimError::new("invalid key id"));
                }
            }
            Body::EvalMultKey { key_id, .. } => {
                if *key_id == 0 {
                    return Err(SimError::new("invalid key id"));
                }
            }
            Body::Ciphertext(ct) => {
                let consistent = match (&ct.slots, ct.scheme) {
                    (Slots::Int(v), SchemeId::Bfv | SchemeId::Bgv) => {
                        ct.modulus >= 2 && v.iter().all(|x| x.unsigned_abs() < ct.modulus)
                    }
                    (Slots::Complex(v), SchemeId::Ckks) => {
                        v.iter().all(|z| z.re.is_finite() && z.im.is_finite())
                            && ct.noise.is_finite()
                            && ct.noise >= 0.0
                    }
                    _ => false,
                };

                if !consistent || ct.slots.len() == 0 || ct.slots.len() > MAX_RING_DIM as usize {
                    return Err(SimError::new("ciphertext blob is malformed"));
                }
            }
        }

        Ok(())
    }
}

fn encode(blob: &Blob, format: SerialFormat) -> SimResult<Vec<u8>> {
    let bytes = match format {
        SerialFormat::Json => serde_json::to_vec(blob).map_err(|e| e.to_string()),
        SerialFormat::Binary => bincode::serialize(blob).map_err(|e| e.to_string()),
    };

    bytes.map_err(|e| SimError::new(format!("serialization failed: {e}")))
}

fn decode(bytes: &[u8], format: SerialFormat) -> SimResult<Blob> {
    if bytes.is_empty() {
        return Err(SimError::new("Deserialize: the blob is empty"));
    }

    match format {
        SerialFormat::Json => {
            let blob: Blob = serde_json::from_slice(bytes)?;
            blob.check_is_valid()?;
            Ok(blob)
        }
        SerialFormat::Binary => safe_bincode::deserialize(bytes),
    }
}

pub(super) fn serialize(
    table: &Table,
    object: SerialObject<'_>,
    format: SerialFormat,
) -> SimResult<Vec<u8>> {
    let body = match object {
        SerialObject::Context(cc) => {
            let ctx = table.context(cc)?;

            Body::Context {
                context_id: ctx.context_id,
                params: ctx.params.clone(),
                ring_dim: ctx.ring_dim,
            }
        }
        SerialObject::PublicKey(kp) => {
            Body::PublicKey(public_half(table, kp, "SerializePublicKey")?)
        }
        SerialObject::PrivateKey(kp) => {
            Body::PrivateKey(private_half(table, kp, "SerializePrivateKey")?)
        }
        SerialObject::EvalMultKey { context, key_tag } => {
            let ctx = table.context(context)?;
            let key_id = u64::from_str_radix(key_tag, 16)
                .ok()
                .filter(|id| ctx.mult_keys.contains(id))
                .ok_or_else(|| {
                    SimError::new(format!(
                        "SerializeEvalMultKey: no EvalMultKey for the key tag [{key_tag}]"
                    ))
                })?;

            Body::EvalMultKey {
                context_id: ctx.context_id,
                key_id,
            }
        }
        SerialObject::Ciphertext(ct) => Body::Ciphertext(table.ciphertext(ct)?.clone()),
    };

    trace!("serializing {} as {format:?}", body.name());

    encode(
        &Blob {
            version: BLOB_VERSION,
            body,
        },
        format,
    )
}

pub(super) fn deserialize(
    table: &mut Table,
    kind: SerialKind,
    bytes: &[u8],
    format: SerialFormat,
) -> SimResult<RawHandle> {
    let blob = decode(bytes, format)?;

    match (kind, blob.body) {
        (
            SerialKind::Context,
            Body::Context {
                context_id,
                params,
                ring_dim,
            },
        ) => {
            // Feature flags are not part of the blob; callers enable them again.
            let ctx = ContextObj::new(context_id, params, ring_dim);
            table.insert(Object::Context(Box::new(ctx)))
        }
        (SerialKind::PublicKey, Body::PublicKey(key)) => {
            let pk = table.insert(Object::PublicKey(key))?;
            table.insert(Object::KeyPair(KeyPairObj {
                public: Some(pk),
                private: None,
            }))
        }
        (SerialKind::PrivateKey, Body::PrivateKey(key)) => {
            let sk = table.insert(Object::PrivateKey(key))?;
            table.insert(Object::KeyPair(KeyPairObj {
                public: None,
                private: Some(sk),
            }))
        }
        (SerialKind::Ciphertext, Body::Ciphertext(ct)) => table.insert(Object::Ciphertext(ct)),
        (kind, body) => Err(SimError::new(format!(
            "Deserialize: the blob holds a {}, expected {kind:?}",
            body.name()
        ))),
    }
}

pub(super) fn load_eval_mult_key(
    table: &mut Table,
    cc: RawHandle,
    bytes: &[u8],
    format: SerialFormat,
) -> SimResult<()> {
    let blob = decode(bytes, format)?;

    let Body::EvalMultKey { context_id, key_id } = blob.body else {
        return Err(SimError::new(format!(
            "DeserializeEvalMultKey: the blob holds a {}, expected an EvalMultKey",
            blob.body.name()
        )));
    };

    let ctx = table.context_mut(cc)?;

    if ctx.context_id != context_id {
        return Err(SimError::new(
            "DeserializeEvalMultKey: the key was generated for a different CryptoContext",
        ));
    }

    ctx.mult_keys.insert(key_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        BinaryOp, Feature, ParamSetting, PkeEngine, RawHandle, SchemeId, SerialFormat, SerialKind,
        SerialObject, sim::SimBackend,
    };

    fn bgv(engine: &dyn PkeEngine) -> RawHandle {
        let params = engine.params_new(SchemeId::Bgv).unwrap().unwrap();
        engine
            .params_set(SchemeId::Bgv, params, ParamSetting::PlaintextModulus(65537))
            .unwrap();
        engine
            .params_set(SchemeId::Bgv, params, ParamSetting::MultiplicativeDepth(2))
            .unwrap();
        let cc = engine.context_new(SchemeId::Bgv, params).unwrap().unwrap();
        engine.params_destroy(SchemeId::Bgv, params);

        for feature in [Feature::Pke, Feature::KeySwitch, Feature::LeveledShe] {
            engine.enable(cc, feature).unwrap();
        }

        cc
    }

    #[test]
    fn ciphertexts_survive_both_formats() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bgv(engine.as_ref());
        let kp = engine.keygen(cc).unwrap().unwrap();
        let pt = engine.make_packed_plaintext(cc, &[3, -1, 4]).unwrap().unwrap();
        let ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();

        for format in [SerialFormat::Json, SerialFormat::Binary] {
            let blob = engine.serialize(SerialObject::Ciphertext(ct), format).unwrap();
            let copy = engine
                .deserialize(SerialKind::Ciphertext, &blob, format)
                .unwrap()
                .unwrap();
            let out = engine.decrypt(cc, kp, copy).unwrap().unwrap();
            engine.plaintext_set_length(out, 3).unwrap();

            assert_eq!(engine.plaintext_packed_values(out).unwrap(), vec![3, -1, 4]);
        }
    }

    #[test]
    fn relinearization_keys_move_between_contexts() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bgv(engine.as_ref());
        let kp = engine.keygen(cc).unwrap().unwrap();
        engine.eval_mult_keygen(cc, kp).unwrap();
        let tag = engine.key_tag(kp).unwrap();

        let ctx_blob = engine
            .serialize(SerialObject::Context(cc), SerialFormat::Binary)
            .unwrap();
        let key_blob = engine
            .serialize(
                SerialObject::EvalMultKey {
                    context: cc,
                    key_tag: &tag,
                },
                SerialFormat::Binary,
            )
            .unwrap();

        let copy = engine
            .deserialize(SerialKind::Context, &ctx_blob, SerialFormat::Binary)
            .unwrap()
            .unwrap();
        for feature in [Feature::Pke, Feature::KeySwitch, Feature::LeveledShe] {
            engine.enable(copy, feature).unwrap();
        }
        let pt = engine.make_packed_plaintext(copy, &[2, 3]).unwrap().unwrap();
        let ct = engine.encrypt(copy, kp, pt).unwrap().unwrap();

        assert!(engine.eval_binary(copy, BinaryOp::Mult, ct, ct).is_err());
        assert!(engine.last_error().is_some());

        engine
            .deserialize_eval_mult_key(copy, &key_blob, SerialFormat::Binary)
            .unwrap();
        let sq = engine.eval_binary(copy, BinaryOp::Mult, ct, ct).unwrap().unwrap();
        let out = engine.decrypt(copy, kp, sq).unwrap().unwrap();
        engine.plaintext_set_length(out, 2).unwrap();

        assert_eq!(engine.plaintext_packed_values(out).unwrap(), vec![4, 9]);
    }

    #[test]
    fn mismatched_and_malformed_blobs_are_rejected() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bgv(engine.as_ref());
        let kp = engine.keygen(cc).unwrap().unwrap();

        let blob = engine
            .serialize(SerialObject::PublicKey(kp), SerialFormat::Json)
            .unwrap();

        assert!(engine
            .deserialize(SerialKind::PrivateKey, &blob, SerialFormat::Json)
            .is_err());
        assert!(engine.last_error().unwrap().contains("expected PrivateKey"));

        assert!(engine
            .deserialize(SerialKind::PublicKey, &blob, SerialFormat::Binary)
            .is_err());
        assert!(engine
            .deserialize(SerialKind::Ciphertext, &[], SerialFormat::Binary)
            .is_err());
        assert!(engine
            .deserialize(SerialKind::Ciphertext, b"{\"version\":1", SerialFormat::Json)
            .is_err());
    }

    #[test]
    fn deserialized_contexts_start_without_features() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bgv(engine.as_ref());

        let blob = engine
            .serialize(SerialObject::Context(cc), SerialFormat::Json)
            .unwrap();
        let copy = engine
            .deserialize(SerialKind::Context, &blob, SerialFormat::Json)
            .unwrap()
            .unwrap();

        assert!(engine.keygen(copy).is_err());
        assert_eq!(
            engine.last_error().as_deref(),
            Some("KeyGen operation has not been enabled")
        );

        engine.enable(copy, Feature::Pke).unwrap();
        assert!(engine.keygen(copy).is_ok());
    }
}
