use log::trace;
use num::Complex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use crate::{
    Alloc, BinaryOp, EngineResult, Feature, MinMaxRequest, ParamSetting, PkeEngine, RawHandle,
    SchSwchSetting, SchSwchSummary, SchemeId, SecretKeyDist, SerialFormat, SerialKind,
    SerialObject,
};

use super::{
    SimError, SimPke, SimResult,
    objects::{
        self, BootstrapState, C64, CiphertextObj, ContextObj, KeyMaterial, KeyPairObj, Object,
        ParamsObj, PlaintextObj, PrecomputeObj, ReKeyObj, SchSwchObj, Slots, centered,
    },
    serial,
    store::Table,
    switching,
};

/// Standard deviation of the error a bootstrapped ciphertext carries.
const BOOTSTRAP_NOISE: f64 = 1e-4;

pub(super) fn require(ctx: &ContextObj, feature: Feature, op: &str) -> SimResult<()> {
    if ctx.features.contains(feature) {
        Ok(())
    } else {
        Err(SimError::not_enabled(op))
    }
}

pub(super) fn same_context(
    ctx: &ContextObj,
    context_id: u64,
    what: &str,
    op: &str,
) -> SimResult<()> {
    if ctx.context_id == context_id {
        Ok(())
    } else {
        Err(SimError::new(format!(
            "{op}: {what} was not created in this CryptoContext"
        )))
    }
}

pub(super) fn public_half(table: &Table, kp: RawHandle, op: &str) -> SimResult<KeyMaterial> {
    let pair = table.keypair(kp)?;
    let Some(pk) = pair.public else {
        return Err(SimError::new(format!("{op}: input public key is missing")));
    };

    table.public_key(pk).copied()
}

pub(super) fn private_half(table: &Table, kp: RawHandle, op: &str) -> SimResult<KeyMaterial> {
    let pair = table.keypair(kp)?;
    let Some(sk) = pair.private else {
        return Err(SimError::new(format!("{op}: input private key is missing")));
    };

    table.private_key(sk).copied()
}

fn fresh_noise(ctx: &ContextObj) -> f64 {
    match ctx.scheme() {
        SchemeId::Ckks => 2f64.powi(10 - ctx.params.scaling_mod_size as i32),
        SchemeId::Bfv | SchemeId::Bgv => 0.0,
    }
}

/// Largest absolute slot value.
fn magnitude(slots: &Slots) -> f64 {
    match slots {
        Slots::Int(values) => values.iter().map(|v| v.unsigned_abs() as f64).fold(0.0, f64::max),
        Slots::Complex(values) => values.iter().map(|v| v.norm()).fold(0.0, f64::max),
    }
}

/// Uniformly random slots, as decrypting with the wrong key yields.
fn garbage(rng: &mut StdRng, len: usize, modulus: u64) -> Vec<i64> {
    (0..len)
        .map(|_| centered(rng.gen_range(0..modulus.max(2)) as i128, modulus))
        .collect()
}

/// Adds a non-zero offset to every slot, as overflowing the noise budget does.
fn corrupt(values: &[i64], modulus: u64, seed: u64) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);

    values
        .iter()
        .map(|v| centered(*v as i128 + rng.gen_range(1..modulus.max(2)) as i128, modulus))
        .collect()
}

/// Brings plaintext slots to the context's slot count.
fn padded(ctx: &ContextObj, slots: &Slots, op: &str) -> SimResult<Slots> {
    let n = ctx.slot_count();

    match (ctx.scheme(), slots) {
        (SchemeId::Bfv | SchemeId::Bgv, Slots::Int(values)) => {
            let mut values = values.clone();
            values.resize(n, 0);
            Ok(Slots::Int(values))
        }
        (SchemeId::Ckks, Slots::Complex(values)) => {
            let mut values = values.clone();
            values.resize(n, C64::new(0.0, 0.0));
            Ok(Slots::Complex(values))
        }
        (scheme, _) => Err(SimError::new(format!(
            "{op}: plaintext encoding does not match the {} scheme",
            scheme.name()
        ))),
    }
}

fn combine(op: BinaryOp, a: &Slots, b: &Slots, modulus: u64) -> SimResult<Slots> {
    match (a, b) {
        (Slots::Int(a), Slots::Int(b)) => Ok(Slots::Int(
            a.iter()
                .zip(b)
                .map(|(x, y)| {
                    let (x, y) = (*x as i128, *y as i128);
                    let v = match op {
                        BinaryOp::Add => x + y,
                        BinaryOp::Sub => x - y,
                        BinaryOp::Mult => x * y,
                    };
                    centered(v, modulus)
                })
                .collect(),
        )),
        (Slots::Complex(a), Slots::Complex(b)) => Ok(Slots::Complex(
            a.iter()
                .zip(b)
                .map(|(x, y)| match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mult => x * y,
                })
                .collect(),
        )),
        _ => Err(SimError::new(format!(
            "{}: operands use different encodings",
            op.name()
        ))),
    }
}

/// Applies `f` to each row of length `cycle`.
fn per_row<T: Copy>(values: &[T], cycle: usize, f: impl Fn(&[T]) -> Vec<T>) -> Vec<T> {
    values.chunks(cycle.max(1)).flat_map(f).collect()
}

pub(super) fn rotate_slots(ctx: &ContextObj, slots: &Slots, index: i32) -> Slots {
    let cycle = ctx.rotation_cycle().max(1);

    fn rotate<T: Copy>(row: &[T], index: i32) -> Vec<T> {
        let shift = (index as i64).rem_euclid(row.len() as i64) as usize;
        (0..row.len()).map(|i| row[(i + shift) % row.len()]).collect()
    }

    match slots {
        Slots::Int(v) => Slots::Int(per_row(v, cycle, |row| rotate(row, index))),
        Slots::Complex(v) => Slots::Complex(per_row(v, cycle, |row| rotate(row, index))),
    }
}

/// Slot `i` of each row becomes the sum of the `window` slots starting at `i`.
fn window_sums(ctx: &ContextObj, slots: &Slots, window: usize, modulus: u64) -> Slots {
    let cycle = ctx.rotation_cycle().max(1);

    match slots {
        Slots::Int(v) => Slots::Int(per_row(v, cycle, |row| {
            (0..row.len())
                .map(|i| {
                    let sum = (0..window).map(|j| row[(i + j) % row.len()] as i128).sum();
                    centered(sum, modulus)
                })
                .collect()
        })),
        Slots::Complex(v) => Slots::Complex(per_row(v, cycle, |row| {
            (0..row.len())
                .map(|i| (0..window).map(|j| row[(i + j) % row.len()]).sum())
                .collect()
        })),
    }
}

/// Levels consumed by a ciphertext, counting pending rescales.
fn effective_level(ct: &CiphertextObj) -> u32 {
    ct.level + ct.scale_degree.saturating_sub(1)
}

fn exhausted(op: &str, depth: u32) -> SimError {
    SimError::new(format!(
        "{op}: the multiplicative depth ({depth}) of the CryptoContext has been exhausted"
    ))
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    level: u32,
    scale_degree: u32,
    overflow: bool,
}

/// The level and scaling degree of an operation's result. `b` is `None` for a
/// plaintext operand.
fn result_shape(
    ctx: &ContextObj,
    op: BinaryOp,
    a: &CiphertextObj,
    b: Option<&CiphertextObj>,
) -> SimResult<Shape> {
    let depth = ctx.depth();
    let (lb, db) = b.map(|b| (b.level, b.scale_degree)).unwrap_or((0, 1));
    let manual = ctx.params.scaling_technique.is_manual();

    let shape = match (ctx.scheme(), op) {
        (SchemeId::Bfv, BinaryOp::Mult) => {
            let level = a.level.max(lb) + 1;
            Shape {
                level,
                scale_degree: 1,
                overflow: level > depth,
            }
        }
        (SchemeId::Bgv, BinaryOp::Mult) => {
            let level = a.level.max(lb) + 1;
            if level > depth {
                return Err(exhausted(op.name(), depth));
            }
            Shape {
                level,
                scale_degree: 1,
                overflow: false,
            }
        }
        (SchemeId::Ckks, BinaryOp::Mult) if manual => {
            let level = a.level.max(lb);
            let scale_degree = a.scale_degree + db;
            if level + scale_degree - 1 > depth {
                return Err(exhausted(op.name(), depth));
            }
            Shape {
                level,
                scale_degree,
                overflow: false,
            }
        }
        (SchemeId::Ckks, BinaryOp::Mult) => {
            let level = effective_level(a).max(lb + db.saturating_sub(1)) + 1;
            if level > depth {
                return Err(exhausted(op.name(), depth));
            }
            Shape {
                level,
                scale_degree: 1,
                overflow: false,
            }
        }
        (SchemeId::Ckks, _) if manual && b.is_some() && a.scale_degree != db => {
            return Err(SimError::new(format!(
                "{}: operands have different scaling degrees; rescale first",
                op.name()
            )));
        }
        (SchemeId::Ckks, _) if manual => Shape {
            level: a.level.max(lb),
            scale_degree: a.scale_degree,
            overflow: false,
        },
        (SchemeId::Ckks, _) => Shape {
            level: effective_level(a).max(lb + db.saturating_sub(1)),
            scale_degree: 1,
            overflow: false,
        },
        (_, _) => Shape {
            level: a.level.max(lb),
            scale_degree: 1,
            overflow: false,
        },
    };

    Ok(shape)
}

fn derived(a: &CiphertextObj, slots: Slots, shape: Shape, noise: f64) -> CiphertextObj {
    let slots = match (&slots, shape.overflow) {
        (Slots::Int(values), true) => {
            Slots::Int(corrupt(values, a.modulus, a.key_id ^ u64::from(shape.level)))
        }
        _ => slots,
    };

    CiphertextObj {
        context_id: a.context_id,
        scheme: a.scheme,
        key_id: a.key_id,
        slots,
        level: shape.level,
        scale_degree: shape.scale_degree,
        modulus: a.modulus,
        noise,
    }
}

fn require_mult_key(ctx: &ContextObj, key_id: u64, op: &str) -> SimResult<()> {
    if ctx.mult_keys.contains(&key_id) {
        Ok(())
    } else {
        Err(SimError::new(format!(
            "{op}: EvalMultKey for the key tag [{}] was not found; call EvalMultKeyGen first",
            ContextObj::key_tag(key_id)
        )))
    }
}

fn require_rotation_key(ctx: &ContextObj, key_id: u64, index: i32, op: &str) -> SimResult<()> {
    let found = ctx
        .rotation_keys
        .get(&key_id)
        .is_some_and(|indices| indices.contains(&index));

    if index == 0 || found {
        Ok(())
    } else {
        Err(SimError::new(format!(
            "{op}: EvalKey for index [{index}] was not found; call EvalRotateKeyGen first"
        )))
    }
}

pub(super) fn check_ciphertext<'a>(
    table: &'a Table,
    ctx: &ContextObj,
    ct: RawHandle,
    op: &str,
) -> SimResult<&'a CiphertextObj> {
    let ct = table.ciphertext(ct)?;
    same_context(ctx, ct.context_id, "ciphertext", op)?;

    Ok(ct)
}

fn rotate_ciphertext(
    table: &Table,
    cc: RawHandle,
    ct: RawHandle,
    index: i32,
    op: &str,
) -> SimResult<Object> {
    let ctx = table.context(cc)?;
    require(ctx, Feature::LeveledShe, op)?;
    let ct = check_ciphertext(table, ctx, ct, op)?;
    require_rotation_key(ctx, ct.key_id, index, op)?;

    let mut out = ct.clone();
    out.slots = rotate_slots(ctx, &ct.slots, index);

    Ok(Object::Ciphertext(out))
}

fn eval_key_gen(
    table: &mut Table,
    cc: RawHandle,
    kp: RawHandle,
    feature: Feature,
    op: &str,
    insert: impl FnOnce(&mut ContextObj, u64),
) -> SimResult<()> {
    let key = private_half(table, kp, op)?;
    let ctx = table.context_mut(cc)?;
    require(ctx, feature, op)?;
    same_context(ctx, key.context_id, "private key", op)?;
    insert(ctx, key.key_id);

    Ok(())
}

impl PkeEngine for SimPke {
    fn last_error(&self) -> Option<String> {
        self.errors.take()
    }

    fn params_new(&self, scheme: SchemeId) -> Alloc {
        self.alloc("GenParams", |_| Ok(Object::Params(ParamsObj::new(scheme))))
    }

    fn params_set(
        &self,
        scheme: SchemeId,
        params: RawHandle,
        setting: ParamSetting,
    ) -> EngineResult<()> {
        self.call(setting.name(), |table| {
            let params = table.params_mut(params)?;

            if params.scheme != scheme {
                return Err(SimError::new(format!(
                    "{}: not a {} parameter set",
                    setting.name(),
                    scheme.name()
                )));
            }

            params.apply(setting)
        })
    }

    fn params_destroy(&self, _scheme: SchemeId, params: RawHandle) {
        trace!("sim: destroying params {params:?}");
        self.store.lock().remove(params);
    }

    fn context_new(&self, scheme: SchemeId, params: RawHandle) -> Alloc {
        self.alloc("GenCryptoContext", |table| {
            let params = table.params(params)?.clone();

            if params.scheme != scheme {
                return Err(SimError::new(format!(
                    "GenCryptoContext: not a {} parameter set",
                    scheme.name()
                )));
            }

            if scheme.is_exact() && params.plaintext_modulus == 0 {
                return Err(SimError::new(format!(
                    "GenCryptoContext: the plaintext modulus must be set for {}",
                    scheme.name()
                )));
            }

            let ring_dim = params.resolve_ring_dim()?;

            if scheme == SchemeId::Ckks && params.batch_size as u64 > ring_dim / 2 {
                return Err(SimError::new(format!(
                    "GenCryptoContext: batch size {} exceeds ring dimension / 2 ({})",
                    params.batch_size,
                    ring_dim / 2
                )));
            }

            let context_id = table.fresh_id();

            Ok(Object::Context(Box::new(ContextObj::new(
                context_id, params, ring_dim,
            ))))
        })
    }

    fn context_destroy(&self, cc: RawHandle) {
        trace!("sim: destroying context {cc:?}");
        let mut table = self.store.lock();

        if let Some(Object::Context(ctx)) = table.remove(cc) {
            if let Some(switch) = ctx.switch {
                table.remove_internal(switch.bin_cc);
            }
        }
    }

    fn context_scheme(&self, cc: RawHandle) -> EngineResult<SchemeId> {
        self.call("GetScheme", |table| Ok(table.context(cc)?.scheme()))
    }

    fn enable(&self, cc: RawHandle, feature: Feature) -> EngineResult<()> {
        self.call("Enable", |table| {
            table.context_mut(cc)?.features.insert(feature);
            Ok(())
        })
    }

    fn ring_dimension(&self, cc: RawHandle) -> EngineResult<u64> {
        self.call("GetRingDimension", |table| Ok(table.context(cc)?.ring_dim))
    }

    fn cyclotomic_order(&self, cc: RawHandle) -> EngineResult<u32> {
        self.call("GetCyclotomicOrder", |table| {
            Ok((table.context(cc)?.ring_dim * 2) as u32)
        })
    }

    fn parameter_element_string(&self, cc: RawHandle) -> EngineResult<String> {
        self.call("GetElementParams", |table| {
            let ctx = table.context(cc)?;
            Ok(format!(
                "scheme: {}, m: {}, n: {}, log2 q: {}, depth: {}",
                ctx.scheme().name(),
                ctx.ring_dim * 2,
                ctx.ring_dim,
                ctx.params.modulus_bits(),
                ctx.depth()
            ))
        })
    }

    fn native_int_width(&self) -> u32 {
        64
    }

    fn keygen(&self, cc: RawHandle) -> Alloc {
        self.alloc("KeyGen", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::Pke, "KeyGen")?;
            let context_id = ctx.context_id;

            let key = KeyMaterial {
                key_id: table.fresh_id(),
                context_id,
            };
            let public = table.insert(Object::PublicKey(key))?;
            let private = table.insert(Object::PrivateKey(key))?;

            Ok(Object::KeyPair(KeyPairObj {
                public: Some(public),
                private: Some(private),
            }))
        })
    }

    fn keypair_new(&self) -> Alloc {
        self.alloc("NewKeyPair", |_| Ok(Object::KeyPair(KeyPairObj::default())))
    }

    fn keypair_public(&self, kp: RawHandle) -> Alloc {
        self.call("GetPublicKey", |table| Ok(table.keypair(kp)?.public))
    }

    fn keypair_private(&self, kp: RawHandle) -> Alloc {
        self.call("GetPrivateKey", |table| Ok(table.keypair(kp)?.private))
    }

    fn keypair_set_public(&self, kp: RawHandle, public_key: RawHandle) -> EngineResult<()> {
        self.call("SetPublicKey", |table| {
            let key = *table.public_key(public_key)?;
            table.keypair(kp)?;
            let copy = table.insert(Object::PublicKey(key))?;
            let old = table.keypair_mut(kp)?.public.replace(copy);

            if let Some(old) = old {
                table.remove_internal(old);
            }

            Ok(())
        })
    }

    fn keypair_set_private(&self, kp: RawHandle, private_key: RawHandle) -> EngineResult<()> {
        self.call("SetPrivateKey", |table| {
            let key = *table.private_key(private_key)?;
            table.keypair(kp)?;
            let copy = table.insert(Object::PrivateKey(key))?;
            let old = table.keypair_mut(kp)?.private.replace(copy);

            if let Some(old) = old {
                table.remove_internal(old);
            }

            Ok(())
        })
    }

    fn keypair_destroy(&self, kp: RawHandle) {
        trace!("sim: destroying key pair {kp:?}");
        let mut table = self.store.lock();

        if let Some(Object::KeyPair(pair)) = table.remove(kp) {
            for half in [pair.public, pair.private].into_iter().flatten() {
                table.remove_internal(half);
            }
        }
    }

    fn key_tag(&self, kp: RawHandle) -> EngineResult<String> {
        self.call("GetKeyTag", |table| {
            let pair = table.keypair(kp)?;

            let key = match (pair.private, pair.public) {
                (Some(sk), _) => *table.private_key(sk)?,
                (None, Some(pk)) => *table.public_key(pk)?,
                (None, None) => return Err(SimError::new("GetKeyTag: key pair is empty")),
            };

            Ok(ContextObj::key_tag(key.key_id))
        })
    }

    fn eval_mult_keygen(&self, cc: RawHandle, kp: RawHandle) -> EngineResult<()> {
        self.call("EvalMultKeyGen", |table| {
            eval_key_gen(table, cc, kp, Feature::LeveledShe, "EvalMultKeyGen", |ctx, id| {
                ctx.mult_keys.insert(id);
            })
        })
    }

    fn eval_rotate_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        indices: &[i32],
    ) -> EngineResult<()> {
        self.call("EvalRotateKeyGen", |table| {
            eval_key_gen(table, cc, kp, Feature::LeveledShe, "EvalRotateKeyGen", |ctx, id| {
                ctx.rotation_keys
                    .entry(id)
                    .or_default()
                    .extend(indices.iter().copied());
            })
        })
    }

    fn eval_sum_keygen(&self, cc: RawHandle, kp: RawHandle) -> EngineResult<()> {
        self.call("EvalSumKeyGen", |table| {
            eval_key_gen(table, cc, kp, Feature::AdvancedShe, "EvalSumKeyGen", |ctx, id| {
                ctx.sum_keys.insert(id);
            })
        })
    }

    fn make_packed_plaintext(&self, cc: RawHandle, values: &[i64]) -> Alloc {
        self.alloc("MakePackedPlaintext", |table| {
            let ctx = table.context(cc)?;

            if !ctx.scheme().is_exact() {
                return Err(SimError::new(
                    "MakePackedPlaintext: packed encoding is not supported for CKKS",
                ));
            }

            if values.len() > ctx.slot_count() {
                return Err(SimError::new(format!(
                    "MakePackedPlaintext: {} values exceed the ring dimension {}",
                    values.len(),
                    ctx.slot_count()
                )));
            }

            let t = ctx.params.plaintext_modulus;
            let half = (t / 2) as i128;

            if let Some((i, v)) = values
                .iter()
                .enumerate()
                .find(|(_, v)| (**v as i128).abs() > half)
            {
                return Err(SimError::new(format!(
                    "MakePackedPlaintext: cannot encode integer {v} at position {i} \
                     that is greater than plaintext modulus / 2 ({half})"
                )));
            }

            Ok(Object::Plaintext(PlaintextObj {
                context_id: ctx.context_id,
                slots: Slots::Int(values.to_vec()),
                len: values.len(),
                modulus: t,
            }))
        })
    }

    fn make_ckks_packed_plaintext(&self, cc: RawHandle, values: &[f64]) -> Alloc {
        let values = values
            .iter()
            .map(|v| Complex::new(*v, 0.0))
            .collect::<Vec<_>>();

        self.make_ckks_complex_packed_plaintext(cc, &values)
    }

    fn make_ckks_complex_packed_plaintext(&self, cc: RawHandle, values: &[C64]) -> Alloc {
        self.alloc("MakeCKKSPackedPlaintext", |table| {
            let ctx = table.context(cc)?;

            if ctx.scheme() != SchemeId::Ckks {
                return Err(SimError::new(format!(
                    "MakeCKKSPackedPlaintext: not supported for {}",
                    ctx.scheme().name()
                )));
            }

            if values.len() > ctx.slot_count() {
                return Err(SimError::new(format!(
                    "MakeCKKSPackedPlaintext: the number of values ({}) exceeds the batch \
                     size ({})",
                    values.len(),
                    ctx.slot_count()
                )));
            }

            if values.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
                return Err(SimError::new(
                    "MakeCKKSPackedPlaintext: values must be finite",
                ));
            }

            Ok(Object::Plaintext(PlaintextObj {
                context_id: ctx.context_id,
                slots: Slots::Complex(values.to_vec()),
                len: values.len(),
                modulus: 0,
            }))
        })
    }

    fn plaintext_len(&self, pt: RawHandle) -> EngineResult<usize> {
        self.call("GetLength", |table| Ok(table.plaintext(pt)?.len))
    }

    fn plaintext_packed_values(&self, pt: RawHandle) -> EngineResult<Vec<i64>> {
        self.call("GetPackedValue", |table| {
            let pt = table.plaintext(pt)?;

            match &pt.slots {
                Slots::Int(values) => Ok(values[..pt.len.min(values.len())].to_vec()),
                Slots::Complex(_) => Err(SimError::new(
                    "GetPackedValue: not an integer-packed plaintext",
                )),
            }
        })
    }

    fn plaintext_real_values(&self, pt: RawHandle) -> EngineResult<Vec<f64>> {
        Ok(self
            .plaintext_complex_values(pt)?
            .into_iter()
            .map(|v| v.re)
            .collect())
    }

    fn plaintext_complex_values(&self, pt: RawHandle) -> EngineResult<Vec<C64>> {
        self.call("GetCKKSPackedValue", |table| {
            let pt = table.plaintext(pt)?;

            match &pt.slots {
                Slots::Complex(values) => Ok(values[..pt.len.min(values.len())].to_vec()),
                Slots::Int(_) => Err(SimError::new(
                    "GetCKKSPackedValue: not a CKKS-packed plaintext",
                )),
            }
        })
    }

    fn plaintext_set_length(&self, pt: RawHandle, len: usize) -> EngineResult<()> {
        self.call("SetLength", |table| {
            let pt = table.plaintext_mut(pt)?;

            if len > pt.slots.len() {
                return Err(SimError::new(format!(
                    "SetLength: length {len} exceeds the {} encoded slots",
                    pt.slots.len()
                )));
            }

            pt.len = len;
            Ok(())
        })
    }

    fn plaintext_destroy(&self, pt: RawHandle) {
        trace!("sim: destroying plaintext {pt:?}");
        self.store.lock().remove(pt);
    }

    fn encrypt(&self, cc: RawHandle, kp: RawHandle, pt: RawHandle) -> Alloc {
        self.alloc("Encrypt", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::Pke, "Encrypt")?;
            let key = public_half(table, kp, "Encrypt")?;
            same_context(ctx, key.context_id, "public key", "Encrypt")?;
            let pt = table.plaintext(pt)?;
            same_context(ctx, pt.context_id, "plaintext", "Encrypt")?;

            Ok(Object::Ciphertext(CiphertextObj {
                context_id: ctx.context_id,
                scheme: ctx.scheme(),
                key_id: key.key_id,
                slots: padded(ctx, &pt.slots, "Encrypt")?,
                level: 0,
                scale_degree: 1,
                modulus: ctx.params.plaintext_modulus,
                noise: fresh_noise(ctx),
            }))
        })
    }

    fn decrypt(&self, cc: RawHandle, kp: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("Decrypt", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::Pke, "Decrypt")?;
            let key = private_half(table, kp, "Decrypt")?;
            let ct = check_ciphertext(table, ctx, ct, "Decrypt")?.clone();
            let context_id = ctx.context_id;
            let rng = &mut table.context_mut(cc)?.rng;

            let slots = match (&ct.slots, key.key_id == ct.key_id) {
                (Slots::Int(values), true) => Slots::Int(values.clone()),
                (Slots::Int(values), false) => Slots::Int(garbage(rng, values.len(), ct.modulus)),
                (Slots::Complex(values), true) => {
                    Slots::Complex(with_noise(rng, values, ct.noise)?)
                }
                (Slots::Complex(_), false) => {
                    return Err(SimError::new(
                        "The decryption failed because the approximation error is too high. \
                         Check the parameters.",
                    ));
                }
            };

            Ok(Object::Plaintext(PlaintextObj {
                context_id,
                len: slots.len(),
                slots,
                modulus: ct.modulus,
            }))
        })
    }

    fn eval_binary(&self, cc: RawHandle, op: BinaryOp, a: RawHandle, b: RawHandle) -> Alloc {
        self.alloc(op.name(), |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::LeveledShe, op.name())?;
            let a = check_ciphertext(table, ctx, a, op.name())?;
            let b = check_ciphertext(table, ctx, b, op.name())?;

            if a.key_id != b.key_id {
                return Err(SimError::new(format!(
                    "{}: ciphertexts were not encrypted with the same keys",
                    op.name()
                )));
            }

            if op == BinaryOp::Mult {
                require_mult_key(ctx, a.key_id, op.name())?;
            }

            let shape = result_shape(ctx, op, a, Some(b))?;
            let slots = combine(op, &a.slots, &b.slots, a.modulus)?;
            let noise = match op {
                BinaryOp::Mult => 2.0 * (a.noise + b.noise),
                _ => a.noise + b.noise,
            };

            Ok(Object::Ciphertext(derived(a, slots, shape, noise)))
        })
    }

    fn eval_binary_plain(
        &self,
        cc: RawHandle,
        op: BinaryOp,
        ct: RawHandle,
        pt: RawHandle,
    ) -> Alloc {
        self.alloc(op.name(), |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::LeveledShe, op.name())?;
            let ct = check_ciphertext(table, ctx, ct, op.name())?;
            let pt = table.plaintext(pt)?;
            same_context(ctx, pt.context_id, "plaintext", op.name())?;

            let shape = result_shape(ctx, op, ct, None)?;
            let operand = padded(ctx, &pt.slots, op.name())?;
            let slots = combine(op, &ct.slots, &operand, ct.modulus)?;
            let noise = match op {
                BinaryOp::Mult => ct.noise * magnitude(&operand).max(1.0) + fresh_noise(ctx),
                _ => ct.noise,
            };

            Ok(Object::Ciphertext(derived(ct, slots, shape, noise)))
        })
    }

    fn eval_rotate(&self, cc: RawHandle, ct: RawHandle, index: i32) -> Alloc {
        self.alloc("EvalRotate", |table| {
            rotate_ciphertext(table, cc, ct, index, "EvalRotate")
        })
    }

    fn rescale(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("Rescale", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::LeveledShe, "Rescale")?;
            let ct = check_ciphertext(table, ctx, ct, "Rescale")?;
            let mut out = ct.clone();

            match ctx.scheme() {
                SchemeId::Ckks if ctx.params.scaling_technique.is_manual() => {
                    if ct.scale_degree < 2 {
                        return Err(SimError::new(
                            "Rescale: the ciphertext has no pending scaling factor",
                        ));
                    }
                    out.scale_degree -= 1;
                    out.level += 1;
                }
                SchemeId::Ckks => {}
                SchemeId::Bgv => {
                    out.level += 1;
                    if out.level > ctx.depth() {
                        return Err(exhausted("Rescale", ctx.depth()));
                    }
                }
                SchemeId::Bfv => {
                    return Err(SimError::new("Rescale: not supported for BFV"));
                }
            }

            Ok(Object::Ciphertext(out))
        })
    }

    fn mod_reduce(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        let scheme = self.context_scheme(cc)?;

        if scheme == SchemeId::Bfv {
            return self.errors.fail("ModReduce: not supported for BFV");
        }

        self.rescale(cc, ct)
    }

    fn eval_poly(&self, cc: RawHandle, ct: RawHandle, coefficients: &[f64]) -> Alloc {
        self.alloc("EvalPoly", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::AdvancedShe, "EvalPoly")?;
            let ct = check_ciphertext(table, ctx, ct, "EvalPoly")?;

            if ctx.scheme() != SchemeId::Ckks {
                return Err(SimError::new("EvalPoly: only supported for CKKS"));
            }

            if coefficients.is_empty() {
                return Err(SimError::new("EvalPoly: the coefficient vector is empty"));
            }

            let degree = coefficients.iter().rposition(|c| *c != 0.0).unwrap_or(0);

            if degree >= 2 {
                require_mult_key(ctx, ct.key_id, "EvalPoly")?;
            }

            let consumed = (usize::BITS - degree.leading_zeros()) as u32;
            let level = effective_level(ct) + consumed;

            if level > ctx.depth() {
                return Err(exhausted("EvalPoly", ctx.depth()));
            }

            let Slots::Complex(values) = &ct.slots else {
                return Err(SimError::new("EvalPoly: not a CKKS ciphertext"));
            };

            let values = values
                .iter()
                .map(|x| {
                    coefficients[..=degree]
                        .iter()
                        .rev()
                        .fold(C64::new(0.0, 0.0), |acc, c| acc * x + c)
                })
                .collect();

            let mut out = ct.clone();
            out.slots = Slots::Complex(values);
            out.level = level;
            out.scale_degree = 1;
            out.noise = ct.noise * (1 + degree) as f64;

            Ok(Object::Ciphertext(out))
        })
    }

    fn eval_sum(&self, cc: RawHandle, ct: RawHandle, batch_size: u32) -> Alloc {
        self.alloc("EvalSum", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::AdvancedShe, "EvalSum")?;
            let ct = check_ciphertext(table, ctx, ct, "EvalSum")?;
            require_sum(ctx, ct.key_id, batch_size, "EvalSum")?;

            let mut out = ct.clone();
            out.slots = window_sums(ctx, &ct.slots, batch_size as usize, ct.modulus);
            out.noise = ct.noise * batch_size as f64;

            Ok(Object::Ciphertext(out))
        })
    }

    fn eval_inner_product(
        &self,
        cc: RawHandle,
        a: RawHandle,
        b: RawHandle,
        batch_size: u32,
    ) -> Alloc {
        self.alloc("EvalInnerProduct", |table| {
            let op = "EvalInnerProduct";
            let ctx = table.context(cc)?;
            require(ctx, Feature::AdvancedShe, op)?;
            let a = check_ciphertext(table, ctx, a, op)?;
            let b = check_ciphertext(table, ctx, b, op)?;

            if a.key_id != b.key_id {
                return Err(SimError::new(format!(
                    "{op}: ciphertexts were not encrypted with the same keys"
                )));
            }

            require_mult_key(ctx, a.key_id, op)?;
            require_sum(ctx, a.key_id, batch_size, op)?;

            let shape = result_shape(ctx, BinaryOp::Mult, a, Some(b))?;
            let product = combine(BinaryOp::Mult, &a.slots, &b.slots, a.modulus)?;
            let slots = window_sums(ctx, &product, batch_size as usize, a.modulus);
            let noise = 2.0 * (a.noise + b.noise) * batch_size as f64;

            Ok(Object::Ciphertext(derived(a, slots, shape, noise)))
        })
    }

    fn fast_rotation_precompute(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalFastRotationPrecompute", |table| {
            let ctx = table.context(cc)?;
            require(ctx, Feature::LeveledShe, "EvalFastRotationPrecompute")?;
            check_ciphertext(table, ctx, ct, "EvalFastRotationPrecompute")?;

            Ok(Object::Precompute(PrecomputeObj {
                context_id: ctx.context_id,
                source: ct,
            }))
        })
    }

    fn fast_rotation(
        &self,
        cc: RawHandle,
        ct: RawHandle,
        index: i32,
        cyclotomic_order: u32,
        precompute: RawHandle,
    ) -> Alloc {
        self.alloc("EvalFastRotation", |table| {
            let op = "EvalFastRotation";
            let ctx = table.context(cc)?;
            let pre = table.precompute(precompute)?;
            same_context(ctx, pre.context_id, "precomputation", op)?;

            if pre.source != ct {
                return Err(SimError::new(format!(
                    "{op}: the precomputation was computed for a different ciphertext"
                )));
            }

            if cyclotomic_order as u64 != ctx.ring_dim * 2 {
                return Err(SimError::new(format!(
                    "{op}: cyclotomic order {cyclotomic_order} does not match the context ({})",
                    ctx.ring_dim * 2
                )));
            }

            rotate_ciphertext(table, cc, ct, index, op)
        })
    }

    fn fast_rotation_precompute_destroy(&self, precompute: RawHandle) {
        trace!("sim: destroying rotation precomputation {precompute:?}");
        self.store.lock().remove(precompute);
    }

    fn ciphertext_level(&self, ct: RawHandle) -> EngineResult<u32> {
        self.call("GetLevel", |table| Ok(table.ciphertext(ct)?.level))
    }

    fn ciphertext_destroy(&self, ct: RawHandle) {
        trace!("sim: destroying ciphertext {ct:?}");
        self.store.lock().remove(ct);
    }

    fn bootstrap_setup(&self, cc: RawHandle, level_budget: &[u32]) -> EngineResult<()> {
        self.call("EvalBootstrapSetup", |table| {
            let ctx = table.context_mut(cc)?;
            require(ctx, Feature::Fhe, "EvalBootstrapSetup")?;

            if ctx.scheme() != SchemeId::Ckks {
                return Err(SimError::new("EvalBootstrapSetup: only supported for CKKS"));
            }

            if !(level_budget.is_empty() || level_budget.len() == 2)
                || level_budget.contains(&0)
            {
                return Err(SimError::new(format!(
                    "EvalBootstrapSetup: the level budget {level_budget:?} must hold two \
                     positive entries"
                )));
            }

            ctx.bootstrap = Some(BootstrapState {
                level_budget: level_budget.to_vec(),
                keys: Default::default(),
            });

            Ok(())
        })
    }

    fn bootstrap_keygen(&self, cc: RawHandle, kp: RawHandle, slots: u32) -> EngineResult<()> {
        self.call("EvalBootstrapKeyGen", |table| {
            let op = "EvalBootstrapKeyGen";
            let key = private_half(table, kp, op)?;
            let ctx = table.context_mut(cc)?;
            require(ctx, Feature::Fhe, op)?;
            same_context(ctx, key.context_id, "private key", op)?;

            let max_slots = (ctx.ring_dim / 2) as u32;
            let slots = if slots == 0 { max_slots } else { slots };

            if !slots.is_power_of_two() || slots > max_slots {
                return Err(SimError::new(format!(
                    "{op}: slot count {slots} must be a power of two no larger than {max_slots}"
                )));
            }

            let Some(state) = ctx.bootstrap.as_mut() else {
                return Err(SimError::new(
                    "EvalBootstrapSetup must be called before EvalBootstrapKeyGen",
                ));
            };

            state.keys.insert(key.key_id, slots);

            Ok(())
        })
    }

    fn bootstrap(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalBootstrap", |table| {
            let op = "EvalBootstrap";
            let ctx = table.context(cc)?;
            require(ctx, Feature::Fhe, op)?;
            let ct = check_ciphertext(table, ctx, ct, op)?;

            let Some(state) = ctx.bootstrap.as_ref() else {
                return Err(SimError::new(
                    "EvalBootstrapSetup must be called before EvalBootstrap",
                ));
            };

            if !state.keys.contains_key(&ct.key_id) {
                return Err(SimError::new(
                    "EvalBootstrapKeyGen must be called before EvalBootstrap",
                ));
            }

            let needed =
                objects::bootstrap_depth(&state.level_budget, ctx.params.secret_key_dist);

            if ctx.depth() < needed {
                return Err(SimError::new(format!(
                    "{op}: bootstrapping needs a multiplicative depth of at least {needed}, \
                     the context has {}",
                    ctx.depth()
                )));
            }

            let mut out = ct.clone();
            out.level = needed;
            out.scale_degree = 1;
            out.noise = BOOTSTRAP_NOISE;

            Ok(Object::Ciphertext(out))
        })
    }

    fn bootstrap_depth(&self, level_budget: &[u32], dist: SecretKeyDist) -> u32 {
        objects::bootstrap_depth(level_budget, dist)
    }

    fn rekey_gen(
        &self,
        cc: RawHandle,
        old_private_key: RawHandle,
        new_public_key: RawHandle,
    ) -> Alloc {
        self.alloc("ReKeyGen", |table| {
            let op = "ReKeyGen";
            let ctx = table.context(cc)?;
            require(ctx, Feature::Pre, op)?;
            let from = table.private_key(old_private_key)?;
            let to = table.public_key(new_public_key)?;
            same_context(ctx, from.context_id, "private key", op)?;
            same_context(ctx, to.context_id, "public key", op)?;

            Ok(Object::EvalKey(ReKeyObj {
                context_id: ctx.context_id,
                from: from.key_id,
                to: to.key_id,
            }))
        })
    }

    fn re_encrypt(&self, cc: RawHandle, ct: RawHandle, eval_key: RawHandle) -> Alloc {
        self.alloc("ReEncrypt", |table| {
            let op = "ReEncrypt";
            let ctx = table.context(cc)?;
            require(ctx, Feature::Pre, op)?;
            let ct = check_ciphertext(table, ctx, ct, op)?;
            let key = table.eval_key(eval_key)?;
            same_context(ctx, key.context_id, "re-encryption key", op)?;

            let mut out = ct.clone();

            // A key for a different source secret re-encrypts to noise.
            out.key_id = if key.from == ct.key_id {
                key.to
            } else {
                rand::random::<u64>() | 1
            };

            Ok(Object::Ciphertext(out))
        })
    }

    fn eval_key_destroy(&self, eval_key: RawHandle) {
        trace!("sim: destroying eval key {eval_key:?}");
        self.store.lock().remove(eval_key);
    }

    fn schswch_params_new(&self) -> Alloc {
        self.alloc("NewSchSwchParams", |_| {
            Ok(Object::SchSwchParams(SchSwchObj::default()))
        })
    }

    fn schswch_params_set(&self, params: RawHandle, setting: SchSwchSetting) -> EngineResult<()> {
        self.call("SchSwchParams", |table| table.schswch_mut(params)?.apply(setting))
    }

    fn schswch_params_summary(&self, params: RawHandle) -> EngineResult<SchSwchSummary> {
        self.call("SchSwchParams", |table| {
            let params = table.schswch(params)?;

            Ok(SchSwchSummary {
                security_level_ckks: params.security_level_ckks,
                security_level_fhew: params.security_level_fhew,
                num_slots_ckks: params.num_slots_ckks,
                num_values: params.num_values,
            })
        })
    }

    fn schswch_params_destroy(&self, params: RawHandle) {
        trace!("sim: destroying scheme switching params {params:?}");
        self.store.lock().remove(params);
    }

    fn lwe_private_key_destroy(&self, key: RawHandle) {
        trace!("sim: destroying LWE private key {key:?}");
        self.store.lock().remove(key);
    }

    fn ckks_to_fhew_setup(&self, cc: RawHandle, params: RawHandle) -> Alloc {
        self.call("EvalCKKStoFHEWSetup", |table| {
            switching::setup(table, cc, params, false).map(Some)
        })
    }

    fn ckks_to_fhew_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        lwe_key: RawHandle,
    ) -> EngineResult<()> {
        self.call("EvalCKKStoFHEWKeyGen", |table| {
            switching::keygen(table, cc, kp, lwe_key, false)
        })
    }

    fn ckks_to_fhew_precompute(&self, cc: RawHandle, scale: f64) -> EngineResult<()> {
        self.call("EvalCKKStoFHEWPrecompute", |table| {
            switching::precompute(table, cc, scale)
        })
    }

    fn ckks_to_fhew(
        &self,
        cc: RawHandle,
        ct: RawHandle,
        num_values: u32,
    ) -> EngineResult<Vec<RawHandle>> {
        self.call("EvalCKKStoFHEW", |table| {
            switching::ckks_to_fhew(table, cc, ct, num_values)
        })
    }

    fn fhew_to_ckks_setup(
        &self,
        cc: RawHandle,
        bin_cc: RawHandle,
        num_slots: u32,
        log_q: u32,
    ) -> EngineResult<()> {
        self.call("EvalFHEWtoCKKSSetup", |table| {
            switching::fhew_to_ckks_setup(table, cc, bin_cc, num_slots, log_q)
        })
    }

    fn fhew_to_ckks_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        lwe_key: RawHandle,
    ) -> EngineResult<()> {
        self.call("EvalFHEWtoCKKSKeyGen", |table| {
            switching::fhew_to_ckks_keygen(table, cc, kp, lwe_key)
        })
    }

    fn fhew_to_ckks(
        &self,
        cc: RawHandle,
        lwe_cts: &[RawHandle],
        num_slots: u32,
        p: u32,
        range: Option<(f64, f64)>,
    ) -> Alloc {
        self.alloc("EvalFHEWtoCKKS", |table| {
            switching::fhew_to_ckks(table, cc, lwe_cts, num_slots, p, range)
        })
    }

    fn scheme_switching_setup(&self, cc: RawHandle, params: RawHandle) -> Alloc {
        self.call("EvalSchemeSwitchingSetup", |table| {
            switching::setup(table, cc, params, true).map(Some)
        })
    }

    fn scheme_switching_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        lwe_key: RawHandle,
    ) -> EngineResult<()> {
        self.call("EvalSchemeSwitchingKeyGen", |table| {
            switching::keygen(table, cc, kp, lwe_key, true)
        })
    }

    fn bin_cc_for_scheme_switch(&self, cc: RawHandle) -> Alloc {
        self.call("GetBinCCForSchemeSwitch", |table| {
            match &table.context(cc)?.switch {
                Some(switch) => Ok(Some(switch.bin_cc)),
                None => Err(SimError::new(
                    "EvalCKKStoFHEWSetup or EvalSchemeSwitchingSetup must be called before \
                     GetBinCCForSchemeSwitch",
                )),
            }
        })
    }

    fn compare_switch_precompute(
        &self,
        cc: RawHandle,
        p_lwe: u32,
        scale_sign: f64,
    ) -> EngineResult<()> {
        self.call("EvalCompareSwitchPrecompute", |table| {
            switching::compare_precompute(table, cc, p_lwe, scale_sign)
        })
    }

    fn eval_compare_scheme_switching(
        &self,
        cc: RawHandle,
        a: RawHandle,
        b: RawHandle,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
    ) -> Alloc {
        self.alloc("EvalCompareSchemeSwitching", |table| {
            switching::compare(table, cc, a, b, num_values, num_slots, p_lwe, scale_sign)
        })
    }

    fn eval_min_max(
        &self,
        cc: RawHandle,
        request: MinMaxRequest,
    ) -> EngineResult<(Option<RawHandle>, Option<RawHandle>)> {
        self.call(request.op_name(), |table| {
            let (value, index) = switching::min_max(table, cc, &request)?;
            let value = table.insert(Object::Ciphertext(value))?;
            let index = table.insert(Object::Ciphertext(index))?;

            Ok((Some(value), Some(index)))
        })
    }

    fn serialize(&self, object: SerialObject<'_>, format: SerialFormat) -> EngineResult<Vec<u8>> {
        self.call("Serialize", |table| serial::serialize(table, object, format))
    }

    fn deserialize(&self, kind: SerialKind, blob: &[u8], format: SerialFormat) -> Alloc {
        self.call("Deserialize", |table| {
            serial::deserialize(table, kind, blob, format).map(Some)
        })
    }

    fn deserialize_eval_mult_key(
        &self,
        cc: RawHandle,
        blob: &[u8],
        format: SerialFormat,
    ) -> EngineResult<()> {
        self.call("DeserializeEvalMultKey", |table| {
            serial::load_eval_mult_key(table, cc, blob, format)
        })
    }
}

fn require_sum(ctx: &ContextObj, key_id: u64, batch_size: u32, op: &str) -> SimResult<()> {
    if !ctx.sum_keys.contains(&key_id) {
        return Err(SimError::new(format!(
            "{op}: EvalSumKey for the key tag [{}] was not found; call EvalSumKeyGen first",
            ContextObj::key_tag(key_id)
        )));
    }

    if !batch_size.is_power_of_two() || batch_size as usize > ctx.rotation_cycle() {
        return Err(SimError::new(format!(
            "{op}: batch size {batch_size} must be a power of two no larger than {}",
            ctx.rotation_cycle()
        )));
    }

    Ok(())
}

pub(super) fn with_noise(rng: &mut StdRng, values: &[C64], sigma: f64) -> SimResult<Vec<C64>> {
    if sigma <= 0.0 {
        return Ok(values.to_vec());
    }

    let normal = Normal::new(0.0, sigma).map_err(|e| SimError::new(e.to_string()))?;

    Ok(values
        .iter()
        .map(|v| v + C64::new(normal.sample(rng), normal.sample(rng)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryOp, Feature, ScalingTechnique, SecurityLevel, sim::SimBackend};

    fn bfv(engine: &SimPke) -> RawHandle {
        let params = engine.params_new(SchemeId::Bfv).unwrap().unwrap();
        engine
            .params_set(SchemeId::Bfv, params, ParamSetting::PlaintextModulus(65537))
            .unwrap();
        engine
            .params_set(SchemeId::Bfv, params, ParamSetting::MultiplicativeDepth(2))
            .unwrap();
        let cc = engine.context_new(SchemeId::Bfv, params).unwrap().unwrap();
        engine.params_destroy(SchemeId::Bfv, params);

        for feature in [Feature::Pke, Feature::KeySwitch, Feature::LeveledShe] {
            engine.enable(cc, feature).unwrap();
        }

        cc
    }

    #[test]
    fn features_gate_operations() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let params = engine.params_new(SchemeId::Bgv).unwrap().unwrap();
        engine
            .params_set(SchemeId::Bgv, params, ParamSetting::PlaintextModulus(65537))
            .unwrap();
        let cc = engine.context_new(SchemeId::Bgv, params).unwrap().unwrap();

        assert!(engine.keygen(cc).is_err());
        assert_eq!(
            engine.last_error().as_deref(),
            Some("KeyGen operation has not been enabled")
        );
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn packed_arithmetic_is_slotwise_mod_t() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bfv(&engine);
        let kp = engine.keygen(cc).unwrap().unwrap();
        engine.eval_mult_keygen(cc, kp).unwrap();

        let a = engine.make_packed_plaintext(cc, &[1, 2, 3, 4]).unwrap().unwrap();
        let b = engine.make_packed_plaintext(cc, &[5, 6, 7, 8]).unwrap().unwrap();
        let ca = engine.encrypt(cc, kp, a).unwrap().unwrap();
        let cb = engine.encrypt(cc, kp, b).unwrap().unwrap();

        let product = engine.eval_binary(cc, BinaryOp::Mult, ca, cb).unwrap().unwrap();
        let pt = engine.decrypt(cc, kp, product).unwrap().unwrap();
        engine.plaintext_set_length(pt, 4).unwrap();

        assert_eq!(engine.plaintext_packed_values(pt).unwrap(), vec![5, 12, 21, 32]);
        assert_eq!(engine.ciphertext_level(product).unwrap(), 1);
    }

    #[test]
    fn missing_mult_key_is_reported() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bfv(&engine);
        let kp = engine.keygen(cc).unwrap().unwrap();
        let pt = engine.make_packed_plaintext(cc, &[1]).unwrap().unwrap();
        let ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();

        assert!(engine.eval_binary(cc, BinaryOp::Mult, ct, ct).is_err());
        assert!(engine.last_error().unwrap().contains("EvalMultKeyGen"));
    }

    #[test]
    fn exact_rotation_stays_within_rows() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let cc = bfv(&engine);
        let n = engine.ring_dimension(cc).unwrap() as usize;
        let kp = engine.keygen(cc).unwrap().unwrap();
        engine.eval_rotate_keygen(cc, kp, &[1, -1]).unwrap();

        let values = (0..n as i64).map(|i| i % 1000).collect::<Vec<_>>();
        let pt = engine.make_packed_plaintext(cc, &values).unwrap().unwrap();
        let ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();
        let rotated = engine.eval_rotate(cc, ct, 1).unwrap().unwrap();
        let out = engine.decrypt(cc, kp, rotated).unwrap().unwrap();
        let out = engine.plaintext_packed_values(out).unwrap();

        assert_eq!(out[0], values[1]);
        assert_eq!(out[n / 2 - 1], values[0]);
        assert_eq!(out[n / 2], values[n / 2 + 1]);

        assert!(engine.eval_rotate(cc, ct, 2).is_err());
        assert!(engine.last_error().unwrap().contains("index [2]"));
    }

    #[test]
    fn manual_scaling_tracks_levels() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let params = engine.params_new(SchemeId::Ckks).unwrap().unwrap();
        for setting in [
            ParamSetting::MultiplicativeDepth(1),
            ParamSetting::ScalingModSize(50),
            ParamSetting::ScalingTechnique(ScalingTechnique::FixedManual),
            ParamSetting::SecurityLevel(SecurityLevel::HeStdNotSet),
            ParamSetting::RingDim(1024),
            ParamSetting::BatchSize(8),
        ] {
            engine.params_set(SchemeId::Ckks, params, setting).unwrap();
        }
        let cc = engine.context_new(SchemeId::Ckks, params).unwrap().unwrap();
        for feature in [Feature::Pke, Feature::LeveledShe] {
            engine.enable(cc, feature).unwrap();
        }
        let kp = engine.keygen(cc).unwrap().unwrap();
        engine.eval_mult_keygen(cc, kp).unwrap();

        let pt = engine.make_ckks_packed_plaintext(cc, &[0.5, 2.0]).unwrap().unwrap();
        let ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();
        let sq = engine.eval_binary(cc, BinaryOp::Mult, ct, ct).unwrap().unwrap();
        let rescaled = engine.rescale(cc, sq).unwrap().unwrap();

        assert_eq!(engine.ciphertext_level(rescaled).unwrap(), 1);
        assert!(engine.eval_binary(cc, BinaryOp::Mult, rescaled, rescaled).is_err());

        let out = engine.decrypt(cc, kp, rescaled).unwrap().unwrap();
        let out = engine.plaintext_real_values(out).unwrap();

        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[1] - 4.0).abs() < 1e-6);
    }

    fn bootstrappable(backend: &SimBackend) -> (RawHandle, RawHandle) {
        let engine = backend.pke();
        let depth = engine.bootstrap_depth(&[2, 2], SecretKeyDist::UniformTernary) + 4;
        let params = engine.params_new(SchemeId::Ckks).unwrap().unwrap();
        for setting in [
            ParamSetting::MultiplicativeDepth(depth),
            ParamSetting::ScalingModSize(20),
            ParamSetting::SecurityLevel(SecurityLevel::HeStdNotSet),
            ParamSetting::RingDim(1024),
            ParamSetting::BatchSize(8),
        ] {
            engine.params_set(SchemeId::Ckks, params, setting).unwrap();
        }
        let cc = engine.context_new(SchemeId::Ckks, params).unwrap().unwrap();
        for feature in [
            Feature::Pke,
            Feature::KeySwitch,
            Feature::LeveledShe,
            Feature::AdvancedShe,
            Feature::Fhe,
        ] {
            engine.enable(cc, feature).unwrap();
        }
        let kp = engine.keygen(cc).unwrap().unwrap();
        engine.eval_mult_keygen(cc, kp).unwrap();
        engine.bootstrap_setup(cc, &[2, 2]).unwrap();
        engine.bootstrap_keygen(cc, kp, 8).unwrap();

        (cc, kp)
    }

    #[test]
    fn bootstrapping_replaces_accumulated_noise() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let (cc, kp) = bootstrappable(&backend);

        let pt = engine.make_ckks_packed_plaintext(cc, &[1.0, -1.0]).unwrap().unwrap();
        let mut ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();
        for _ in 0..4 {
            ct = engine.eval_binary(cc, BinaryOp::Mult, ct, ct).unwrap().unwrap();
        }

        let noisy = backend.store.lock().ciphertext(ct).unwrap().noise;
        assert!(noisy > BOOTSTRAP_NOISE);

        let refreshed = engine.bootstrap(cc, ct).unwrap().unwrap();
        assert_eq!(
            backend.store.lock().ciphertext(refreshed).unwrap().noise,
            BOOTSTRAP_NOISE
        );
    }

    #[test]
    fn plaintext_factors_scale_the_noise() {
        let backend = SimBackend::new();
        let engine = backend.pke();
        let (cc, kp) = bootstrappable(&backend);

        let pt = engine.make_ckks_packed_plaintext(cc, &[1.0]).unwrap().unwrap();
        let ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();
        let small = engine.make_ckks_packed_plaintext(cc, &[0.5]).unwrap().unwrap();
        let large = engine.make_ckks_packed_plaintext(cc, &[64.0]).unwrap().unwrap();

        let by_small = engine
            .eval_binary_plain(cc, BinaryOp::Mult, ct, small)
            .unwrap()
            .unwrap();
        let by_large = engine
            .eval_binary_plain(cc, BinaryOp::Mult, ct, large)
            .unwrap()
            .unwrap();

        let table = backend.store.lock();
        let noise = |h| table.ciphertext(h).unwrap().noise;
        assert!(noise(by_large) > 16.0 * noise(by_small));
    }

    #[test]
    fn decryption_noise_is_reproducible() {
        let decrypt_once = || {
            let backend = SimBackend::new();
            let engine = backend.pke();
            let (cc, kp) = bootstrappable(&backend);

            let pt = engine.make_ckks_packed_plaintext(cc, &[0.25, 0.5]).unwrap().unwrap();
            let ct = engine.encrypt(cc, kp, pt).unwrap().unwrap();
            let out = engine.decrypt(cc, kp, ct).unwrap().unwrap();
            engine.plaintext_real_values(out).unwrap()
        };

        assert_eq!(decrypt_once(), decrypt_once());
    }
}
