//! CKKS and FHEW scheme switching, comparisons and min/max.
use std::collections::HashSet;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Extremum, Feature, MinMaxRequest, Precision, RawHandle, SchemeId};

use super::{
    SimError, SimResult,
    objects::{
        BinContextObj, C64, CiphertextObj, ContextObj, FhewToCkksState, LweCtObj, LweKeyObj,
        LweParams, Object, SchSwchObj, Slots, SwitchState,
    },
    pke::{check_ciphertext, private_half, require, same_context},
    store::Table,
};

/// Depth a scheme-switching comparison of two values consumes; each doubling
/// of the value count adds one level.
const MIN_MAX_BASE_DEPTH: u32 = 13;

/// Approximation error of values packed back into CKKS.
const SWITCH_NOISE: f64 = 1e-6;

/// Approximation error of the standard min/max; the alt variant is tighter.
const MIN_MAX_NOISE: f64 = 1e-5;
const MIN_MAX_ALT_NOISE: f64 = 1e-7;

fn setup_ops(bidirectional: bool) -> (&'static str, &'static str) {
    if bidirectional {
        ("EvalSchemeSwitchingSetup", "EvalSchemeSwitchingKeyGen")
    } else {
        ("EvalCKKStoFHEWSetup", "EvalCKKStoFHEWKeyGen")
    }
}

fn ckks_only(ctx: &ContextObj, op: &str) -> SimResult<()> {
    if ctx.scheme() == SchemeId::Ckks {
        Ok(())
    } else {
        Err(SimError::new(format!(
            "{op}: scheme switching is only supported for CKKS, not {}",
            ctx.scheme().name()
        )))
    }
}

/// Either kind of LWE secret: one produced by a scheme-switching setup or one
/// generated in a binary-gate context.
pub(super) fn lwe_key(table: &Table, handle: RawHandle) -> SimResult<LweKeyObj> {
    match table.get(handle) {
        Some(Object::LwePrivateKey(key)) | Some(Object::BinSecretKey(key)) => Ok(*key),
        _ => Err(SimError::invalid_handle("LWEPrivateKey")),
    }
}

pub(super) fn setup(
    table: &mut Table,
    cc: RawHandle,
    params: RawHandle,
    bidirectional: bool,
) -> SimResult<RawHandle> {
    let (op, _) = setup_ops(bidirectional);
    let params = *table.schswch(params)?;
    let ctx = table.context(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;
    ckks_only(ctx, op)?;

    let slot_count = ctx.slot_count() as u32;
    let num_slots = match params.num_slots_ckks {
        0 => slot_count,
        n => n,
    };

    if num_slots > slot_count {
        return Err(SimError::new(format!(
            "{op}: {num_slots} slots exceed the {slot_count} slots of the CryptoContext"
        )));
    }

    let previous = ctx.switch.as_ref().map(|s| s.bin_cc);

    let bin_context_id = table.fresh_id();
    let lwe_params = LweParams::large_precision(
        params.security_level_fhew,
        params.ctxt_mod_size_fhew_large_prec,
    );
    let bin_cc = table.insert(Object::BinContext(BinContextObj {
        context_id: bin_context_id,
        params: Some(lwe_params),
        owner: Some(cc),
        bt_keys: HashSet::new(),
    }))?;

    let lwe_key_id = table.fresh_id();
    let lwe_key = table.insert(Object::LwePrivateKey(LweKeyObj {
        key_id: lwe_key_id,
        context_id: bin_context_id,
    }))?;

    if let Some(previous) = previous {
        table.remove_internal(previous);
    }

    let num_values = match params.num_values {
        0 => num_slots,
        n => n,
    };

    table.context_mut(cc)?.switch = Some(SwitchState {
        params: SchSwchObj {
            num_slots_ckks: num_slots,
            num_values,
            ..params
        },
        bin_cc,
        lwe_key_id,
        bidirectional,
        keys_for: None,
        scale: None,
        compare: None,
        num_slots,
    });

    Ok(lwe_key)
}

pub(super) fn keygen(
    table: &mut Table,
    cc: RawHandle,
    kp: RawHandle,
    lwe_key: RawHandle,
    bidirectional: bool,
) -> SimResult<()> {
    let (setup_op, op) = setup_ops(bidirectional);
    let key = private_half(table, kp, op)?;
    let lwe = lwe_key_of(table, lwe_key)?;

    let ctx = table.context_mut(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;
    same_context(ctx, key.context_id, "private key", op)?;

    let num_slots = ctx.switch.as_ref().map(|s| s.num_slots);
    let Some(switch) = ctx
        .switch
        .as_mut()
        .filter(|s| s.bidirectional || !bidirectional)
    else {
        return Err(SimError::new(format!(
            "{setup_op} must be called before {op}"
        )));
    };

    if lwe.key_id != switch.lwe_key_id {
        return Err(SimError::new(format!(
            "{op}: the LWE private key does not belong to this scheme-switching setup"
        )));
    }

    switch.keys_for = Some(key.key_id);
    let bin_cc = switch.bin_cc;
    let log_q = switch.params.ctxt_mod_size_fhew_large_prec;

    if bidirectional {
        ctx.fhew_to_ckks = Some(FhewToCkksState {
            bin_context_id: lwe.context_id,
            num_slots: num_slots.unwrap_or_default(),
            log_q,
            keys_for: Some((key.key_id, lwe.key_id)),
        });

        table.bin_context_mut(bin_cc)?.bt_keys.insert(lwe.key_id);
    }

    Ok(())
}

fn lwe_key_of(table: &Table, handle: RawHandle) -> SimResult<LweKeyObj> {
    table.lwe_private_key(handle).copied()
}

pub(super) fn precompute(table: &mut Table, cc: RawHandle, scale: f64) -> SimResult<()> {
    let op = "EvalCKKStoFHEWPrecompute";
    let ctx = table.context_mut(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;

    let Some(switch) = ctx.switch.as_mut().filter(|s| s.keys_for.is_some()) else {
        return Err(SimError::new(format!(
            "EvalCKKStoFHEWKeyGen must be called before {op}"
        )));
    };

    if !scale.is_finite() || scale == 0.0 {
        return Err(SimError::new(format!(
            "{op}: scale {scale} must be finite and non-zero"
        )));
    }

    switch.scale = Some(scale);

    Ok(())
}

fn check_switch_key(switch: &SwitchState, ct: &CiphertextObj, op: &str) -> SimResult<()> {
    if switch.keys_for == Some(ct.key_id) {
        Ok(())
    } else {
        Err(SimError::new(format!(
            "{op}: the ciphertext was not encrypted under the key the switching keys were \
             generated for"
        )))
    }
}

fn complex_slots<'a>(ct: &'a CiphertextObj, op: &str) -> SimResult<&'a [C64]> {
    match &ct.slots {
        Slots::Complex(values) => Ok(values),
        Slots::Int(_) => Err(SimError::new(format!("{op}: not a CKKS ciphertext"))),
    }
}

pub(super) fn ckks_to_fhew(
    table: &mut Table,
    cc: RawHandle,
    ct: RawHandle,
    num_values: u32,
) -> SimResult<Vec<RawHandle>> {
    let op = "EvalCKKStoFHEW";
    let ctx = table.context(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;

    let Some(switch) = ctx.switch.as_ref() else {
        return Err(SimError::new(format!(
            "EvalCKKStoFHEWSetup must be called before {op}"
        )));
    };

    let Some(scale) = switch.scale else {
        return Err(SimError::new(format!(
            "EvalCKKStoFHEWPrecompute must be called before {op}"
        )));
    };

    let ct = check_ciphertext(table, ctx, ct, op)?;
    check_switch_key(switch, ct, op)?;
    let values = complex_slots(ct, op)?;

    let n = match num_values {
        0 => switch.num_slots as usize,
        n => n as usize,
    };

    if n > values.len() {
        return Err(SimError::new(format!(
            "{op}: {n} values requested but the ciphertext holds {}",
            values.len()
        )));
    }

    let phases = values[..n].iter().map(|v| v.re * scale).collect::<Vec<_>>();
    let key_id = switch.lwe_key_id;
    let context_id = table.bin_context(switch.bin_cc)?.context_id;

    phases
        .into_iter()
        .map(|phase| {
            table.insert(Object::LweCiphertext(LweCtObj {
                context_id,
                key_id,
                phase,
            }))
        })
        .collect()
}

pub(super) fn fhew_to_ckks_setup(
    table: &mut Table,
    cc: RawHandle,
    bin_cc: RawHandle,
    num_slots: u32,
    log_q: u32,
) -> SimResult<()> {
    let op = "EvalFHEWtoCKKSSetup";
    let bin = table.bin_context(bin_cc)?;

    let Some(lwe) = bin.params else {
        return Err(SimError::new(format!(
            "{op}: the BinFHE context has no parameters; call GenerateBinFHEContext first"
        )));
    };

    let bin_context_id = bin.context_id;
    let ctx = table.context_mut(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;
    ckks_only(ctx, op)?;

    let slot_count = ctx.slot_count() as u32;
    let num_slots = match num_slots {
        0 => slot_count,
        n => n,
    };

    if num_slots > slot_count {
        return Err(SimError::new(format!(
            "{op}: {num_slots} slots exceed the {slot_count} slots of the CryptoContext"
        )));
    }

    let log_q = match log_q {
        0 => lwe.q.ilog2(),
        n => n,
    };

    ctx.fhew_to_ckks = Some(FhewToCkksState {
        bin_context_id,
        num_slots,
        log_q,
        keys_for: None,
    });

    Ok(())
}

pub(super) fn fhew_to_ckks_keygen(
    table: &mut Table,
    cc: RawHandle,
    kp: RawHandle,
    lwe_key_handle: RawHandle,
) -> SimResult<()> {
    let op = "EvalFHEWtoCKKSKeyGen";
    let key = private_half(table, kp, op)?;
    let lwe = lwe_key(table, lwe_key_handle)?;

    let ctx = table.context_mut(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;
    same_context(ctx, key.context_id, "private key", op)?;

    let Some(state) = ctx.fhew_to_ckks.as_mut() else {
        return Err(SimError::new(format!(
            "EvalFHEWtoCKKSSetup must be called before {op}"
        )));
    };

    if lwe.context_id != state.bin_context_id {
        return Err(SimError::new(format!(
            "{op}: the LWE secret key was not generated in the BinFHE context passed to \
             EvalFHEWtoCKKSSetup"
        )));
    }

    state.keys_for = Some((key.key_id, lwe.key_id));

    Ok(())
}

pub(super) fn fhew_to_ckks(
    table: &Table,
    cc: RawHandle,
    lwe_cts: &[RawHandle],
    num_slots: u32,
    p: u32,
    range: Option<(f64, f64)>,
) -> SimResult<Object> {
    let op = "EvalFHEWtoCKKS";
    let ctx = table.context(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;

    let Some(state) = ctx.fhew_to_ckks.as_ref() else {
        return Err(SimError::new(format!(
            "EvalFHEWtoCKKSSetup must be called before {op}"
        )));
    };

    let Some((ckks_key, lwe_key_id)) = state.keys_for else {
        return Err(SimError::new(format!(
            "EvalFHEWtoCKKSKeyGen must be called before {op}"
        )));
    };

    if lwe_cts.is_empty() {
        return Err(SimError::new(format!("{op}: LWE ciphertext array is empty")));
    }

    if p < 2 {
        return Err(SimError::new(format!(
            "{op}: plaintext modulus {p} must be at least 2"
        )));
    }

    let num_slots = match num_slots {
        0 => state.num_slots,
        n => n,
    } as usize;

    if lwe_cts.len() > num_slots {
        return Err(SimError::new(format!(
            "{op}: {} ciphertexts do not fit in {num_slots} slots",
            lwe_cts.len()
        )));
    }

    let (pmin, pmax) = range.unwrap_or((0.0, p as f64));

    if pmin >= pmax {
        return Err(SimError::new(format!(
            "{op}: the output range [{pmin}, {pmax}) is empty"
        )));
    }

    // Decoding under a foreign key yields values that look uniformly random.
    let mut rng = StdRng::seed_from_u64(lwe_key_id);
    let mut values = vec![C64::new(0.0, 0.0); ctx.slot_count()];

    for (i, handle) in lwe_cts.iter().enumerate() {
        let ct = table.lwe_ciphertext(*handle)?;

        if ct.context_id != state.bin_context_id {
            return Err(SimError::new(format!(
                "{op}: LWE ciphertext {i} was not created in the BinFHE context passed to \
                 EvalFHEWtoCKKSSetup"
            )));
        }

        let m = if ct.key_id == lwe_key_id {
            ct.decode(p as u64)
        } else {
            rng.gen_range(0..p as u64)
        };

        let mut v = m as f64;
        if v >= pmax {
            v -= p as f64;
        }

        values[i] = C64::new(v, 0.0);
    }

    Ok(Object::Ciphertext(CiphertextObj {
        context_id: ctx.context_id,
        scheme: SchemeId::Ckks,
        key_id: ckks_key,
        slots: Slots::Complex(values),
        level: 0,
        scale_degree: 1,
        modulus: 0,
        noise: SWITCH_NOISE,
    }))
}

pub(super) fn compare_precompute(
    table: &mut Table,
    cc: RawHandle,
    p_lwe: u32,
    scale_sign: f64,
) -> SimResult<()> {
    let op = "EvalCompareSwitchPrecompute";
    let ctx = table.context_mut(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;

    let Some(switch) = ctx
        .switch
        .as_mut()
        .filter(|s| s.bidirectional && s.keys_for.is_some())
    else {
        return Err(SimError::new(format!(
            "EvalSchemeSwitchingKeyGen must be called before {op}"
        )));
    };

    if !scale_sign.is_finite() || scale_sign <= 0.0 {
        return Err(SimError::new(format!(
            "{op}: scale {scale_sign} must be positive"
        )));
    }

    switch.compare = Some((p_lwe, scale_sign));

    Ok(())
}

/// The switching state, once bidirectional keys and the comparison
/// precomputation are in place.
fn comparison_ready<'a>(ctx: &'a ContextObj, op: &str) -> SimResult<&'a SwitchState> {
    let Some(switch) = ctx
        .switch
        .as_ref()
        .filter(|s| s.bidirectional && s.keys_for.is_some())
    else {
        return Err(SimError::new(format!(
            "EvalSchemeSwitchingKeyGen must be called before {op}"
        )));
    };

    if switch.compare.is_none() {
        return Err(SimError::new(format!(
            "EvalCompareSwitchPrecompute must be called before {op}"
        )));
    }

    Ok(switch)
}

fn check_value_count(
    num_values: u32,
    num_slots: u32,
    slot_count: usize,
    op: &str,
) -> SimResult<()> {
    if num_values == 0 || !num_values.is_power_of_two() || num_values > num_slots {
        return Err(SimError::new(format!(
            "{op}: the number of values ({num_values}) must be a power of two no larger than \
             the number of slots ({num_slots})"
        )));
    }

    if num_slots as usize > slot_count {
        return Err(SimError::new(format!(
            "{op}: {num_slots} slots exceed the {slot_count} slots of the CryptoContext"
        )));
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(super) fn compare(
    table: &Table,
    cc: RawHandle,
    a: RawHandle,
    b: RawHandle,
    num_values: u32,
    num_slots: u32,
    _p_lwe: u32,
    scale_sign: f64,
) -> SimResult<Object> {
    let op = "EvalCompareSchemeSwitching";
    let ctx = table.context(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;
    let switch = comparison_ready(ctx, op)?;

    if !scale_sign.is_finite() || scale_sign <= 0.0 {
        return Err(SimError::new(format!(
            "{op}: scale {scale_sign} must be positive"
        )));
    }

    let a = check_ciphertext(table, ctx, a, op)?;
    let b = check_ciphertext(table, ctx, b, op)?;
    check_switch_key(switch, a, op)?;
    check_switch_key(switch, b, op)?;

    let num_slots = match num_slots {
        0 => switch.num_slots,
        n => n,
    };
    let num_values = match num_values {
        0 => num_slots,
        n => n,
    };

    if num_values > num_slots || num_slots as usize > ctx.slot_count() {
        return Err(SimError::new(format!(
            "{op}: {num_values} values do not fit in {num_slots} slots"
        )));
    }

    let (lhs, rhs) = (complex_slots(a, op)?, complex_slots(b, op)?);
    let mut values = vec![C64::new(0.0, 0.0); ctx.slot_count()];

    for (i, out) in values.iter_mut().enumerate().take(num_values as usize) {
        if lhs[i].re < rhs[i].re {
            *out = C64::new(1.0, 0.0);
        }
    }

    Ok(Object::Ciphertext(CiphertextObj {
        context_id: ctx.context_id,
        scheme: SchemeId::Ckks,
        key_id: a.key_id,
        slots: Slots::Complex(values),
        level: a.level.max(b.level),
        scale_degree: 1,
        modulus: 0,
        noise: SWITCH_NOISE,
    }))
}

/// Computes the extremum and its index. Ties resolve to the lowest index.
pub(super) fn min_max(
    table: &Table,
    cc: RawHandle,
    request: &MinMaxRequest,
) -> SimResult<(CiphertextObj, CiphertextObj)> {
    let op = request.op_name();
    let ctx = table.context(cc)?;
    require(ctx, Feature::SchemeSwitch, op)?;
    let switch = comparison_ready(ctx, op)?;

    if !switch.params.compute_argmin {
        return Err(SimError::new(format!(
            "{op}: ComputeArgmin must be set in SchSwchParams before EvalSchemeSwitchingSetup"
        )));
    }

    if !request.scale_sign.is_finite() || request.scale_sign <= 0.0 {
        return Err(SimError::new(format!(
            "{op}: scale {} must be positive",
            request.scale_sign
        )));
    }

    let ct = check_ciphertext(table, ctx, request.ciphertext, op)?;
    check_switch_key(switch, ct, op)?;
    let public_key = table.public_key(request.public_key)?;
    same_context(ctx, public_key.context_id, "public key", op)?;

    let num_slots = match request.num_slots {
        0 => switch.num_slots,
        n => n,
    };
    let num_values = request.num_values;
    check_value_count(num_values, num_slots, ctx.slot_count(), op)?;

    let needed = MIN_MAX_BASE_DEPTH + num_values.ilog2();

    if ctx.depth() < needed {
        return Err(SimError::new(format!(
            "{op}: comparing {num_values} values needs a multiplicative depth of at least \
             {needed}, the context has {}",
            ctx.depth()
        )));
    }

    let values = complex_slots(ct, op)?;
    let candidates = &values[..num_values as usize];

    let best = (1..candidates.len()).fold(0, |best, i| {
        let better = match request.extremum {
            Extremum::Min => candidates[i].re < candidates[best].re,
            Extremum::Max => candidates[i].re > candidates[best].re,
        };
        if better { i } else { best }
    });

    let slot_count = ctx.slot_count();
    let value_slots = vec![C64::new(candidates[best].re, 0.0); slot_count];
    let index_slots = if switch.params.one_hot_encoding {
        let mut one_hot = vec![C64::new(0.0, 0.0); slot_count];
        one_hot[best] = C64::new(1.0, 0.0);
        one_hot
    } else {
        vec![C64::new(best as f64, 0.0); slot_count]
    };

    let noise = match request.precision {
        Precision::Standard => MIN_MAX_NOISE,
        Precision::Alt => MIN_MAX_ALT_NOISE,
    };

    let result = |slots| CiphertextObj {
        context_id: ctx.context_id,
        scheme: SchemeId::Ckks,
        key_id: ct.key_id,
        slots: Slots::Complex(slots),
        level: needed.min(ctx.depth()),
        scale_degree: 1,
        modulus: 0,
        noise,
    };

    Ok((result(value_slots), result(index_slots)))
}
