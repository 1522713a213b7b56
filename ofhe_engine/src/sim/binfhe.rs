use std::collections::HashSet;

use log::{trace, warn};

use crate::{
    Alloc, BinFheEngine, BinFheMethod, BinFheParamSet, BinGate, EngineResult, RawHandle,
};

use super::{
    SimBinFhe, SimError, SimResult,
    objects::{BinContextObj, LweCtObj, LweKeyObj, LweParams, Object},
    store::Table,
    switching::lwe_key,
};

/// Encoding of a single bit on the torus.
fn bit_phase(bit: bool) -> f64 {
    if bit { 0.25 } else { 0.0 }
}

fn bit_of(ct: &LweCtObj) -> bool {
    ct.decode(4) == 1
}

fn generated(table: &Table, cc: RawHandle, op: &str) -> SimResult<(u64, LweParams)> {
    let ctx = table.bin_context(cc)?;

    match ctx.params {
        Some(params) => Ok((ctx.context_id, params)),
        None => Err(SimError::new(format!(
            "{op}: the BinFHE context has no parameters; call GenerateBinFHEContext first"
        ))),
    }
}

fn check_ct<'a>(
    table: &'a Table,
    context_id: u64,
    ct: RawHandle,
    op: &str,
) -> SimResult<&'a LweCtObj> {
    let ct = table.lwe_ciphertext(ct)?;

    if ct.context_id != context_id {
        return Err(SimError::new(format!(
            "{op}: the ciphertext was not created in this BinFHEContext"
        )));
    }

    Ok(ct)
}

fn require_bootstrap_key(table: &Table, cc: RawHandle, key_id: u64, op: &str) -> SimResult<()> {
    if table.bin_context(cc)?.bt_keys.contains(&key_id) {
        Ok(())
    } else {
        Err(SimError::new(format!(
            "{op}: bootstrapping keys have not been generated; call BTKeyGen first"
        )))
    }
}

fn decode_with(
    table: &Table,
    cc: RawHandle,
    key: LweKeyObj,
    ct: RawHandle,
    p: u64,
    op: &str,
) -> SimResult<u64> {
    let (context_id, params) = generated(table, cc, op)?;
    let ct = check_ct(table, context_id, ct, op)?;

    if p < 2 || p > params.q {
        return Err(SimError::new(format!(
            "{op}: plaintext modulus {p} must lie in [2, q = {}]",
            params.q
        )));
    }

    if key.context_id != context_id {
        return Err(SimError::new(format!(
            "{op}: the secret key was not generated in this BinFHEContext"
        )));
    }

    if key.key_id == ct.key_id {
        Ok(ct.decode(p))
    } else {
        Ok(rand::random::<u64>() % p)
    }
}

impl BinFheEngine for SimBinFhe {
    fn last_error(&self) -> Option<String> {
        self.errors.take()
    }

    fn context_new(&self) -> Alloc {
        self.alloc("BinFHEContext", |table| {
            Ok(Object::BinContext(BinContextObj {
                context_id: table.fresh_id(),
                params: None,
                owner: None,
                bt_keys: HashSet::new(),
            }))
        })
    }

    fn context_destroy(&self, cc: RawHandle) {
        let mut table = self.store.lock();

        let owner = table.bin_context(cc).ok().and_then(|ctx| ctx.owner);

        if let Some(owner) = owner {
            warn!("destroy called on BinFHE context {cc:?} owned by CKKS context {owner:?}");
            table.stats.borrowed_destroys += 1;
            return;
        }

        trace!("sim: destroying BinFHE context {cc:?}");
        table.remove(cc);
    }

    fn generate(
        &self,
        cc: RawHandle,
        param_set: BinFheParamSet,
        method: BinFheMethod,
    ) -> EngineResult<()> {
        self.call("GenerateBinFHEContext", |table| {
            if method == BinFheMethod::Invalid {
                return Err(SimError::new(
                    "GenerateBinFHEContext: INVALID_METHOD is not a bootstrapping method",
                ));
            }

            let ctx = table.bin_context_mut(cc)?;
            ctx.params = Some(LweParams::standard(param_set, method));
            ctx.bt_keys.clear();

            Ok(())
        })
    }

    fn keygen(&self, cc: RawHandle) -> Alloc {
        self.alloc("KeyGen", |table| {
            let (context_id, _) = generated(table, cc, "KeyGen")?;

            Ok(Object::BinSecretKey(LweKeyObj {
                key_id: table.fresh_id(),
                context_id,
            }))
        })
    }

    fn secret_key_destroy(&self, sk: RawHandle) {
        trace!("sim: destroying LWE secret key {sk:?}");
        self.store.lock().remove(sk);
    }

    fn bt_keygen(&self, cc: RawHandle, sk: RawHandle) -> EngineResult<()> {
        self.call("BTKeyGen", |table| {
            let (context_id, _) = generated(table, cc, "BTKeyGen")?;
            let key = lwe_key(table, sk)?;

            if key.context_id != context_id {
                return Err(SimError::new(
                    "BTKeyGen: the secret key was not generated in this BinFHEContext",
                ));
            }

            table.bin_context_mut(cc)?.bt_keys.insert(key.key_id);

            Ok(())
        })
    }

    fn encrypt(&self, cc: RawHandle, sk: RawHandle, bit: bool) -> Alloc {
        self.alloc("Encrypt", |table| {
            let (context_id, _) = generated(table, cc, "Encrypt")?;
            let key = *table.bin_secret_key(sk)?;

            if key.context_id != context_id {
                return Err(SimError::new(
                    "Encrypt: the secret key was not generated in this BinFHEContext",
                ));
            }

            Ok(Object::LweCiphertext(LweCtObj {
                context_id,
                key_id: key.key_id,
                phase: bit_phase(bit),
            }))
        })
    }

    fn ciphertext_destroy(&self, ct: RawHandle) {
        trace!("sim: destroying LWE ciphertext {ct:?}");
        self.store.lock().remove(ct);
    }

    fn eval_bin_gate(&self, cc: RawHandle, gate: BinGate, a: RawHandle, b: RawHandle) -> Alloc {
        self.alloc("EvalBinGate", |table| {
            let op = "EvalBinGate";
            let (context_id, _) = generated(table, cc, op)?;
            let a = check_ct(table, context_id, a, op)?;
            let b = check_ct(table, context_id, b, op)?;

            if a.key_id != b.key_id {
                return Err(SimError::new(format!(
                    "{op}: inputs were encrypted under different secret keys"
                )));
            }

            require_bootstrap_key(table, cc, a.key_id, op)?;

            let Some(bit) = gate.eval(bit_of(a), bit_of(b)) else {
                return Err(SimError::new(format!(
                    "{op}: {gate:?} takes three or more inputs"
                )));
            };

            Ok(Object::LweCiphertext(LweCtObj {
                context_id,
                key_id: a.key_id,
                phase: bit_phase(bit),
            }))
        })
    }

    fn eval_not(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalNOT", |table| {
            let (context_id, _) = generated(table, cc, "EvalNOT")?;
            let ct = check_ct(table, context_id, ct, "EvalNOT")?;

            Ok(Object::LweCiphertext(LweCtObj {
                phase: 0.25 - ct.phase,
                ..*ct
            }))
        })
    }

    fn bootstrap(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("Bootstrap", |table| {
            let (context_id, _) = generated(table, cc, "Bootstrap")?;
            let ct = check_ct(table, context_id, ct, "Bootstrap")?;
            require_bootstrap_key(table, cc, ct.key_id, "Bootstrap")?;

            Ok(Object::LweCiphertext(LweCtObj {
                phase: bit_phase(bit_of(ct)),
                ..*ct
            }))
        })
    }

    fn decrypt(&self, cc: RawHandle, sk: RawHandle, ct: RawHandle) -> EngineResult<bool> {
        self.call("Decrypt", |table| {
            let key = *table.bin_secret_key(sk)?;
            Ok(decode_with(table, cc, key, ct, 4, "Decrypt")? == 1)
        })
    }

    fn decrypt_modulus(
        &self,
        cc: RawHandle,
        sk: RawHandle,
        ct: RawHandle,
        p: u64,
    ) -> EngineResult<u64> {
        self.call("Decrypt", |table| {
            let key = *table.bin_secret_key(sk)?;
            decode_with(table, cc, key, ct, p, "Decrypt")
        })
    }

    fn decrypt_modulus_lwe_key(
        &self,
        cc: RawHandle,
        lwe_key_handle: RawHandle,
        ct: RawHandle,
        p: u64,
    ) -> EngineResult<u64> {
        self.call("Decrypt", |table| {
            let key = lwe_key(table, lwe_key_handle)?;
            decode_with(table, cc, key, ct, p, "Decrypt")
        })
    }

    fn max_plaintext_space(&self, cc: RawHandle) -> EngineResult<u32> {
        self.call("GetMaxPlaintextSpace", |table| {
            Ok(generated(table, cc, "GetMaxPlaintextSpace")?.1.max_plaintext_space())
        })
    }

    fn lwe_dimension(&self, cc: RawHandle) -> EngineResult<u32> {
        self.call("Getn", |table| Ok(generated(table, cc, "Getn")?.1.n))
    }

    fn lwe_modulus(&self, cc: RawHandle) -> EngineResult<u64> {
        self.call("Getq", |table| Ok(generated(table, cc, "Getq")?.1.q))
    }

    fn beta(&self, cc: RawHandle) -> EngineResult<u32> {
        self.call("GetBeta", |table| Ok(generated(table, cc, "GetBeta")?.1.beta))
    }

    fn eval_sign(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalSign", |table| {
            let (context_id, _) = generated(table, cc, "EvalSign")?;
            let ct = check_ct(table, context_id, ct, "EvalSign")?;
            require_bootstrap_key(table, cc, ct.key_id, "EvalSign")?;

            Ok(Object::LweCiphertext(LweCtObj {
                phase: bit_phase(ct.phase.rem_euclid(1.0) >= 0.5),
                ..*ct
            }))
        })
    }

    fn eval_floor(&self, cc: RawHandle, ct: RawHandle, bits: u32) -> Alloc {
        self.alloc("EvalFloor", |table| {
            let (context_id, params) = generated(table, cc, "EvalFloor")?;
            let ct = check_ct(table, context_id, ct, "EvalFloor")?;
            require_bootstrap_key(table, cc, ct.key_id, "EvalFloor")?;

            if bits >= params.q.ilog2() {
                return Err(SimError::new(format!(
                    "EvalFloor: cannot round off {bits} bits of a {}-bit modulus",
                    params.q.ilog2()
                )));
            }

            let q = params.q;
            let floored = ct.decode(q) & !((1u64 << bits) - 1);

            Ok(Object::LweCiphertext(LweCtObj {
                phase: floored as f64 / q as f64,
                ..*ct
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBackend;

    fn toy(engine: &SimBinFhe) -> (RawHandle, RawHandle) {
        let cc = engine.context_new().unwrap().unwrap();
        engine
            .generate(cc, BinFheParamSet::Toy, BinFheMethod::Ginx)
            .unwrap();
        let sk = engine.keygen(cc).unwrap().unwrap();
        engine.bt_keygen(cc, sk).unwrap();

        (cc, sk)
    }

    #[test]
    fn gates_follow_truth_tables() {
        let backend = SimBackend::new();
        let engine = backend.binfhe();
        let (cc, sk) = toy(&engine);

        for a in [false, true] {
            for b in [false, true] {
                let ca = engine.encrypt(cc, sk, a).unwrap().unwrap();
                let cb = engine.encrypt(cc, sk, b).unwrap().unwrap();

                for gate in [BinGate::And, BinGate::Or, BinGate::Nand, BinGate::Xor] {
                    let out = engine.eval_bin_gate(cc, gate, ca, cb).unwrap().unwrap();
                    let expected = gate.eval(a, b).unwrap();
                    assert_eq!(engine.decrypt(cc, sk, out).unwrap(), expected, "{gate:?}");
                }

                let not = engine.eval_not(cc, ca).unwrap().unwrap();
                assert_eq!(engine.decrypt(cc, sk, not).unwrap(), !a);
            }
        }
    }

    #[test]
    fn wide_gates_are_rejected() {
        let backend = SimBackend::new();
        let engine = backend.binfhe();
        let (cc, sk) = toy(&engine);
        let ct = engine.encrypt(cc, sk, true).unwrap().unwrap();

        assert!(engine.eval_bin_gate(cc, BinGate::Majority, ct, ct).is_err());
        assert!(engine.last_error().unwrap().contains("Majority"));
    }

    #[test]
    fn gates_need_bootstrapping_keys() {
        let backend = SimBackend::new();
        let engine = backend.binfhe();
        let cc = engine.context_new().unwrap().unwrap();
        engine
            .generate(cc, BinFheParamSet::Toy, BinFheMethod::Ginx)
            .unwrap();
        let sk = engine.keygen(cc).unwrap().unwrap();
        let ct = engine.encrypt(cc, sk, true).unwrap().unwrap();

        assert!(engine.eval_bin_gate(cc, BinGate::And, ct, ct).is_err());
        assert!(engine.last_error().unwrap().contains("BTKeyGen"));

        // Negation needs no key.
        assert!(engine.eval_not(cc, ct).is_ok());
    }

    #[test]
    fn toy_parameters_are_reported() {
        let backend = SimBackend::new();
        let engine = backend.binfhe();
        let (cc, _) = toy(&engine);

        assert_eq!(engine.lwe_dimension(cc).unwrap(), 32);
        assert_eq!(engine.lwe_modulus(cc).unwrap(), 1024);
        assert_eq!(engine.beta(cc).unwrap(), 128);
        assert_eq!(engine.max_plaintext_space(cc).unwrap(), 4);
    }

    #[test]
    fn ungenerated_context_fails_cleanly() {
        let backend = SimBackend::new();
        let engine = backend.binfhe();
        let cc = engine.context_new().unwrap().unwrap();

        assert!(engine.keygen(cc).is_err());
        assert!(engine.last_error().unwrap().contains("GenerateBinFHEContext"));
    }
}
