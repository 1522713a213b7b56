//! The engine adapter over the `ofhe_bridge` C library.
//!
//! # Remarks
//! The bridge reports failures through call-scoped error structs. The adapter
//! copies each message into the subsystem's [`ErrorChannel`] and releases the
//! bridge's allocation before returning, so no bridge-owned string outlives the
//! call that produced it.
//!
//! # Safety
//! Every handle passed to the bridge must have been produced by the bridge and
//! not yet released. The binding layer above upholds this by construction; the
//! adapter itself cannot check it.
use std::{
    ffi::{CStr, CString, c_char, c_int},
    ptr,
    sync::Arc,
};

use log::{debug, trace};
use num::Complex;

use crate::{
    Alloc, BinFheEngine, BinFheMethod, BinFheParamSet, BinGate, BinaryOp, EngineResult,
    ErrorChannel, Extremum, Feature, MinMaxRequest, ParamSetting, PkeEngine, Precision,
    RawHandle, SchSwchSetting, SchSwchSummary, SchemeId, SecretKeyDist, SecurityLevel,
    SerialFormat, SerialKind, SerialObject,
};

mod ffi;

use ffi::Ptr;

const UNKNOWN_PKE_ERROR: &str = "unknown PKE C++ error";
const UNKNOWN_BINFHE_ERROR: &str = "unknown BinFHE C++ error";

/// Copies a bridge-allocated C string and releases it with `free`.
///
/// # Safety
/// `msg` must be null or a NUL-terminated string allocated by the bridge.
unsafe fn take_message(
    msg: *mut c_char,
    free: unsafe extern "C" fn(*mut c_char),
) -> Option<String> {
    if msg.is_null() {
        return None;
    }

    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned();
    unsafe { free(msg) };

    Some(text)
}

fn c_len(errors: &ErrorChannel, op: &str, len: usize) -> EngineResult<c_int> {
    c_int::try_from(len)
        .or_else(|_| errors.fail(format!("{op}: input of {len} elements is too long")))
}

fn format_code(format: SerialFormat) -> c_int {
    match format {
        SerialFormat::Json => 0,
        SerialFormat::Binary => 1,
    }
}

fn enum_code(value: u32) -> c_int {
    value as c_int
}

/// The lattice-scheme subsystem of the native engine.
pub struct NativePke {
    errors: ErrorChannel,
}

impl NativePke {
    fn check(&self, op: &str, err: ffi::PKEErr) -> EngineResult<()> {
        let message = unsafe { take_message(err.msg, ffi::FreePKE_ErrMsg) };

        if err.code == 0 {
            return Ok(());
        }

        let message = message.unwrap_or_else(|| UNKNOWN_PKE_ERROR.to_owned());
        debug!("native engine: {op} failed: {message}");

        self.errors.fail(message)
    }

    fn alloc(&self, op: &str, f: impl FnOnce(*mut Ptr) -> ffi::PKEErr) -> Alloc {
        let mut out: Ptr = ptr::null_mut();
        let err = f(&mut out);
        self.check(op, err)?;

        Ok(RawHandle::from_ptr(out))
    }

    fn take_string(
        &self,
        op: &str,
        f: impl FnOnce(*mut *mut c_char) -> ffi::PKEErr,
    ) -> EngineResult<String> {
        let mut out: *mut c_char = ptr::null_mut();
        let err = f(&mut out);
        self.check(op, err)?;

        match unsafe { take_message(out, ffi::FreeString) } {
            Some(s) => Ok(s),
            None => self.errors.fail(format!("{op}: returned OK but no string")),
        }
    }

    fn take_buffer(
        &self,
        op: &str,
        f: impl FnOnce(*mut *mut u8, *mut usize) -> ffi::PKEErr,
    ) -> EngineResult<Vec<u8>> {
        let mut out: *mut u8 = ptr::null_mut();
        let mut len = 0usize;
        let err = f(&mut out, &mut len);
        self.check(op, err)?;

        if out.is_null() {
            return self.errors.fail(format!("{op}: returned OK but no buffer"));
        }

        let bytes = unsafe { std::slice::from_raw_parts(out, len) }.to_vec();
        unsafe { ffi::FreeBuffer(out) };

        Ok(bytes)
    }

    fn ckks_only(&self, scheme: SchemeId, setting: &ParamSetting) -> EngineResult<()> {
        self.errors.fail(format!(
            "{} is not a parameter of the {} scheme",
            &setting.name()[3..],
            scheme.name()
        ))
    }

    fn values<T: Default>(
        &self,
        op: &str,
        len: impl FnOnce(*mut c_int) -> ffi::PKEErr,
        mut at: impl FnMut(c_int, *mut T) -> ffi::PKEErr,
    ) -> EngineResult<Vec<T>> {
        let mut n: c_int = 0;
        let err = len(&mut n);
        self.check(op, err)?;

        (0..n.max(0))
            .map(|i| {
                let mut value = T::default();
                let err = at(i, &mut value);
                self.check(op, err).map(|_| value)
            })
            .collect()
    }
}

impl PkeEngine for NativePke {
    fn last_error(&self) -> Option<String> {
        self.errors.take()
    }

    fn params_new(&self, scheme: SchemeId) -> Alloc {
        self.alloc("NewParams", |out| unsafe {
            match scheme {
                SchemeId::Bfv => ffi::NewParamsBFV(out),
                SchemeId::Bgv => ffi::NewParamsBGV(out),
                SchemeId::Ckks => ffi::NewParamsCKKS(out),
            }
        })
    }

    fn params_set(
        &self,
        scheme: SchemeId,
        params: RawHandle,
        setting: ParamSetting,
    ) -> EngineResult<()> {
        let p = params.as_ptr();
        trace!("{} on {scheme:?} parameters", setting.name());

        let err = unsafe {
            match (scheme, setting) {
                (SchemeId::Bfv, ParamSetting::PlaintextModulus(t)) => {
                    ffi::ParamsBFV_SetPlaintextModulus(p, t)
                }
                (SchemeId::Bgv, ParamSetting::PlaintextModulus(t)) => {
                    ffi::ParamsBGV_SetPlaintextModulus(p, t)
                }
                (SchemeId::Bfv, ParamSetting::MultiplicativeDepth(d)) => {
                    ffi::ParamsBFV_SetMultiplicativeDepth(p, d as c_int)
                }
                (SchemeId::Bgv, ParamSetting::MultiplicativeDepth(d)) => {
                    ffi::ParamsBGV_SetMultiplicativeDepth(p, d as c_int)
                }
                (SchemeId::Ckks, ParamSetting::MultiplicativeDepth(d)) => {
                    ffi::ParamsCKKS_SetMultiplicativeDepth(p, d as c_int)
                }
                (SchemeId::Bfv, ParamSetting::SecurityLevel(l)) => {
                    ffi::ParamsBFV_SetSecurityLevel(p, enum_code(l.to_u32()))
                }
                (SchemeId::Bgv, ParamSetting::SecurityLevel(l)) => {
                    ffi::ParamsBGV_SetSecurityLevel(p, enum_code(l.to_u32()))
                }
                (SchemeId::Ckks, ParamSetting::SecurityLevel(l)) => {
                    ffi::ParamsCKKS_SetSecurityLevel(p, enum_code(l.to_u32()))
                }
                (SchemeId::Bfv, ParamSetting::RingDim(n)) => ffi::ParamsBFV_SetRingDim(p, n),
                (SchemeId::Bgv, ParamSetting::RingDim(n)) => ffi::ParamsBGV_SetRingDim(p, n),
                (SchemeId::Ckks, ParamSetting::RingDim(n)) => ffi::ParamsCKKS_SetRingDim(p, n),
                (SchemeId::Ckks, ParamSetting::ScalingModSize(b)) => {
                    ffi::ParamsCKKS_SetScalingModSize(p, b as c_int)
                }
                (SchemeId::Ckks, ParamSetting::BatchSize(b)) => {
                    ffi::ParamsCKKS_SetBatchSize(p, b as c_int)
                }
                (SchemeId::Ckks, ParamSetting::ScalingTechnique(t)) => {
                    ffi::ParamsCKKS_SetScalingTechnique(p, enum_code(t.to_u32()))
                }
                (SchemeId::Ckks, ParamSetting::FirstModSize(b)) => {
                    ffi::ParamsCKKS_SetFirstModSize(p, b as c_int)
                }
                (SchemeId::Ckks, ParamSetting::NumLargeDigits(d)) => {
                    ffi::ParamsCKKS_SetNumLargeDigits(p, d as c_int)
                }
                (SchemeId::Ckks, ParamSetting::SecretKeyDist(d)) => {
                    ffi::ParamsCKKS_SetSecretKeyDist(p, enum_code(d.to_u32()))
                }
                (SchemeId::Ckks, ParamSetting::KeySwitchTechnique(t)) => {
                    ffi::ParamsCKKS_SetKeySwitchTechnique(p, enum_code(t.to_u32()))
                }
                (scheme, setting) => return self.ckks_only(scheme, &setting),
            }
        };

        self.check(setting.name(), err)
    }

    fn params_destroy(&self, scheme: SchemeId, params: RawHandle) {
        unsafe {
            match scheme {
                SchemeId::Bfv => ffi::DestroyParamsBFV(params.as_ptr()),
                SchemeId::Bgv => ffi::DestroyParamsBGV(params.as_ptr()),
                SchemeId::Ckks => ffi::DestroyParamsCKKS(params.as_ptr()),
            }
        }
    }

    fn context_new(&self, scheme: SchemeId, params: RawHandle) -> Alloc {
        self.alloc("GenCryptoContext", |out| unsafe {
            match scheme {
                SchemeId::Bfv => ffi::NewCryptoContextBFV(params.as_ptr(), out),
                SchemeId::Bgv => ffi::NewCryptoContextBGV(params.as_ptr(), out),
                SchemeId::Ckks => ffi::NewCryptoContextCKKS(params.as_ptr(), out),
            }
        })
    }

    fn context_destroy(&self, cc: RawHandle) {
        unsafe { ffi::DestroyCryptoContext(cc.as_ptr()) }
    }

    fn context_scheme(&self, cc: RawHandle) -> EngineResult<SchemeId> {
        let mut code: c_int = -1;
        let err = unsafe { ffi::CryptoContext_GetScheme(cc.as_ptr(), &mut code) };
        self.check("GetScheme", err)?;

        match code {
            0 => Ok(SchemeId::Bfv),
            1 => Ok(SchemeId::Bgv),
            2 => Ok(SchemeId::Ckks),
            other => self.errors.fail(format!("GetScheme: unknown scheme id {other}")),
        }
    }

    fn enable(&self, cc: RawHandle, feature: Feature) -> EngineResult<()> {
        let err = unsafe { ffi::CryptoContext_Enable(cc.as_ptr(), enum_code(feature.to_u32())) };
        self.check("Enable", err)
    }

    fn ring_dimension(&self, cc: RawHandle) -> EngineResult<u64> {
        let mut n = 0u64;
        let err = unsafe { ffi::CryptoContext_GetRingDimension(cc.as_ptr(), &mut n) };
        self.check("GetRingDimension", err).map(|_| n)
    }

    fn cyclotomic_order(&self, cc: RawHandle) -> EngineResult<u32> {
        let mut m = 0u32;
        let err = unsafe { ffi::CryptoContext_GetCyclotomicOrder(cc.as_ptr(), &mut m) };
        self.check("GetCyclotomicOrder", err).map(|_| m)
    }

    fn parameter_element_string(&self, cc: RawHandle) -> EngineResult<String> {
        self.take_string("GetElementParams", |out| unsafe {
            ffi::CryptoContext_GetElementParams(cc.as_ptr(), out)
        })
    }

    fn native_int_width(&self) -> u32 {
        unsafe { ffi::GetNativeIntWidth() }
    }

    fn keygen(&self, cc: RawHandle) -> Alloc {
        self.alloc("KeyGen", |out| unsafe { ffi::CryptoContext_KeyGen(cc.as_ptr(), out) })
    }

    fn keypair_new(&self) -> Alloc {
        self.alloc("NewKeyPair", |out| unsafe { ffi::NewKeyPair(out) })
    }

    fn keypair_public(&self, kp: RawHandle) -> Alloc {
        self.alloc("GetPublicKey", |out| unsafe { ffi::GetPublicKey(kp.as_ptr(), out) })
    }

    fn keypair_private(&self, kp: RawHandle) -> Alloc {
        self.alloc("GetPrivateKey", |out| unsafe { ffi::GetPrivateKey(kp.as_ptr(), out) })
    }

    fn keypair_set_public(&self, kp: RawHandle, public_key: RawHandle) -> EngineResult<()> {
        let err = unsafe { ffi::SetPublicKey(kp.as_ptr(), public_key.as_ptr()) };
        self.check("SetPublicKey", err)
    }

    fn keypair_set_private(&self, kp: RawHandle, private_key: RawHandle) -> EngineResult<()> {
        let err = unsafe { ffi::SetPrivateKey(kp.as_ptr(), private_key.as_ptr()) };
        self.check("SetPrivateKey", err)
    }

    fn keypair_destroy(&self, kp: RawHandle) {
        unsafe { ffi::DestroyKeyPair(kp.as_ptr()) }
    }

    fn key_tag(&self, kp: RawHandle) -> EngineResult<String> {
        self.take_string("GetKeyTag", |out| unsafe { ffi::KeyPair_GetKeyTag(kp.as_ptr(), out) })
    }

    fn eval_mult_keygen(&self, cc: RawHandle, kp: RawHandle) -> EngineResult<()> {
        let err = unsafe { ffi::CryptoContext_EvalMultKeyGen(cc.as_ptr(), kp.as_ptr()) };
        self.check("EvalMultKeyGen", err)
    }

    fn eval_rotate_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        indices: &[i32],
    ) -> EngineResult<()> {
        let len = c_len(&self.errors, "EvalRotateKeyGen", indices.len())?;
        let err = unsafe {
            ffi::CryptoContext_EvalRotateKeyGen(cc.as_ptr(), kp.as_ptr(), indices.as_ptr(), len)
        };
        self.check("EvalRotateKeyGen", err)
    }

    fn eval_sum_keygen(&self, cc: RawHandle, kp: RawHandle) -> EngineResult<()> {
        let err = unsafe { ffi::CryptoContext_EvalSumKeyGen(cc.as_ptr(), kp.as_ptr()) };
        self.check("EvalSumKeyGen", err)
    }

    fn make_packed_plaintext(&self, cc: RawHandle, values: &[i64]) -> Alloc {
        let len = c_len(&self.errors, "MakePackedPlaintext", values.len())?;
        self.alloc("MakePackedPlaintext", |out| unsafe {
            ffi::CryptoContext_MakePackedPlaintext(cc.as_ptr(), values.as_ptr(), len, out)
        })
    }

    fn make_ckks_packed_plaintext(&self, cc: RawHandle, values: &[f64]) -> Alloc {
        let len = c_len(&self.errors, "MakeCKKSPackedPlaintext", values.len())?;
        self.alloc("MakeCKKSPackedPlaintext", |out| unsafe {
            ffi::CryptoContext_MakeCKKSPackedPlaintext(cc.as_ptr(), values.as_ptr(), len, out)
        })
    }

    fn make_ckks_complex_packed_plaintext(&self, cc: RawHandle, values: &[Complex<f64>]) -> Alloc {
        let len = c_len(&self.errors, "MakeCKKSPackedPlaintext", values.len())?;
        let interleaved = values.iter().flat_map(|z| [z.re, z.im]).collect::<Vec<_>>();

        self.alloc("MakeCKKSPackedPlaintext", |out| unsafe {
            ffi::CryptoContext_MakeCKKSComplexPackedPlaintext(
                cc.as_ptr(),
                interleaved.as_ptr(),
                len,
                out,
            )
        })
    }

    fn plaintext_len(&self, pt: RawHandle) -> EngineResult<usize> {
        let mut len: c_int = 0;
        let err = unsafe { ffi::Plaintext_GetLength(pt.as_ptr(), &mut len) };
        self.check("GetLength", err).map(|_| len.max(0) as usize)
    }

    fn plaintext_packed_values(&self, pt: RawHandle) -> EngineResult<Vec<i64>> {
        self.values(
            "GetPackedValue",
            |n| unsafe { ffi::Plaintext_GetPackedValueLength(pt.as_ptr(), n) },
            |i, v| unsafe { ffi::Plaintext_GetPackedValueAt(pt.as_ptr(), i, v) },
        )
    }

    fn plaintext_real_values(&self, pt: RawHandle) -> EngineResult<Vec<f64>> {
        self.values(
            "GetRealPackedValue",
            |n| unsafe { ffi::Plaintext_GetRealPackedValueLength(pt.as_ptr(), n) },
            |i, v| unsafe { ffi::Plaintext_GetRealPackedValueAt(pt.as_ptr(), i, v) },
        )
    }

    fn plaintext_complex_values(&self, pt: RawHandle) -> EngineResult<Vec<Complex<f64>>> {
        self.values(
            "GetCKKSPackedValue",
            |n| unsafe { ffi::Plaintext_GetRealPackedValueLength(pt.as_ptr(), n) },
            |i, z: *mut Complex<f64>| unsafe {
                ffi::Plaintext_GetComplexPackedValueAt(
                    pt.as_ptr(),
                    i,
                    ptr::addr_of_mut!((*z).re),
                    ptr::addr_of_mut!((*z).im),
                )
            },
        )
    }

    fn plaintext_set_length(&self, pt: RawHandle, len: usize) -> EngineResult<()> {
        let len = c_len(&self.errors, "SetLength", len)?;
        let err = unsafe { ffi::Plaintext_SetLength(pt.as_ptr(), len) };
        self.check("SetLength", err)
    }

    fn plaintext_destroy(&self, pt: RawHandle) {
        unsafe { ffi::DestroyPlaintext(pt.as_ptr()) }
    }

    fn encrypt(&self, cc: RawHandle, kp: RawHandle, pt: RawHandle) -> Alloc {
        self.alloc("Encrypt", |out| unsafe {
            ffi::CryptoContext_Encrypt(cc.as_ptr(), kp.as_ptr(), pt.as_ptr(), out)
        })
    }

    fn decrypt(&self, cc: RawHandle, kp: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("Decrypt", |out| unsafe {
            ffi::CryptoContext_Decrypt(cc.as_ptr(), kp.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn eval_binary(&self, cc: RawHandle, op: BinaryOp, a: RawHandle, b: RawHandle) -> Alloc {
        self.alloc(op.name(), |out| unsafe {
            let f = match op {
                BinaryOp::Add => ffi::CryptoContext_EvalAdd,
                BinaryOp::Sub => ffi::CryptoContext_EvalSub,
                BinaryOp::Mult => ffi::CryptoContext_EvalMult,
            };
            f(cc.as_ptr(), a.as_ptr(), b.as_ptr(), out)
        })
    }

    fn eval_binary_plain(
        &self,
        cc: RawHandle,
        op: BinaryOp,
        ct: RawHandle,
        pt: RawHandle,
    ) -> Alloc {
        self.alloc(op.name(), |out| unsafe {
            let f = match op {
                BinaryOp::Add => ffi::CryptoContext_EvalAddPlain,
                BinaryOp::Sub => ffi::CryptoContext_EvalSubPlain,
                BinaryOp::Mult => ffi::CryptoContext_EvalMultPlain,
            };
            f(cc.as_ptr(), ct.as_ptr(), pt.as_ptr(), out)
        })
    }

    fn eval_rotate(&self, cc: RawHandle, ct: RawHandle, index: i32) -> Alloc {
        self.alloc("EvalRotate", |out| unsafe {
            ffi::CryptoContext_EvalRotate(cc.as_ptr(), ct.as_ptr(), index, out)
        })
    }

    fn rescale(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("Rescale", |out| unsafe {
            ffi::CryptoContext_Rescale(cc.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn mod_reduce(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("ModReduce", |out| unsafe {
            ffi::CryptoContext_ModReduce(cc.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn eval_poly(&self, cc: RawHandle, ct: RawHandle, coefficients: &[f64]) -> Alloc {
        let len = c_len(&self.errors, "EvalPoly", coefficients.len())?;
        self.alloc("EvalPoly", |out| unsafe {
            ffi::CryptoContext_EvalPoly(cc.as_ptr(), ct.as_ptr(), coefficients.as_ptr(), len, out)
        })
    }

    fn eval_sum(&self, cc: RawHandle, ct: RawHandle, batch_size: u32) -> Alloc {
        self.alloc("EvalSum", |out| unsafe {
            ffi::CryptoContext_EvalSum(cc.as_ptr(), ct.as_ptr(), batch_size, out)
        })
    }

    fn eval_inner_product(
        &self,
        cc: RawHandle,
        a: RawHandle,
        b: RawHandle,
        batch_size: u32,
    ) -> Alloc {
        self.alloc("EvalInnerProduct", |out| unsafe {
            ffi::CryptoContext_EvalInnerProduct(
                cc.as_ptr(),
                a.as_ptr(),
                b.as_ptr(),
                batch_size,
                out,
            )
        })
    }

    fn fast_rotation_precompute(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalFastRotationPrecompute", |out| unsafe {
            ffi::CryptoContext_EvalFastRotationPrecompute(cc.as_ptr(), ct.as_ptr(), out)
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
        self.alloc("EvalFastRotation", |out| unsafe {
            ffi::CryptoContext_EvalFastRotation(
                cc.as_ptr(),
                ct.as_ptr(),
                index,
                cyclotomic_order,
                precompute.as_ptr(),
                out,
            )
        })
    }

    fn fast_rotation_precompute_destroy(&self, precompute: RawHandle) {
        unsafe { ffi::DestroyFastRotationPrecompute(precompute.as_ptr()) }
    }

    fn ciphertext_level(&self, ct: RawHandle) -> EngineResult<u32> {
        let mut level = 0u32;
        let err = unsafe { ffi::Ciphertext_GetLevel(ct.as_ptr(), &mut level) };
        self.check("GetLevel", err).map(|_| level)
    }

    fn ciphertext_destroy(&self, ct: RawHandle) {
        unsafe { ffi::DestroyCiphertext(ct.as_ptr()) }
    }

    fn bootstrap_setup(&self, cc: RawHandle, level_budget: &[u32]) -> EngineResult<()> {
        let len = c_len(&self.errors, "EvalBootstrapSetup", level_budget.len())?;
        let err = unsafe {
            ffi::CryptoContext_EvalBootstrapSetup_Simple(cc.as_ptr(), level_budget.as_ptr(), len)
        };
        self.check("EvalBootstrapSetup", err)
    }

    fn bootstrap_keygen(&self, cc: RawHandle, kp: RawHandle, slots: u32) -> EngineResult<()> {
        let err =
            unsafe { ffi::CryptoContext_EvalBootstrapKeyGen(cc.as_ptr(), kp.as_ptr(), slots) };
        self.check("EvalBootstrapKeyGen", err)
    }

    fn bootstrap(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalBootstrap", |out| unsafe {
            ffi::CryptoContext_EvalBootstrap(cc.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn bootstrap_depth(&self, level_budget: &[u32], dist: SecretKeyDist) -> u32 {
        let len = level_budget.len().min(c_int::MAX as usize) as c_int;
        unsafe { ffi::CKKS_GetBootstrapDepth(level_budget.as_ptr(), len, enum_code(dist.to_u32())) }
    }

    fn rekey_gen(
        &self,
        cc: RawHandle,
        old_private_key: RawHandle,
        new_public_key: RawHandle,
    ) -> Alloc {
        self.alloc("ReKeyGen", |out| unsafe {
            ffi::CryptoContext_ReKeyGen(
                cc.as_ptr(),
                old_private_key.as_ptr(),
                new_public_key.as_ptr(),
                out,
            )
        })
    }

    fn re_encrypt(&self, cc: RawHandle, ct: RawHandle, eval_key: RawHandle) -> Alloc {
        self.alloc("ReEncrypt", |out| unsafe {
            ffi::CryptoContext_ReEncrypt(cc.as_ptr(), ct.as_ptr(), eval_key.as_ptr(), out)
        })
    }

    fn eval_key_destroy(&self, eval_key: RawHandle) {
        unsafe { ffi::DestroyEvalKey(eval_key.as_ptr()) }
    }

    fn schswch_params_new(&self) -> Alloc {
        self.alloc("NewSchSwchParams", |out| unsafe { ffi::NewSchSwchParams(out) })
    }

    fn schswch_params_set(&self, params: RawHandle, setting: SchSwchSetting) -> EngineResult<()> {
        let p = params.as_ptr();
        let flag = |b: bool| b as c_int;

        let (op, err) = unsafe {
            match setting {
                SchSwchSetting::SecurityLevelCkks(l) => (
                    "SetSecurityLevelCKKS",
                    ffi::SchSwchParams_SetSecurityLevelCKKS(p, enum_code(l.to_u32())),
                ),
                SchSwchSetting::SecurityLevelFhew(s) => (
                    "SetSecurityLevelFHEW",
                    ffi::SchSwchParams_SetSecurityLevelFHEW(p, enum_code(s.to_u32())),
                ),
                SchSwchSetting::NumSlotsCkks(n) => {
                    ("SetNumSlotsCKKS", ffi::SchSwchParams_SetNumSlotsCKKS(p, n))
                }
                SchSwchSetting::NumValues(n) => {
                    ("SetNumValues", ffi::SchSwchParams_SetNumValues(p, n))
                }
                SchSwchSetting::CtxtModSizeFhewLargePrec(b) => (
                    "SetCtxtModSizeFHEWLargePrec",
                    ffi::SchSwchParams_SetCtxtModSizeFHEWLargePrec(p, b),
                ),
                SchSwchSetting::ComputeArgmin(b) => {
                    ("SetComputeArgmin", ffi::SchSwchParams_SetComputeArgmin(p, flag(b)))
                }
                SchSwchSetting::UseAltArgmin(b) => {
                    ("SetUseAltArgmin", ffi::SchSwchParams_SetUseAltArgmin(p, flag(b)))
                }
                SchSwchSetting::ArbitraryFunctionEvaluation(b) => (
                    "SetArbitraryFunctionEvaluation",
                    ffi::SchSwchParams_SetArbitraryFunctionEvaluation(p, flag(b)),
                ),
                SchSwchSetting::OneHotEncoding(b) => {
                    ("SetOneHotEncoding", ffi::SchSwchParams_SetOneHotEncoding(p, flag(b)))
                }
            }
        };

        self.check(op, err)
    }

    fn schswch_params_summary(&self, params: RawHandle) -> EngineResult<SchSwchSummary> {
        let p = params.as_ptr();
        let (mut ckks, mut fhew, mut slots, mut values): (c_int, c_int, u32, u32) = (0, 0, 0, 0);

        unsafe {
            self.check(
                "GetSecurityLevelCKKS",
                ffi::SchSwchParams_GetSecurityLevelCKKS(p, &mut ckks),
            )?;
            self.check(
                "GetSecurityLevelFHEW",
                ffi::SchSwchParams_GetSecurityLevelFHEW(p, &mut fhew),
            )?;
            self.check("GetNumSlotsCKKS", ffi::SchSwchParams_GetNumSlotsCKKS(p, &mut slots))?;
            self.check("GetNumValues", ffi::SchSwchParams_GetNumValues(p, &mut values))?;
        }

        let Some(security_level_ckks) = SecurityLevel::from_u32(ckks as u32) else {
            return self.errors.fail(format!("GetSecurityLevelCKKS: unknown level {ckks}"));
        };
        let Some(security_level_fhew) = BinFheParamSet::from_u32(fhew as u32) else {
            return self.errors.fail(format!("GetSecurityLevelFHEW: unknown parameter set {fhew}"));
        };

        Ok(SchSwchSummary {
            security_level_ckks,
            security_level_fhew,
            num_slots_ckks: slots,
            num_values: values,
        })
    }

    fn schswch_params_destroy(&self, params: RawHandle) {
        unsafe { ffi::DestroySchSwchParams(params.as_ptr()) }
    }

    fn lwe_private_key_destroy(&self, key: RawHandle) {
        unsafe { ffi::DestroyLWEPrivateKey(key.as_ptr()) }
    }

    fn ckks_to_fhew_setup(&self, cc: RawHandle, params: RawHandle) -> Alloc {
        self.alloc("EvalCKKStoFHEWSetup", |out| unsafe {
            ffi::CryptoContext_EvalCKKStoFHEWSetup(cc.as_ptr(), params.as_ptr(), out)
        })
    }

    fn ckks_to_fhew_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        lwe_key: RawHandle,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::CryptoContext_EvalCKKStoFHEWKeyGen(cc.as_ptr(), kp.as_ptr(), lwe_key.as_ptr())
        };
        self.check("EvalCKKStoFHEWKeyGen", err)
    }

    fn ckks_to_fhew_precompute(&self, cc: RawHandle, scale: f64) -> EngineResult<()> {
        let err = unsafe { ffi::CryptoContext_EvalCKKStoFHEWPrecompute(cc.as_ptr(), scale) };
        self.check("EvalCKKStoFHEWPrecompute", err)
    }

    fn ckks_to_fhew(
        &self,
        cc: RawHandle,
        ct: RawHandle,
        num_values: u32,
    ) -> EngineResult<Vec<RawHandle>> {
        let mut array: *mut Ptr = ptr::null_mut();
        let mut len: c_int = 0;
        let err = unsafe {
            ffi::CryptoContext_EvalCKKStoFHEW(
                cc.as_ptr(),
                ct.as_ptr(),
                num_values,
                &mut array,
                &mut len,
            )
        };
        self.check("EvalCKKStoFHEW", err)?;

        if array.is_null() {
            return Ok(vec![]);
        }

        let raw = unsafe { std::slice::from_raw_parts(array, len.max(0) as usize) };
        let handles = raw.iter().filter_map(|p| RawHandle::from_ptr(*p)).collect::<Vec<_>>();
        unsafe { ffi::FreeHandleArray(array) };

        if handles.len() != raw.len() {
            for h in handles {
                unsafe { ffi::LWECiphertext_Delete(h.as_ptr()) };
            }

            return self.errors.fail("EvalCKKStoFHEW: returned a null LWE ciphertext");
        }

        Ok(handles)
    }

    fn fhew_to_ckks_setup(
        &self,
        cc: RawHandle,
        bin_cc: RawHandle,
        num_slots: u32,
        log_q: u32,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::CryptoContext_EvalFHEWtoCKKSSetup(cc.as_ptr(), bin_cc.as_ptr(), num_slots, log_q)
        };
        self.check("EvalFHEWtoCKKSSetup", err)
    }

    fn fhew_to_ckks_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        lwe_key: RawHandle,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::CryptoContext_EvalFHEWtoCKKSKeyGen(cc.as_ptr(), kp.as_ptr(), lwe_key.as_ptr())
        };
        self.check("EvalFHEWtoCKKSKeyGen", err)
    }

    fn fhew_to_ckks(
        &self,
        cc: RawHandle,
        lwe_cts: &[RawHandle],
        num_slots: u32,
        p: u32,
        range: Option<(f64, f64)>,
    ) -> Alloc {
        let len = c_len(&self.errors, "EvalFHEWtoCKKS", lwe_cts.len())?;
        let ptrs = lwe_cts.iter().map(|h| h.as_ptr()).collect::<Vec<_>>();

        self.alloc("EvalFHEWtoCKKS", |out| unsafe {
            match range {
                None => ffi::CryptoContext_EvalFHEWtoCKKS(
                    cc.as_ptr(),
                    ptrs.as_ptr(),
                    len,
                    num_slots,
                    p,
                    out,
                ),
                Some((pmin, pmax)) => ffi::CryptoContext_EvalFHEWtoCKKSExt(
                    cc.as_ptr(),
                    ptrs.as_ptr(),
                    len,
                    num_slots,
                    p,
                    pmin,
                    pmax,
                    out,
                ),
            }
        })
    }

    fn scheme_switching_setup(&self, cc: RawHandle, params: RawHandle) -> Alloc {
        self.alloc("EvalSchemeSwitchingSetup", |out| unsafe {
            ffi::CryptoContext_EvalSchemeSwitchingSetup(cc.as_ptr(), params.as_ptr(), out)
        })
    }

    fn scheme_switching_keygen(
        &self,
        cc: RawHandle,
        kp: RawHandle,
        lwe_key: RawHandle,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::CryptoContext_EvalSchemeSwitchingKeyGen(cc.as_ptr(), kp.as_ptr(), lwe_key.as_ptr())
        };
        self.check("EvalSchemeSwitchingKeyGen", err)
    }

    fn bin_cc_for_scheme_switch(&self, cc: RawHandle) -> Alloc {
        self.alloc("GetBinCCForSchemeSwitch", |out| unsafe {
            ffi::CryptoContext_GetBinCCForSchemeSwitch(cc.as_ptr(), out)
        })
    }

    fn compare_switch_precompute(
        &self,
        cc: RawHandle,
        p_lwe: u32,
        scale_sign: f64,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::CryptoContext_EvalCompareSwitchPrecompute(cc.as_ptr(), p_lwe, scale_sign)
        };
        self.check("EvalCompareSwitchPrecompute", err)
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
        self.alloc("EvalCompareSchemeSwitching", |out| unsafe {
            ffi::CryptoContext_EvalCompareSchemeSwitching(
                cc.as_ptr(),
                a.as_ptr(),
                b.as_ptr(),
                num_values,
                num_slots,
                p_lwe,
                scale_sign,
                out,
            )
        })
    }

    fn eval_min_max(
        &self,
        cc: RawHandle,
        request: MinMaxRequest,
    ) -> EngineResult<(Option<RawHandle>, Option<RawHandle>)> {
        let f = match (request.extremum, request.precision) {
            (Extremum::Min, Precision::Standard) => ffi::CryptoContext_EvalMinSchemeSwitching,
            (Extremum::Min, Precision::Alt) => ffi::CryptoContext_EvalMinSchemeSwitchingAlt,
            (Extremum::Max, Precision::Standard) => ffi::CryptoContext_EvalMaxSchemeSwitching,
            (Extremum::Max, Precision::Alt) => ffi::CryptoContext_EvalMaxSchemeSwitchingAlt,
        };

        let (mut value, mut index): (Ptr, Ptr) = (ptr::null_mut(), ptr::null_mut());
        let err = unsafe {
            f(
                cc.as_ptr(),
                request.ciphertext.as_ptr(),
                request.public_key.as_ptr(),
                request.num_values,
                request.num_slots,
                request.p_lwe,
                request.scale_sign,
                &mut value,
                &mut index,
            )
        };
        self.check(request.op_name(), err)?;

        Ok((RawHandle::from_ptr(value), RawHandle::from_ptr(index)))
    }

    fn serialize(&self, object: SerialObject<'_>, format: SerialFormat) -> EngineResult<Vec<u8>> {
        let format = format_code(format);

        match object {
            SerialObject::Context(cc) => {
                self.take_buffer("SerializeCryptoContext", |out, len| unsafe {
                    ffi::SerializeCryptoContext(cc.as_ptr(), format, out, len)
                })
            }
            SerialObject::PublicKey(kp) => {
                self.take_buffer("SerializePublicKey", |out, len| unsafe {
                    ffi::SerializePublicKey(kp.as_ptr(), format, out, len)
                })
            }
            SerialObject::PrivateKey(kp) => {
                self.take_buffer("SerializePrivateKey", |out, len| unsafe {
                    ffi::SerializePrivateKey(kp.as_ptr(), format, out, len)
                })
            }
            SerialObject::EvalMultKey { context, key_tag } => {
                let Ok(tag) = CString::new(key_tag) else {
                    return self.errors.fail("SerializeEvalMultKey: key tag contains a NUL byte");
                };

                self.take_buffer("SerializeEvalMultKey", |out, len| unsafe {
                    ffi::SerializeEvalMultKey(context.as_ptr(), tag.as_ptr(), format, out, len)
                })
            }
            SerialObject::Ciphertext(ct) => {
                self.take_buffer("SerializeCiphertext", |out, len| unsafe {
                    ffi::SerializeCiphertext(ct.as_ptr(), format, out, len)
                })
            }
        }
    }

    fn deserialize(&self, kind: SerialKind, blob: &[u8], format: SerialFormat) -> Alloc {
        let format = format_code(format);
        let f = match kind {
            SerialKind::Context => ffi::DeserializeCryptoContext,
            SerialKind::PublicKey => ffi::DeserializePublicKey,
            SerialKind::PrivateKey => ffi::DeserializePrivateKey,
            SerialKind::Ciphertext => ffi::DeserializeCiphertext,
        };

        self.alloc("Deserialize", |out| unsafe { f(blob.as_ptr(), blob.len(), format, out) })
    }

    fn deserialize_eval_mult_key(
        &self,
        cc: RawHandle,
        blob: &[u8],
        format: SerialFormat,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::DeserializeEvalMultKey(cc.as_ptr(), blob.as_ptr(), blob.len(), format_code(format))
        };
        self.check("DeserializeEvalMultKey", err)
    }
}

/// The binary-gate subsystem of the native engine.
pub struct NativeBinFhe {
    errors: ErrorChannel,
}

impl NativeBinFhe {
    fn check(&self, op: &str, err: ffi::BinFHEErr) -> EngineResult<()> {
        let message = unsafe { take_message(err.msg, ffi::FreeBinFHE_ErrMsg) };

        if err.code == 0 {
            return Ok(());
        }

        let message = message.unwrap_or_else(|| UNKNOWN_BINFHE_ERROR.to_owned());
        debug!("native engine: {op} failed: {message}");

        self.errors.fail(message)
    }

    fn alloc(&self, op: &str, f: impl FnOnce(*mut Ptr) -> ffi::BinFHEErr) -> Alloc {
        let mut out: Ptr = ptr::null_mut();
        let err = f(&mut out);
        self.check(op, err)?;

        Ok(RawHandle::from_ptr(out))
    }
}

impl BinFheEngine for NativeBinFhe {
    fn last_error(&self) -> Option<String> {
        self.errors.take()
    }

    fn context_new(&self) -> Alloc {
        self.alloc("BinFHEContext", |out| unsafe { ffi::BinFHEContext_New(out) })
    }

    fn context_destroy(&self, cc: RawHandle) {
        unsafe { ffi::BinFHEContext_Delete(cc.as_ptr()) }
    }

    fn generate(
        &self,
        cc: RawHandle,
        param_set: BinFheParamSet,
        method: BinFheMethod,
    ) -> EngineResult<()> {
        let err = unsafe {
            ffi::BinFHEContext_Generate(
                cc.as_ptr(),
                enum_code(param_set.to_u32()),
                enum_code(method.to_u32()),
            )
        };
        self.check("GenerateBinFHEContext", err)
    }

    fn keygen(&self, cc: RawHandle) -> Alloc {
        self.alloc("KeyGen", |out| unsafe { ffi::BinFHEContext_KeyGen(cc.as_ptr(), out) })
    }

    fn secret_key_destroy(&self, sk: RawHandle) {
        unsafe { ffi::LWESecretKey_Delete(sk.as_ptr()) }
    }

    fn bt_keygen(&self, cc: RawHandle, sk: RawHandle) -> EngineResult<()> {
        let err = unsafe { ffi::BinFHEContext_BTKeyGen(cc.as_ptr(), sk.as_ptr()) };
        self.check("BTKeyGen", err)
    }

    fn encrypt(&self, cc: RawHandle, sk: RawHandle, bit: bool) -> Alloc {
        self.alloc("Encrypt", |out| unsafe {
            ffi::BinFHEContext_Encrypt(cc.as_ptr(), sk.as_ptr(), bit as c_int, out)
        })
    }

    fn ciphertext_destroy(&self, ct: RawHandle) {
        unsafe { ffi::LWECiphertext_Delete(ct.as_ptr()) }
    }

    fn eval_bin_gate(&self, cc: RawHandle, gate: BinGate, a: RawHandle, b: RawHandle) -> Alloc {
        self.alloc("EvalBinGate", |out| unsafe {
            ffi::BinFHEContext_EvalBinGate(
                cc.as_ptr(),
                enum_code(gate.to_u32()),
                a.as_ptr(),
                b.as_ptr(),
                out,
            )
        })
    }

    fn eval_not(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalNOT", |out| unsafe {
            ffi::BinFHEContext_EvalNOT(cc.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn bootstrap(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("Bootstrap", |out| unsafe {
            ffi::BinFHEContext_Bootstrap(cc.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn decrypt(&self, cc: RawHandle, sk: RawHandle, ct: RawHandle) -> EngineResult<bool> {
        let mut bit: c_int = 0;
        let err = unsafe {
            ffi::BinFHEContext_Decrypt(cc.as_ptr(), sk.as_ptr(), ct.as_ptr(), &mut bit)
        };
        self.check("Decrypt", err).map(|_| bit != 0)
    }

    fn decrypt_modulus(
        &self,
        cc: RawHandle,
        sk: RawHandle,
        ct: RawHandle,
        p: u64,
    ) -> EngineResult<u64> {
        let mut value = 0u64;
        let err = unsafe {
            ffi::BinFHEContext_DecryptModulus(cc.as_ptr(), sk.as_ptr(), ct.as_ptr(), p, &mut value)
        };
        self.check("Decrypt", err).map(|_| value)
    }

    fn decrypt_modulus_lwe_key(
        &self,
        cc: RawHandle,
        lwe_key: RawHandle,
        ct: RawHandle,
        p: u64,
    ) -> EngineResult<u64> {
        let mut value = 0u64;
        let err = unsafe {
            ffi::BinFHEContext_DecryptModulusLWEKey(
                cc.as_ptr(),
                lwe_key.as_ptr(),
                ct.as_ptr(),
                p,
                &mut value,
            )
        };
        self.check("Decrypt", err).map(|_| value)
    }

    fn max_plaintext_space(&self, cc: RawHandle) -> EngineResult<u32> {
        let mut value = 0u32;
        let err = unsafe { ffi::BinFHEContext_GetMaxPlaintextSpace(cc.as_ptr(), &mut value) };
        self.check("GetMaxPlaintextSpace", err).map(|_| value)
    }

    fn lwe_dimension(&self, cc: RawHandle) -> EngineResult<u32> {
        let mut value = 0u32;
        let err = unsafe { ffi::BinFHEContext_Getn(cc.as_ptr(), &mut value) };
        self.check("Getn", err).map(|_| value)
    }

    fn lwe_modulus(&self, cc: RawHandle) -> EngineResult<u64> {
        let mut value = 0u64;
        let err = unsafe { ffi::BinFHEContext_Getq(cc.as_ptr(), &mut value) };
        self.check("Getq", err).map(|_| value)
    }

    fn beta(&self, cc: RawHandle) -> EngineResult<u32> {
        let mut value = 0u32;
        let err = unsafe { ffi::BinFHEContext_GetBeta(cc.as_ptr(), &mut value) };
        self.check("GetBeta", err).map(|_| value)
    }

    fn eval_sign(&self, cc: RawHandle, ct: RawHandle) -> Alloc {
        self.alloc("EvalSign", |out| unsafe {
            ffi::BinFHEContext_EvalSign(cc.as_ptr(), ct.as_ptr(), out)
        })
    }

    fn eval_floor(&self, cc: RawHandle, ct: RawHandle, bits: u32) -> Alloc {
        self.alloc("EvalFloor", |out| unsafe {
            ffi::BinFHEContext_EvalFloor(cc.as_ptr(), ct.as_ptr(), bits, out)
        })
    }
}

/// Both subsystems of the linked native engine.
pub struct NativeBackend {
    pke: Arc<NativePke>,
    binfhe: Arc<NativeBinFhe>,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend {
    /// Creates adapters with fresh error channels.
    pub fn new() -> Self {
        Self {
            pke: Arc::new(NativePke {
                errors: ErrorChannel::new(),
            }),
            binfhe: Arc::new(NativeBinFhe {
                errors: ErrorChannel::new(),
            }),
        }
    }

    /// The lattice-scheme subsystem.
    pub fn pke(&self) -> Arc<NativePke> {
        self.pke.clone()
    }

    /// The binary-gate subsystem.
    pub fn binfhe(&self) -> Arc<NativeBinFhe> {
        self.binfhe.clone()
    }
}
