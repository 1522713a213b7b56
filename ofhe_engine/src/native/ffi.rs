//! Raw declarations of the `ofhe_bridge` C ABI.
//!
//! Every fallible entry point returns an error struct by value whose `msg`,
//! when non-null, is heap-allocated by the bridge and must be released with the
//! matching `Free*_ErrMsg` function. Objects are `void *` wrappers around the
//! engine's shared pointers.
#![allow(non_snake_case)]

use std::ffi::{c_char, c_int, c_void};

pub type Ptr = *mut c_void;

#[repr(C)]
#[derive(Debug)]
pub struct PKEErr {
    pub code: c_int,
    pub msg: *mut c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct BinFHEErr {
    pub code: c_int,
    pub msg: *mut c_char,
}

unsafe extern "C" {
    pub fn FreePKE_ErrMsg(msg: *mut c_char);
    pub fn FreeBinFHE_ErrMsg(msg: *mut c_char);
    pub fn FreeString(s: *mut c_char);
    pub fn FreeBuffer(buf: *mut u8);
    pub fn FreeHandleArray(array: *mut Ptr);

    // Parameters
    pub fn NewParamsBFV(out: *mut Ptr) -> PKEErr;
    pub fn NewParamsBGV(out: *mut Ptr) -> PKEErr;
    pub fn NewParamsCKKS(out: *mut Ptr) -> PKEErr;
    pub fn DestroyParamsBFV(p: Ptr);
    pub fn DestroyParamsBGV(p: Ptr);
    pub fn DestroyParamsCKKS(p: Ptr);

    pub fn ParamsBFV_SetPlaintextModulus(p: Ptr, modulus: u64) -> PKEErr;
    pub fn ParamsBFV_SetMultiplicativeDepth(p: Ptr, depth: c_int) -> PKEErr;
    pub fn ParamsBFV_SetSecurityLevel(p: Ptr, level: c_int) -> PKEErr;
    pub fn ParamsBFV_SetRingDim(p: Ptr, ring_dim: u64) -> PKEErr;
    pub fn ParamsBGV_SetPlaintextModulus(p: Ptr, modulus: u64) -> PKEErr;
    pub fn ParamsBGV_SetMultiplicativeDepth(p: Ptr, depth: c_int) -> PKEErr;
    pub fn ParamsBGV_SetSecurityLevel(p: Ptr, level: c_int) -> PKEErr;
    pub fn ParamsBGV_SetRingDim(p: Ptr, ring_dim: u64) -> PKEErr;
    pub fn ParamsCKKS_SetMultiplicativeDepth(p: Ptr, depth: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetSecurityLevel(p: Ptr, level: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetRingDim(p: Ptr, ring_dim: u64) -> PKEErr;
    pub fn ParamsCKKS_SetScalingModSize(p: Ptr, bits: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetBatchSize(p: Ptr, batch: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetScalingTechnique(p: Ptr, technique: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetFirstModSize(p: Ptr, bits: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetNumLargeDigits(p: Ptr, digits: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetSecretKeyDist(p: Ptr, dist: c_int) -> PKEErr;
    pub fn ParamsCKKS_SetKeySwitchTechnique(p: Ptr, technique: c_int) -> PKEErr;

    // Contexts
    pub fn NewCryptoContextBFV(p: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn NewCryptoContextBGV(p: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn NewCryptoContextCKKS(p: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn DestroyCryptoContext(cc: Ptr);
    pub fn CryptoContext_GetScheme(cc: Ptr, out: *mut c_int) -> PKEErr;
    pub fn CryptoContext_Enable(cc: Ptr, feature: c_int) -> PKEErr;
    pub fn CryptoContext_GetRingDimension(cc: Ptr, out: *mut u64) -> PKEErr;
    pub fn CryptoContext_GetCyclotomicOrder(cc: Ptr, out: *mut u32) -> PKEErr;
    pub fn CryptoContext_GetElementParams(cc: Ptr, out: *mut *mut c_char) -> PKEErr;
    pub fn GetNativeIntWidth() -> u32;

    // Keys
    pub fn CryptoContext_KeyGen(cc: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn NewKeyPair(out: *mut Ptr) -> PKEErr;
    pub fn GetPublicKey(kp: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn GetPrivateKey(kp: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn SetPublicKey(kp: Ptr, pk: Ptr) -> PKEErr;
    pub fn SetPrivateKey(kp: Ptr, sk: Ptr) -> PKEErr;
    pub fn DestroyKeyPair(kp: Ptr);
    pub fn KeyPair_GetKeyTag(kp: Ptr, out: *mut *mut c_char) -> PKEErr;
    pub fn CryptoContext_EvalMultKeyGen(cc: Ptr, kp: Ptr) -> PKEErr;
    pub fn CryptoContext_EvalRotateKeyGen(
        cc: Ptr,
        kp: Ptr,
        indices: *const i32,
        len: c_int,
    ) -> PKEErr;
    pub fn CryptoContext_EvalSumKeyGen(cc: Ptr, kp: Ptr) -> PKEErr;

    // Plaintexts
    pub fn CryptoContext_MakePackedPlaintext(
        cc: Ptr,
        values: *const i64,
        len: c_int,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_MakeCKKSPackedPlaintext(
        cc: Ptr,
        values: *const f64,
        len: c_int,
        out: *mut Ptr,
    ) -> PKEErr;
    /// `values` interleaves real and imaginary parts; `len` counts complex values.
    pub fn CryptoContext_MakeCKKSComplexPackedPlaintext(
        cc: Ptr,
        values: *const f64,
        len: c_int,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn Plaintext_GetLength(pt: Ptr, out: *mut c_int) -> PKEErr;
    pub fn Plaintext_SetLength(pt: Ptr, len: c_int) -> PKEErr;
    pub fn Plaintext_GetPackedValueLength(pt: Ptr, out: *mut c_int) -> PKEErr;
    pub fn Plaintext_GetPackedValueAt(pt: Ptr, i: c_int, out: *mut i64) -> PKEErr;
    pub fn Plaintext_GetRealPackedValueLength(pt: Ptr, out: *mut c_int) -> PKEErr;
    pub fn Plaintext_GetRealPackedValueAt(pt: Ptr, i: c_int, out: *mut f64) -> PKEErr;
    pub fn Plaintext_GetComplexPackedValueAt(
        pt: Ptr,
        i: c_int,
        re: *mut f64,
        im: *mut f64,
    ) -> PKEErr;
    pub fn DestroyPlaintext(pt: Ptr);

    // Evaluation
    pub fn CryptoContext_Encrypt(cc: Ptr, kp: Ptr, pt: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_Decrypt(cc: Ptr, kp: Ptr, ct: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalAdd(cc: Ptr, a: Ptr, b: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalSub(cc: Ptr, a: Ptr, b: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalMult(cc: Ptr, a: Ptr, b: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalAddPlain(cc: Ptr, ct: Ptr, pt: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalSubPlain(cc: Ptr, ct: Ptr, pt: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalMultPlain(cc: Ptr, ct: Ptr, pt: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalRotate(cc: Ptr, ct: Ptr, index: i32, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_Rescale(cc: Ptr, ct: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_ModReduce(cc: Ptr, ct: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalPoly(
        cc: Ptr,
        ct: Ptr,
        coefficients: *const f64,
        len: c_int,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalSum(cc: Ptr, ct: Ptr, batch_size: u32, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalInnerProduct(
        cc: Ptr,
        a: Ptr,
        b: Ptr,
        batch_size: u32,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalFastRotationPrecompute(cc: Ptr, ct: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalFastRotation(
        cc: Ptr,
        ct: Ptr,
        index: i32,
        cyclotomic_order: u32,
        precompute: Ptr,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn DestroyFastRotationPrecompute(precompute: Ptr);
    pub fn Ciphertext_GetLevel(ct: Ptr, out: *mut u32) -> PKEErr;
    pub fn DestroyCiphertext(ct: Ptr);

    // Bootstrapping
    pub fn CryptoContext_EvalBootstrapSetup_Simple(
        cc: Ptr,
        level_budget: *const u32,
        len: c_int,
    ) -> PKEErr;
    pub fn CryptoContext_EvalBootstrapKeyGen(cc: Ptr, kp: Ptr, slots: u32) -> PKEErr;
    pub fn CryptoContext_EvalBootstrap(cc: Ptr, ct: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CKKS_GetBootstrapDepth(level_budget: *const u32, len: c_int, dist: c_int) -> u32;

    // Proxy re-encryption
    pub fn CryptoContext_ReKeyGen(cc: Ptr, old_sk: Ptr, new_pk: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_ReEncrypt(cc: Ptr, ct: Ptr, eval_key: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn DestroyEvalKey(eval_key: Ptr);

    // Scheme switching
    pub fn NewSchSwchParams(out: *mut Ptr) -> PKEErr;
    pub fn DestroySchSwchParams(params: Ptr);
    pub fn SchSwchParams_SetSecurityLevelCKKS(params: Ptr, level: c_int) -> PKEErr;
    pub fn SchSwchParams_SetSecurityLevelFHEW(params: Ptr, set: c_int) -> PKEErr;
    pub fn SchSwchParams_SetNumSlotsCKKS(params: Ptr, slots: u32) -> PKEErr;
    pub fn SchSwchParams_SetNumValues(params: Ptr, values: u32) -> PKEErr;
    pub fn SchSwchParams_SetCtxtModSizeFHEWLargePrec(params: Ptr, bits: u32) -> PKEErr;
    pub fn SchSwchParams_SetComputeArgmin(params: Ptr, flag: c_int) -> PKEErr;
    pub fn SchSwchParams_SetUseAltArgmin(params: Ptr, flag: c_int) -> PKEErr;
    pub fn SchSwchParams_SetArbitraryFunctionEvaluation(params: Ptr, flag: c_int) -> PKEErr;
    pub fn SchSwchParams_SetOneHotEncoding(params: Ptr, flag: c_int) -> PKEErr;
    pub fn SchSwchParams_GetSecurityLevelCKKS(params: Ptr, out: *mut c_int) -> PKEErr;
    pub fn SchSwchParams_GetSecurityLevelFHEW(params: Ptr, out: *mut c_int) -> PKEErr;
    pub fn SchSwchParams_GetNumSlotsCKKS(params: Ptr, out: *mut u32) -> PKEErr;
    pub fn SchSwchParams_GetNumValues(params: Ptr, out: *mut u32) -> PKEErr;
    pub fn DestroyLWEPrivateKey(key: Ptr);

    pub fn CryptoContext_EvalCKKStoFHEWSetup(cc: Ptr, params: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalCKKStoFHEWKeyGen(cc: Ptr, kp: Ptr, lwe_sk: Ptr) -> PKEErr;
    pub fn CryptoContext_EvalCKKStoFHEWPrecompute(cc: Ptr, scale: f64) -> PKEErr;
    /// `out_array` is released with [`FreeHandleArray`]; the handles in it are
    /// owned by the caller.
    pub fn CryptoContext_EvalCKKStoFHEW(
        cc: Ptr,
        ct: Ptr,
        num_values: u32,
        out_array: *mut *mut Ptr,
        out_len: *mut c_int,
    ) -> PKEErr;
    pub fn CryptoContext_EvalFHEWtoCKKSSetup(
        cc: Ptr,
        bin_cc: Ptr,
        num_slots: u32,
        log_q: u32,
    ) -> PKEErr;
    pub fn CryptoContext_EvalFHEWtoCKKSKeyGen(cc: Ptr, kp: Ptr, lwe_sk: Ptr) -> PKEErr;
    pub fn CryptoContext_EvalFHEWtoCKKS(
        cc: Ptr,
        lwe_cts: *const Ptr,
        len: c_int,
        num_slots: u32,
        p: u32,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalFHEWtoCKKSExt(
        cc: Ptr,
        lwe_cts: *const Ptr,
        len: c_int,
        num_slots: u32,
        p: u32,
        pmin: f64,
        pmax: f64,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalSchemeSwitchingSetup(cc: Ptr, params: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalSchemeSwitchingKeyGen(cc: Ptr, kp: Ptr, lwe_sk: Ptr) -> PKEErr;
    pub fn CryptoContext_GetBinCCForSchemeSwitch(cc: Ptr, out: *mut Ptr) -> PKEErr;
    pub fn CryptoContext_EvalCompareSwitchPrecompute(
        cc: Ptr,
        p_lwe: u32,
        scale_sign: f64,
    ) -> PKEErr;
    pub fn CryptoContext_EvalCompareSchemeSwitching(
        cc: Ptr,
        a: Ptr,
        b: Ptr,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalMinSchemeSwitching(
        cc: Ptr,
        ct: Ptr,
        public_key: Ptr,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
        out_value: *mut Ptr,
        out_index: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalMinSchemeSwitchingAlt(
        cc: Ptr,
        ct: Ptr,
        public_key: Ptr,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
        out_value: *mut Ptr,
        out_index: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalMaxSchemeSwitching(
        cc: Ptr,
        ct: Ptr,
        public_key: Ptr,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
        out_value: *mut Ptr,
        out_index: *mut Ptr,
    ) -> PKEErr;
    pub fn CryptoContext_EvalMaxSchemeSwitchingAlt(
        cc: Ptr,
        ct: Ptr,
        public_key: Ptr,
        num_values: u32,
        num_slots: u32,
        p_lwe: u32,
        scale_sign: f64,
        out_value: *mut Ptr,
        out_index: *mut Ptr,
    ) -> PKEErr;

    // Serialization. `format` is 0 for JSON and 1 for binary; output buffers
    // are released with [`FreeBuffer`].
    pub fn SerializeCryptoContext(
        cc: Ptr,
        format: c_int,
        out: *mut *mut u8,
        out_len: *mut usize,
    ) -> PKEErr;
    pub fn SerializePublicKey(kp: Ptr, format: c_int, out: *mut *mut u8, out_len: *mut usize)
    -> PKEErr;
    pub fn SerializePrivateKey(
        kp: Ptr,
        format: c_int,
        out: *mut *mut u8,
        out_len: *mut usize,
    ) -> PKEErr;
    pub fn SerializeEvalMultKey(
        cc: Ptr,
        key_tag: *const c_char,
        format: c_int,
        out: *mut *mut u8,
        out_len: *mut usize,
    ) -> PKEErr;
    pub fn SerializeCiphertext(ct: Ptr, format: c_int, out: *mut *mut u8, out_len: *mut usize)
    -> PKEErr;
    pub fn DeserializeCryptoContext(
        data: *const u8,
        len: usize,
        format: c_int,
        out: *mut Ptr,
    ) -> PKEErr;
    pub fn DeserializePublicKey(data: *const u8, len: usize, format: c_int, out: *mut Ptr)
    -> PKEErr;
    pub fn DeserializePrivateKey(data: *const u8, len: usize, format: c_int, out: *mut Ptr)
    -> PKEErr;
    pub fn DeserializeCiphertext(data: *const u8, len: usize, format: c_int, out: *mut Ptr)
    -> PKEErr;
    pub fn DeserializeEvalMultKey(cc: Ptr, data: *const u8, len: usize, format: c_int) -> PKEErr;

    // Binary gates
    pub fn BinFHEContext_New(out: *mut Ptr) -> BinFHEErr;
    pub fn BinFHEContext_Delete(h: Ptr);
    pub fn BinFHEContext_Generate(h: Ptr, param_set: c_int, method: c_int) -> BinFHEErr;
    pub fn BinFHEContext_KeyGen(h: Ptr, out: *mut Ptr) -> BinFHEErr;
    pub fn LWESecretKey_Delete(h: Ptr);
    pub fn BinFHEContext_BTKeyGen(h: Ptr, sk: Ptr) -> BinFHEErr;
    pub fn BinFHEContext_Encrypt(h: Ptr, sk: Ptr, bit: c_int, out: *mut Ptr) -> BinFHEErr;
    pub fn LWECiphertext_Delete(h: Ptr);
    pub fn BinFHEContext_EvalBinGate(h: Ptr, gate: c_int, a: Ptr, b: Ptr, out: *mut Ptr)
    -> BinFHEErr;
    pub fn BinFHEContext_EvalNOT(h: Ptr, ct: Ptr, out: *mut Ptr) -> BinFHEErr;
    pub fn BinFHEContext_Bootstrap(h: Ptr, ct: Ptr, out: *mut Ptr) -> BinFHEErr;
    pub fn BinFHEContext_Decrypt(h: Ptr, sk: Ptr, ct: Ptr, out_bit: *mut c_int) -> BinFHEErr;
    pub fn BinFHEContext_DecryptModulus(h: Ptr, sk: Ptr, ct: Ptr, p: u64, out: *mut u64)
    -> BinFHEErr;
    pub fn BinFHEContext_DecryptModulusLWEKey(
        h: Ptr,
        sk: Ptr,
        ct: Ptr,
        p: u64,
        out: *mut u64,
    ) -> BinFHEErr;
    pub fn BinFHEContext_GetMaxPlaintextSpace(h: Ptr, out: *mut u32) -> BinFHEErr;
    pub fn BinFHEContext_Getn(h: Ptr, out: *mut u32) -> BinFHEErr;
    pub fn BinFHEContext_Getq(h: Ptr, out: *mut u64) -> BinFHEErr;
    pub fn BinFHEContext_GetBeta(h: Ptr, out: *mut u32) -> BinFHEErr;
    pub fn BinFHEContext_EvalSign(h: Ptr, ct: Ptr, out: *mut Ptr) -> BinFHEErr;
    pub fn BinFHEContext_EvalFloor(h: Ptr, ct: Ptr, bits: u32, out: *mut Ptr) -> BinFHEErr;
}
