use std::{
    sync::{Arc, Barrier},
    thread,
};

use ofhe::{
    Backend, BinFheContext, BinFheMethod, BinFheParamSet, BinGate, Ckks, CryptoContext, Error,
    Feature, Params, SecurityLevel, Subsystem,
    schemeswitch::{SchSwchParams, SchemeSwitching},
};
use ofhe_engine::sim::SimBackend;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ckks_context(backend: &Backend) -> CryptoContext<Ckks> {
    let params = Params::<Ckks>::new(backend).unwrap();
    params.set_multiplicative_depth(2).unwrap();
    params.set_security_level(SecurityLevel::HeStdNotSet).unwrap();
    params.set_ring_dim(1 << 12).unwrap();
    params.set_batch_size(8).unwrap();

    let cc = CryptoContext::new(&params).unwrap();
    cc.enable_all([
        Feature::Pke,
        Feature::KeySwitch,
        Feature::LeveledShe,
        Feature::SchemeSwitch,
    ])
    .unwrap();

    cc
}

#[test]
fn concurrent_close_destroys_once() {
    init_logger();
    let sim = SimBackend::new();
    let backend = Backend::from_sim(&sim);

    let cc = ckks_context(&backend);
    let keys = cc.keygen().unwrap();
    let ct = Arc::new(
        cc.encrypt(&keys, &cc.make_ckks_packed_plaintext(&[1.0]).unwrap())
            .unwrap(),
    );

    let before = sim.stats();
    let barrier = Barrier::new(16);

    thread::scope(|s| {
        for _ in 0..16 {
            let ct = ct.clone();
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                ct.close();
            });
        }
    });

    let after = sim.stats();
    assert_eq!(after.destroyed, before.destroyed + 1);
    assert_eq!(after.live, before.live - 1);
    assert_eq!(after.invalid_destroys, 0);

    assert!(matches!(
        cc.decrypt(&keys, &ct),
        Err(Error::Closed { kind: "Ciphertext" })
    ));

    drop(ct);
    assert_eq!(sim.stats().destroyed, after.destroyed);
}

#[test]
fn contexts_cannot_come_from_released_params() {
    init_logger();
    let backend = Backend::simulated();
    let params = Params::<Ckks>::new(&backend).unwrap();
    params.close();

    assert!(matches!(
        CryptoContext::new(&params),
        Err(Error::Closed { kind: "Params" })
    ));
}

#[test]
fn everything_is_released_on_drop() {
    init_logger();
    let sim = SimBackend::new();
    let backend = Backend::from_sim(&sim);

    {
        let cc = ckks_context(&backend);
        let keys = cc.keygen().unwrap();
        let pt = cc.make_ckks_packed_plaintext(&[1.0, 2.0]).unwrap();
        let _ct = cc.encrypt(&keys, &pt).unwrap();

        let bin_cc = BinFheContext::new(&backend).unwrap();
        bin_cc
            .generate(BinFheParamSet::Toy, BinFheMethod::Ginx)
            .unwrap();
        let sk = bin_cc.keygen().unwrap();
        let _bit = bin_cc.encrypt(&sk, true).unwrap();

        assert!(sim.stats().live > 0);
    }

    let stats = sim.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.invalid_destroys, 0);
}

#[test]
fn borrowed_binfhe_context_is_never_destroyed() {
    init_logger();
    let sim = SimBackend::new();
    let backend = Backend::from_sim(&sim);

    let mut cc = ckks_context(&backend);
    let mut keys = cc.keygen().unwrap();
    let params = SchSwchParams::new(&backend).unwrap();

    let switch = SchemeSwitching::setup(&cc, &params)
        .unwrap()
        .keygen(&keys)
        .unwrap();

    for _ in 0..3 {
        let bin_cc = cc.bin_cc_for_scheme_switch().unwrap();
        assert!(bin_cc.n().unwrap() > 0);
    }
    assert_eq!(sim.stats().borrowed_destroys, 0);

    drop(switch);
    params.close();
    keys.close();
    cc.close();

    let stats = sim.stats();
    assert_eq!(stats.borrowed_destroys, 0);
    assert_eq!(stats.invalid_destroys, 0);
}

#[test]
fn error_messages_stay_on_their_thread() {
    init_logger();
    let backend = Backend::simulated();
    let barrier = Barrier::new(8);

    thread::scope(|s| {
        for i in 0..8u64 {
            let backend = &backend;
            let barrier = &barrier;

            s.spawn(move || {
                let params = Params::<Ckks>::new(backend).unwrap();
                let ring_dim = 1000 + i;

                for _ in 0..50 {
                    barrier.wait();
                    let err = params.set_ring_dim(ring_dim).unwrap_err();

                    assert!(
                        err.to_string().contains(&ring_dim.to_string()),
                        "thread {i} saw {err}"
                    );
                }
            });
        }
    });
}

#[test]
fn subsystems_have_separate_channels() {
    init_logger();
    let backend = Backend::simulated();

    let bin_cc = BinFheContext::new(&backend).unwrap();
    bin_cc
        .generate(BinFheParamSet::Toy, BinFheMethod::Ginx)
        .unwrap();
    let sk = bin_cc.keygen().unwrap();
    let a = bin_cc.encrypt(&sk, true).unwrap();

    let gate_err = bin_cc.eval_bin_gate(BinGate::And, &a, &a).unwrap_err();

    let params = Params::<Ckks>::new(&backend).unwrap();
    let ring_err = params.set_ring_dim(1000).unwrap_err();

    assert!(matches!(
        gate_err,
        Error::Native {
            subsystem: Subsystem::BinFhe,
            ..
        }
    ));
    assert!(gate_err.to_string().contains("BTKeyGen"), "{gate_err}");
    assert!(matches!(
        ring_err,
        Error::Native {
            subsystem: Subsystem::Pke,
            op: "SetRingDim",
            ..
        }
    ));
}
