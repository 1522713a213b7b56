use std::sync::OnceLock;

use criterion::{Criterion, criterion_group, criterion_main};
use ofhe::{Backend, Ciphertext, Ckks, CryptoContext, Feature, KeyPair, config::CKKS_TOY};

const INDICES: [i32; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

fn setup() -> &'static (CryptoContext<Ckks>, KeyPair, Ciphertext) {
    static STATE: OnceLock<(CryptoContext<Ckks>, KeyPair, Ciphertext)> = OnceLock::new();

    STATE.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();

        let params = CKKS_TOY.build(&Backend::default()).unwrap();
        let cc = CryptoContext::new(&params).unwrap();
        cc.enable_all([Feature::Pke, Feature::KeySwitch, Feature::LeveledShe])
            .unwrap();

        let keys = cc.keygen().unwrap();
        cc.eval_rotate_keygen(&keys, &INDICES).unwrap();

        let values = (0..16).map(f64::from).collect::<Vec<_>>();
        let ct = cc
            .encrypt(&keys, &cc.make_ckks_packed_plaintext(&values).unwrap())
            .unwrap();

        (cc, keys, ct)
    })
}

fn rotations(c: &mut Criterion) {
    let (cc, _, ct) = setup();
    let m = cc.cyclotomic_order().unwrap();

    c.bench_function("Rotate x8", |bench| {
        bench.iter(|| {
            for index in INDICES {
                cc.eval_rotate(ct, index).unwrap();
            }
        });
    });

    c.bench_function("Hoisted rotate x8", |bench| {
        bench.iter(|| {
            let pre = cc.fast_rotation_precompute(ct).unwrap();

            for index in INDICES {
                cc.fast_rotation(ct, index, m, &pre).unwrap();
            }
        });
    });

    let pre = cc.fast_rotation_precompute(ct).unwrap();

    c.bench_function("Hoisted rotate, precomputed", |bench| {
        bench.iter(|| {
            cc.fast_rotation(ct, 1, m, &pre).unwrap();
        });
    });
}

fn arithmetic(c: &mut Criterion) {
    let (cc, keys, ct) = setup();
    cc.eval_mult_keygen(keys).unwrap();

    c.bench_function("CKKS add", |bench| {
        bench.iter(|| cc.eval_add(ct, ct).unwrap());
    });

    c.bench_function("CKKS mult", |bench| {
        bench.iter(|| cc.eval_mult(ct, ct).unwrap());
    });
}

criterion_group!(benches, rotations, arithmetic);
criterion_main!(benches);
