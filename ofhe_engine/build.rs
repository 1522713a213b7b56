fn main() {
    println!("cargo:rerun-if-env-changed=OFHE_BRIDGE_LIB_DIR");
    println!("cargo:rerun-if-env-changed=OPENFHE_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }

    for var in ["OFHE_BRIDGE_LIB_DIR", "OPENFHE_LIB_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            println!("cargo:rustc-link-search=native={dir}");
        }
    }

    println!("cargo:rustc-link-lib=dylib=ofhe_bridge");
    println!("cargo:rustc-link-lib=dylib=OPENFHEpke");
    println!("cargo:rustc-link-lib=dylib=OPENFHEbinfhe");
    println!("cargo:rustc-link-lib=dylib=OPENFHEcore");
    println!("cargo:rustc-link-lib=dylib=stdc++");
}
