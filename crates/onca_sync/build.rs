use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(dlock_backend, values(\"futex\", \"compare_and_wait\", \"fallback\"))");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let forced_fallback = env::var_os("CARGO_FEATURE_FALLBACK_BACKEND").is_some();

    let backend = if forced_fallback {
        "fallback"
    } else {
        match target_os.as_str() {
            "linux" | "android" => "futex",
            "macos" | "ios" | "tvos" | "watchos" | "visionos" | "windows" => "compare_and_wait",
            _ => "fallback",
        }
    };

    println!("cargo:rustc-cfg=dlock_backend=\"{backend}\"");
}
