//! Build Script for Duel Event Stream
//!
//! Protobuf stubs are checked in under `packages/schema-gen/rust` (regenerate
//! with `buf generate` in `packages/proto`), so this script only tracks them
//! and emits the coverage cfg.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../packages/schema-gen/rust/giftduels/");

    // Emit cfg for coverage detection
    if env::var("CARGO_LLVM_COV").is_ok()
        || env::var("LLVM_PROFILE_FILE").is_ok()
        || env::var("RUSTFLAGS")
            .map(|f| f.contains("instrument-coverage"))
            .unwrap_or(false)
    {
        println!("cargo:rustc-cfg=coverage");
    }
}
