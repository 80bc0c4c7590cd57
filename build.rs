use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Make memory.x visible to the linker via OUT_DIR.
    let out_dir = env::var("OUT_DIR").unwrap();
    fs::copy("memory.x", Path::new(&out_dir).join("memory.x")).unwrap();

    println!("cargo:rustc-link-search={out_dir}");
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
