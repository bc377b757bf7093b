use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=version_scripts/hpackmem.map");

    let manifest_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let version_script = manifest_dir.join("version_scripts").join("hpackmem.map");
    // Version scripts are a GNU ld feature.
    let linux = std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux");
    if linux && version_script.is_file() {
        println!(
            "cargo:rustc-cdylib-link-arg=-Wl,--version-script={}",
            version_script.display()
        );
    }
}
