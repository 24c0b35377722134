use std::fs;
use std::path::Path;

fn main() {
    let version_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../VERSION");
    println!("cargo:rerun-if-changed={}", version_path.display());

    let version = fs::read_to_string(&version_path)
        .unwrap_or_else(|error| panic!("cannot read {}: {error}", version_path.display()));
    let version = version.trim();
    if version.is_empty() || version.contains(char::is_whitespace) {
        panic!("VERSION must hold a single non-empty token, found {version:?}");
    }

    println!("cargo:rustc-env=SAMPLE_LENS_VERSION={version}");
}
