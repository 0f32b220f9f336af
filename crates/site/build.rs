//! Build script for the site crate.
//!
//! Computes a content hash of the stylesheet so templates can reference it
//! as `/static/css/main.css?v=<hash>` and browsers refetch only on change.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    hash_asset("static/css/main.css", "CSS_HASH");
}

/// Hash an asset relative to the crate root and expose the first eight hex
/// characters as a compile-time environment variable.
fn hash_asset(relative: &str, var: &str) {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let path = Path::new(&manifest_dir).join(relative);

    println!("cargo:rerun-if-changed={}", path.display());

    let content = match fs::read(&path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {relative}: {e}");
            println!("cargo:rustc-env={var}=dev");
            return;
        }
    };

    let digest = Sha256::digest(&content);
    let hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    println!("cargo:rustc-env={var}={hash}");
}
