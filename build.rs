// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let Ok(out_dir) = env::var("OUT_DIR") else {
        panic!("OUT_DIR not set by cargo");
    };
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());

    let contents = format!(
        "pub const BUILD_DATE: &str = \"{}\";\npub const BUILD_TARGET: &str = \"{}\";\n",
        build_date, target
    );
    if let Err(e) = fs::write(&dest_path, contents) {
        panic!("cannot write {}: {}", dest_path.display(), e);
    }

    println!("cargo:rerun-if-changed=build.rs");
}
