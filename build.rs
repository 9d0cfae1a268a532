/// Expose the compilation target triple for `patchpilot version`.
fn main() {
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=PATCHPILOT_TARGET={target}");
}
