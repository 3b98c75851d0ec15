use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=MULTIO_LIB_DIR");

    if let Ok(dir) = env::var("MULTIO_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
    }
}
