#![forbid(unsafe_code)]

fn main() {
    // Deployment archives are not git checkouts, so only the setters that
    // work without repository metadata are used.
    build_data::set_BUILD_TIMESTAMP();
    build_data::set_RUSTC_VERSION();
}
