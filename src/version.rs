/// Version reported by `/health` and at startup. A build can stamp its own
/// value through `APP_VERSION`; otherwise the crate version is used.
pub const VERSION: &str = match option_env!("APP_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
