//! Thin wrapper establishing the `log`/`env_logger` ambient-stack idiom.
//!
//! This core never calls `log::*` directly from `logging.rs` itself — every
//! other module reports through `error::ErrorHandler` instead, which is the
//! single sink spec §7 mandates. What lives here is only the *installation*
//! of a concrete `log` backend for tests and benches, since `env_logger`
//! (like `oxidized`'s and `myth`'s own dev-dependency use of it) is a
//! dev-only concern: a consumer embedding this core picks its own `log`
//! backend, or an `ErrorHandler` impl that bypasses `log` entirely.

/// Install `env_logger` once for the test binary, swallowing the "already
/// initialized" error from a second call within the same process. Tests
/// that want to see `RUST_LOG`-gated trace output during `cargo test --
/// --nocapture` call this at the top of the test.
#[cfg(test)]
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installing_the_test_logger_twice_does_not_panic() {
        init_test_logger();
        init_test_logger();
    }
}
