//! Thin `tracing_subscriber` initializer: a library never installs a global
//! subscriber on its own, but it's reasonable to ship the one-liner an
//! embedding binary (or a test) would otherwise have to hand-roll.
//!
//! Every `tcc-*` crate logs through `tracing` directly; nothing in the
//! coordination kernel depends on this module being called.

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`
/// (defaulting to `info` if unset). Intended for binaries embedding `tcc`
/// and for tests that want readable output; idempotent within a process
/// only to the extent `tracing`'s global dispatcher already is — call it
/// once, at startup.
pub fn init_default() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
