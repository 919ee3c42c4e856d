use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Diagnostics go to stderr so they
/// never interleave with streamed chat output on stdout; verbosity is
/// controlled with `RUST_LOG`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
