/// Logging initialization: `tracing-subscriber` fmt to stderr, filterable
/// via `RUST_LOG`. Called once at the start of `App::new`; `try_init` keeps
/// repeated construction (tests) harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_core=debug,info".into()),
        )
        .try_init();
}
