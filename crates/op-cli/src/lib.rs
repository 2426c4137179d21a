pub mod redirect;
pub mod server_cli;

/// Install the global subscriber. `RUST_LOG` wins over `default_level`, which falls back to `info`.
pub fn init_tracing(default_level: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.unwrap_or("info")));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}
