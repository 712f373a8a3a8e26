// Basic tracing initialization. Can be extended with OpenTelemetry later.
pub fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn shutdown_tracing() {
    // No-op for now; flush exporters here when tracing gets a pipeline
}
