use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let default_filter = || {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("vendorchat={level},reqwest=warn,hyper=warn,hyper_util=warn"))
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}
